//! Rule matcher — evaluates permission rules against tool calls.

use crate::args::ArgumentShape;
use crate::types::{PermissionLevel, PermissionRequest, PermissionRule};

/// The winning rule's level + a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateResult {
    pub level: PermissionLevel,
    pub description: String,
    /// Position of the winning rule in the evaluated list.
    pub index: usize,
}

/// Evaluates whether a `PermissionRule` matches a given tool call.
pub struct RuleMatcher;

impl RuleMatcher {
    /// Check if a rule matches the given request.
    ///
    /// Tool name matching: exact string or glob (e.g., `*`, `Bash`, `mcp__*`).
    /// Argument matching: glob over the request's [`ArgumentShape`] projection
    /// (e.g., `git *`, `/etc/*`).
    pub fn matches(rule: &PermissionRule, request: &PermissionRequest) -> bool {
        Self::matches_projected(rule, &request.tool, || {
            ArgumentShape::classify(&request.arguments)
        })
    }

    /// First rule that matches, in declaration order.
    pub fn first_match(
        rules: &[PermissionRule],
        request: &PermissionRequest,
    ) -> Option<EvaluateResult> {
        // Project once, and only if some rule actually needs it.
        let mut shape: Option<ArgumentShape> = None;

        rules.iter().enumerate().find_map(|(index, rule)| {
            let matched = Self::matches_projected(rule, &request.tool, || {
                shape
                    .get_or_insert_with(|| ArgumentShape::classify(&request.arguments))
                    .clone()
            });
            matched.then(|| EvaluateResult {
                level: rule.level,
                description: Self::describe_rule(rule),
                index,
            })
        })
    }

    fn matches_projected(
        rule: &PermissionRule,
        tool_name: &str,
        project: impl FnOnce() -> ArgumentShape,
    ) -> bool {
        if !glob_matches(&rule.tool, tool_name) {
            return false;
        }
        match rule.args {
            Some(ref args_pattern) => glob_matches(args_pattern, project().as_str()),
            None => true,
        }
    }

    /// Human-readable description of a matched rule.
    fn describe_rule(rule: &PermissionRule) -> String {
        match &rule.args {
            Some(args) => format!("rule: {} [{}] -> {}", rule.tool, args, rule.level.as_str()),
            None => format!("rule: {} -> {}", rule.tool, rule.level.as_str()),
        }
    }
}

/// Level for `request` under `rules`: first match wins, no match allows.
pub fn evaluate(request: &PermissionRequest, rules: &[PermissionRule]) -> PermissionLevel {
    RuleMatcher::first_match(rules, request)
        .map(|result| result.level)
        .unwrap_or(PermissionLevel::Allow)
}

fn glob_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    match globset::GlobBuilder::new(pattern)
        .case_insensitive(false)
        .build()
    {
        Ok(glob) => glob.compile_matcher().is_match(value),
        // If glob fails to parse, fall back to exact match
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Invalid permission glob; using exact match");
            pattern == value
        }
    }
}
