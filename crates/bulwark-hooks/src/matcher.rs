//! Tool-name matcher for hooks.
//!
//! A matcher is a regular expression anchored at both ends, so `Edit|Write`
//! matches exactly `Edit` or `Write` and nothing longer. Empty and `*` match
//! every tool. A pattern that fails to compile matches nothing.

use regex::Regex;

/// Outcome of testing a tool name against a matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    NoMatch,
    /// The pattern is not a valid regex; treated as no match.
    InvalidPattern { pattern: String, error: String },
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched)
    }
}

/// A matcher compiled once at registration.
#[derive(Debug, Clone)]
pub enum ToolMatcher {
    Any,
    Pattern(Regex),
    Invalid { pattern: String, error: String },
}

impl ToolMatcher {
    pub fn compile(pattern: &str) -> Self {
        let trimmed = pattern.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return ToolMatcher::Any;
        }
        match Regex::new(&format!("^(?:{trimmed})$")) {
            Ok(regex) => ToolMatcher::Pattern(regex),
            Err(e) => ToolMatcher::Invalid {
                pattern: pattern.to_string(),
                error: e.to_string(),
            },
        }
    }

    pub fn check(&self, tool_name: &str) -> MatchOutcome {
        match self {
            ToolMatcher::Any => MatchOutcome::Matched,
            ToolMatcher::Pattern(regex) if regex.is_match(tool_name) => MatchOutcome::Matched,
            ToolMatcher::Pattern(_) => MatchOutcome::NoMatch,
            ToolMatcher::Invalid { pattern, error } => MatchOutcome::InvalidPattern {
                pattern: pattern.clone(),
                error: error.clone(),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, ToolMatcher::Invalid { .. })
    }
}

/// One-shot match of `pattern` against `tool_name`.
pub fn match_tool(pattern: &str, tool_name: &str) -> MatchOutcome {
    ToolMatcher::compile(pattern).check(tool_name)
}

/// Whether `pattern` matches `tool_name` in full. Invalid patterns never match.
pub fn matches(pattern: &str, tool_name: &str) -> bool {
    match match_tool(pattern, tool_name) {
        MatchOutcome::Matched => true,
        MatchOutcome::NoMatch => false,
        MatchOutcome::InvalidPattern { pattern, error } => {
            tracing::warn!(%pattern, %error, "Invalid hook matcher; treating as no match");
            false
        }
    }
}
