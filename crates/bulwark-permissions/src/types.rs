//! Core types for the permission system.

use serde::{Deserialize, Serialize};

/// Authorization outcome for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Allow,
    Deny,
    Ask,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Allow => "allow",
            PermissionLevel::Deny => "deny",
            PermissionLevel::Ask => "ask",
        }
    }
}

/// A single permission rule matching a tool + optional argument pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Tool name or glob pattern (e.g., "Bash", "*", "mcp__*").
    pub tool: String,
    /// Optional glob over the argument projection (e.g., "git *", "/etc/*").
    #[serde(default)]
    pub args: Option<String>,
    /// The permission level to apply when this rule matches.
    pub level: PermissionLevel,
}

impl PermissionRule {
    pub fn new(tool: impl Into<String>, args: Option<&str>, level: PermissionLevel) -> Self {
        Self {
            tool: tool.into(),
            args: args.map(str::to_string),
            level,
        }
    }
}

/// A tool invocation awaiting authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub tool: String,
    pub arguments: serde_json::Value,
}

impl PermissionRequest {
    pub fn new(tool: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }
}

/// Session-wide stance that adjusts how rules are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Rules apply as written.
    #[default]
    Default,
    /// `ask` on file-editing tools is treated as `allow`.
    AcceptEdits,
    /// Only read-only tools may run.
    Plan,
    /// Every tool call is allowed.
    BypassPermissions,
}

impl PermissionMode {
    pub const ALL: [PermissionMode; 4] = [
        PermissionMode::Default,
        PermissionMode::AcceptEdits,
        PermissionMode::Plan,
        PermissionMode::BypassPermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                format!("unknown permission mode '{s}' (expected default, acceptEdits, plan or bypassPermissions)")
            })
    }
}

/// The result of evaluating permission rules for a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// Tool call is allowed — execute immediately.
    Allow,
    /// Tool call is denied — do not execute.
    Deny { reason: String },
    /// Tool call requires operator confirmation.
    Ask { tool: String, description: String },
}

/// Operator's response to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    /// Allow this specific invocation only.
    AllowOnce,
    /// Allow this tool for the rest of the session.
    AlwaysAllow,
    /// Deny this tool call.
    Deny,
}
