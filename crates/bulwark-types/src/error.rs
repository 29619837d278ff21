//! Error hierarchy for Bulwark.

use thiserror::Error;

/// Hard failures of a gated action.
///
/// Only a security block and an explicit permission denial abort an action
/// outright; every other fault degrades to a result value.
#[derive(Debug, Error)]
pub enum BulwarkError {
    #[error("Blocked by security policy [{category}] (pattern `{pattern}`): {reason}")]
    SecurityBlocked {
        category: String,
        pattern: String,
        reason: String,
    },

    #[error("Permission denied for tool '{tool}': {reason}")]
    PermissionDenied { tool: String, reason: String },

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Errors from tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid input for tool '{tool}': {message}")]
    InvalidInput { tool: String, message: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Command blocked by security policy [{category}] (pattern `{pattern}`): {reason}")]
    SecurityBlocked {
        category: String,
        pattern: String,
        reason: String,
    },
}

impl ToolError {
    /// Lift the tool errors that must abort a gated action. Anything else is
    /// handed back so the caller can report it as a failed tool result.
    pub fn escalate(self) -> Result<BulwarkError, Self> {
        match self {
            ToolError::SecurityBlocked {
                category,
                pattern,
                reason,
            } => Ok(BulwarkError::SecurityBlocked {
                category,
                pattern,
                reason,
            }),
            other => Err(other),
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
