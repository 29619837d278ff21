//! Tool trait and related types.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Session the invocation belongs to.
    pub session_id: String,
    /// Working directory seen by the gate when the call was admitted.
    pub cwd: PathBuf,
}

/// Result of executing a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text content returned by the tool.
    pub text: String,
    /// Whether the tool execution resulted in an error.
    pub is_error: bool,
    /// Non-fatal warnings raised while running the tool (e.g. a risky command).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Process exit code, for tools that run a command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    /// Create a successful text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
            warnings: Vec::new(),
            exit_code: None,
        }
    }

    /// Create an error text output.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
            warnings: Vec::new(),
            exit_code: None,
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Trait that all gated tools implement.
pub trait Tool: Send + Sync {
    /// The unique name of this tool (matched by permission rules and hook matchers).
    fn name(&self) -> &str;

    /// Whether this tool only reads data without modifying the system.
    ///
    /// Plan mode only admits read-only tools.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Execute the tool with the given JSON input and context.
    ///
    /// The context is passed by value to avoid lifetime issues with dyn dispatch.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, crate::error::ToolError>> + Send + '_>>;
}
