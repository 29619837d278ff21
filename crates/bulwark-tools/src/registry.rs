//! Tool registry for name-based dispatch.

use crate::bash::{BashTool, SharedSession};
use bulwark_types::{Tool, ToolContext, ToolError, ToolOutput};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available tools, supporting name-based dispatch.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry holding the `Bash` tool over `session`.
    pub fn with_bash(session: SharedSession, default_timeout_ms: u64) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BashTool::new(session).with_default_timeout(default_timeout_ms)));
        registry
    }

    /// Register a tool in the registry, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Execute a tool by name with the given input.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        tool.execute(input, ctx).await
    }

    /// Query whether a tool is read-only by name; `None` for unknown tools.
    pub fn is_read_only(&self, name: &str) -> Option<bool> {
        self.tools.get(name).map(|t| t.is_read_only())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
