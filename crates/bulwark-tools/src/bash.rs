//! Bash tool — runs shell commands through the persistent command session.

use bulwark_shell::{CommandSession, ShellError};
use bulwark_types::{Tool, ToolContext, ToolError, ToolOutput, truncate_output};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Maximum output length before truncation.
const MAX_OUTPUT_BYTES: usize = 30_000;

/// Default timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Upper bound on any requested timeout.
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// A command session shared between the tool and whoever reads its cwd.
///
/// The async mutex serializes `execute` calls on the session.
pub type SharedSession = Arc<Mutex<CommandSession>>;

/// Tool for executing bash commands with timeout and output truncation.
pub struct BashTool {
    session: SharedSession,
    default_timeout_ms: u64,
}

#[derive(Deserialize)]
struct BashInput {
    command: String,
    #[serde(default)]
    timeout: Option<u64>,
}

impl BashTool {
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Override the timeout used when the input does not set one.
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms.min(MAX_TIMEOUT_MS);
        self
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }
}

impl Tool for BashTool {
    fn name(&self) -> &str {
        "Bash"
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<ToolOutput, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let input: BashInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
                tool: "Bash".into(),
                message: e.to_string(),
            })?;

            let timeout_ms = input.timeout.unwrap_or(self.default_timeout_ms).min(MAX_TIMEOUT_MS);

            let output = {
                let mut session = self.session.lock().await;
                session
                    .execute(&input.command, Duration::from_millis(timeout_ms))
                    .await
                    .map_err(into_tool_error)?
            };

            let mut text = String::new();
            if !output.stdout.is_empty() {
                text.push_str(&output.stdout);
            }
            if !output.stderr.is_empty() {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&output.stderr);
            }

            if truncate_output(&mut text, MAX_OUTPUT_BYTES) {
                tracing::debug!(limit = MAX_OUTPUT_BYTES, "Bash output truncated");
            }

            if output.exit_code != 0 && text.is_empty() {
                text = format!("Command exited with code {}", output.exit_code);
            }
            if text.is_empty() {
                text = "(no output)".to_string();
            }

            let mut result = if output.exit_code == 0 {
                ToolOutput::text(text)
            } else {
                ToolOutput::error(text)
            }
            .with_exit_code(output.exit_code);
            if let Some(warning) = output.security_warning {
                result = result.with_warning(warning);
            }
            Ok(result)
        })
    }
}

fn into_tool_error(err: ShellError) -> ToolError {
    match err {
        ShellError::SecurityBlocked {
            category,
            pattern,
            reason,
        } => ToolError::SecurityBlocked {
            category,
            pattern,
            reason,
        },
        other => ToolError::ExecutionFailed(other.to_string()),
    }
}
