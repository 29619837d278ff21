//! Hook executor — runs one hook and reports how it ended.
//!
//! Exit code protocol:
//! - 0 = allow
//! - 2 = block (the hook vetoes the action)
//! - anything else = allow; the fault is logged
//!
//! Timeout kills the hook's process group and reports exit code 124, which
//! also allows. The exit code is the hook's own even when a background job it
//! started still holds stdout.

use crate::types::{HookAction, HookDefinition, HookExecutionResult, HookInput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use bulwark_shell::{SpawnResult, run_process_group};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Placeholder for the declaring namespace's root directory.
pub const NAMESPACE_ROOT_PLACEHOLDER: &str = "${NAMESPACE_ROOT}";
/// Placeholder for the session id.
pub const SESSION_ID_PLACEHOLDER: &str = "${SESSION_ID}";
/// Placeholder in prompt templates for the serialized hook input.
pub const ARGUMENTS_PLACEHOLDER: &str = "$ARGUMENTS";

/// Answer from a [`PromptHookEvaluator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVerdict {
    pub allow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

/// Evaluates prompt-type hooks (typically with a language model).
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility, matching the `Tool` trait.
pub trait PromptHookEvaluator: Send + Sync {
    fn evaluate<'a>(
        &'a self,
        prompt: &'a str,
        input: &'a HookInput,
    ) -> Pin<Box<dyn Future<Output = Result<PromptVerdict, String>> + Send + 'a>>;
}

/// Runs hook definitions.
#[derive(Clone)]
pub struct HookExecutor {
    shell: String,
    /// Feature flags exposed as `${FLAG_<NAME>}` → `1` / `0`.
    flags: BTreeMap<String, bool>,
    prompt_evaluator: Option<Arc<dyn PromptHookEvaluator>>,
}

impl std::fmt::Debug for HookExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookExecutor")
            .field("shell", &self.shell)
            .field("flags", &self.flags)
            .field("prompt_evaluator", &self.prompt_evaluator.is_some())
            .finish()
    }
}

impl Default for HookExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            flags: BTreeMap::new(),
            prompt_evaluator: None,
        }
    }
}

impl HookExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags(mut self, flags: BTreeMap<String, bool>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_prompt_evaluator(mut self, evaluator: Arc<dyn PromptHookEvaluator>) -> Self {
        self.prompt_evaluator = Some(evaluator);
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Run `hook` with `input` on stdin. Never fails: faults come back as
    /// non-blocking results.
    pub async fn run(
        &self,
        hook: &HookDefinition,
        input: &HookInput,
        namespace_root: &Path,
        timeout: Duration,
    ) -> HookExecutionResult {
        let start = Instant::now();
        let result = match &hook.action {
            HookAction::Command(command) => {
                let command = self.substitute(command, namespace_root, &input.context.session_id);
                self.run_command(&hook.id, &command, input, namespace_root, timeout, start)
                    .await
            }
            HookAction::Prompt(template) => self.run_prompt(&hook.id, template, input, timeout, start).await,
        };

        if result.timed_out {
            tracing::warn!(hook = %hook.id, timeout_ms = timeout.as_millis() as u64, "Hook timed out; continuing");
        } else if !result.blocked && result.exit_code != 0 {
            tracing::warn!(
                hook = %hook.id,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "Hook failed; continuing"
            );
        } else {
            tracing::debug!(hook = %hook.id, exit_code = result.exit_code, blocked = result.blocked, "Hook finished");
        }
        result
    }

    /// Replace `${NAMESPACE_ROOT}`, `${SESSION_ID}` and `${FLAG_<NAME>}` tokens.
    pub fn substitute(&self, command: &str, namespace_root: &Path, session_id: &str) -> String {
        let mut out = command
            .replace(NAMESPACE_ROOT_PLACEHOLDER, &namespace_root.to_string_lossy())
            .replace(SESSION_ID_PLACEHOLDER, session_id);
        for (name, enabled) in &self.flags {
            let token = format!("${{FLAG_{}}}", name.to_ascii_uppercase());
            out = out.replace(&token, if *enabled { "1" } else { "0" });
        }
        out
    }

    async fn run_command(
        &self,
        hook_id: &str,
        command_text: &str,
        input: &HookInput,
        namespace_root: &Path,
        timeout: Duration,
        start: Instant,
    ) -> HookExecutionResult {
        let input_json = match serde_json::to_string(input) {
            Ok(json) => json,
            Err(e) => {
                return HookExecutionResult::fault(
                    hook_id,
                    format!("Failed to serialize hook input: {e}"),
                    elapsed_ms(start),
                );
            }
        };

        let cwd = if input.context.cwd.is_dir() {
            input.context.cwd.as_path()
        } else {
            namespace_root
        };

        let mut command = tokio::process::Command::new(&self.shell);
        command.arg("-c").arg(command_text).current_dir(cwd);

        match run_process_group(command, Some(input_json.into_bytes()), timeout).await {
            SpawnResult::Completed(raw) => {
                let stdout = String::from_utf8_lossy(&raw.stdout).into_owned();
                let mut stderr = String::from_utf8_lossy(&raw.stderr).into_owned();
                let exit_code = match raw.code {
                    Some(code) => code,
                    None => {
                        if !stderr.is_empty() && !stderr.ends_with('\n') {
                            stderr.push('\n');
                        }
                        stderr.push_str("Hook terminated by signal");
                        crate::types::FAULT_EXIT_CODE
                    }
                };
                HookExecutionResult::from_exit(hook_id, exit_code, stdout, stderr, elapsed_ms(start))
            }
            SpawnResult::Failed(e) => HookExecutionResult::fault(
                hook_id,
                format!("Failed to spawn hook: {e}"),
                elapsed_ms(start),
            ),
            SpawnResult::TimedOut => {
                HookExecutionResult::timed_out(hook_id, timeout.as_millis() as u64, elapsed_ms(start))
            }
        }
    }

    async fn run_prompt(
        &self,
        hook_id: &str,
        template: &str,
        input: &HookInput,
        timeout: Duration,
        start: Instant,
    ) -> HookExecutionResult {
        let Some(evaluator) = &self.prompt_evaluator else {
            return HookExecutionResult::from_exit(
                hook_id,
                0,
                String::new(),
                "No prompt evaluator configured; prompt hook skipped".to_string(),
                elapsed_ms(start),
            );
        };

        let arguments = serde_json::to_string(input).unwrap_or_default();
        let prompt = template.replace(ARGUMENTS_PLACEHOLDER, &arguments);

        match tokio::time::timeout(timeout, evaluator.evaluate(&prompt, input)).await {
            Ok(Ok(verdict)) => {
                let stdout = verdict
                    .system_message
                    .as_ref()
                    .map(|message| serde_json::json!({ "systemMessage": message }).to_string())
                    .unwrap_or_default();
                let (exit_code, stderr) = if verdict.allow {
                    (0, String::new())
                } else {
                    let reason = verdict
                        .reason
                        .unwrap_or_else(|| "Blocked by prompt hook".to_string());
                    (crate::types::BLOCK_EXIT_CODE, reason)
                };
                HookExecutionResult::from_exit(hook_id, exit_code, stdout, stderr, elapsed_ms(start))
            }
            Ok(Err(e)) => HookExecutionResult::fault(
                hook_id,
                format!("Prompt hook evaluation failed: {e}"),
                elapsed_ms(start),
            ),
            Err(_) => HookExecutionResult::timed_out(hook_id, timeout.as_millis() as u64, elapsed_ms(start)),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
