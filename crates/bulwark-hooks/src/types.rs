//! Core types for the hook system.

use bulwark_permissions::PermissionMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Exit code a hook returns to veto the action.
pub const BLOCK_EXIT_CODE: i32 = 2;

/// Exit code reported for a hook killed on timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when a hook could not be run at all.
pub const FAULT_EXIT_CODE: i32 = 1;

/// Default hook timeout in milliseconds.
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 10_000;

/// Lifecycle points hooks can attach to. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookEventType {
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
    Stop,
    SubagentStop,
    SessionStart,
    SessionEnd,
    PreCompact,
    Notification,
}

impl HookEventType {
    pub const ALL: [HookEventType; 9] = [
        HookEventType::PreToolUse,
        HookEventType::PostToolUse,
        HookEventType::UserPromptSubmit,
        HookEventType::Stop,
        HookEventType::SubagentStop,
        HookEventType::SessionStart,
        HookEventType::SessionEnd,
        HookEventType::PreCompact,
        HookEventType::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEventType::PreToolUse => "PreToolUse",
            HookEventType::PostToolUse => "PostToolUse",
            HookEventType::UserPromptSubmit => "UserPromptSubmit",
            HookEventType::Stop => "Stop",
            HookEventType::SubagentStop => "SubagentStop",
            HookEventType::SessionStart => "SessionStart",
            HookEventType::SessionEnd => "SessionEnd",
            HookEventType::PreCompact => "PreCompact",
            HookEventType::Notification => "Notification",
        }
    }

    /// Whether the event concerns a specific tool call.
    pub fn is_tool_event(&self) -> bool {
        matches!(self, HookEventType::PreToolUse | HookEventType::PostToolUse)
    }
}

impl std::fmt::Display for HookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Shell command, run with `sh -c`.
    Command(String),
    /// Prompt template handed to a [`PromptHookEvaluator`](crate::PromptHookEvaluator).
    Prompt(String),
}

/// A loaded hook. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDefinition {
    /// `<namespace>:<event>:<group>:<index>`.
    pub id: String,
    pub action: HookAction,
    pub timeout_ms: u64,
    /// Fire at most once per pipeline lifetime.
    pub once: bool,
    /// Regex (anchored) or pipe list over tool names; empty or `*` = any.
    pub matcher: String,
    pub enabled: bool,
}

/// Session facts every hook receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookContext {
    pub session_id: String,
    pub cwd: PathBuf,
    pub permission_mode: PermissionMode,
}

/// JSON payload sent to hooks on stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookInput {
    /// The event that triggered the hook.
    pub event: HookEventType,
    /// Tool name (for tool-related events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Tool input JSON (for tool-related events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    /// Tool output (for PostToolUse).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
    /// Whether the tool execution was an error (for PostToolUse).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Submitted prompt text (for UserPromptSubmit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Notification text (for Notification).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Why the event happened: session start source, session end reason,
    /// or compaction trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether a stop hook already continued the turn (for Stop / SubagentStop).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_hook_active: Option<bool>,
    pub context: HookContext,
}

impl HookInput {
    /// Bare input for `event`; event-specific fields are unset.
    pub fn new(event: HookEventType, context: HookContext) -> Self {
        Self {
            event,
            tool_name: None,
            tool_input: None,
            tool_output: None,
            is_error: None,
            prompt: None,
            message: None,
            reason: None,
            stop_hook_active: None,
            context,
        }
    }

    pub fn pre_tool_use(context: HookContext, tool_name: &str, tool_input: serde_json::Value) -> Self {
        Self {
            tool_name: Some(tool_name.to_string()),
            tool_input: Some(tool_input),
            ..Self::new(HookEventType::PreToolUse, context)
        }
    }

    pub fn post_tool_use(
        context: HookContext,
        tool_name: &str,
        tool_input: serde_json::Value,
        tool_output: String,
        is_error: bool,
    ) -> Self {
        Self {
            tool_name: Some(tool_name.to_string()),
            tool_input: Some(tool_input),
            tool_output: Some(tool_output),
            is_error: Some(is_error),
            ..Self::new(HookEventType::PostToolUse, context)
        }
    }

    pub fn user_prompt_submit(context: HookContext, prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::new(HookEventType::UserPromptSubmit, context)
        }
    }

    pub fn stop(context: HookContext, subagent: bool, stop_hook_active: bool) -> Self {
        let event = if subagent {
            HookEventType::SubagentStop
        } else {
            HookEventType::Stop
        };
        Self {
            stop_hook_active: Some(stop_hook_active),
            ..Self::new(event, context)
        }
    }

    pub fn notification(context: HookContext, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(HookEventType::Notification, context)
        }
    }

    /// SessionStart / SessionEnd / PreCompact with their reason string.
    pub fn with_reason(event: HookEventType, context: HookContext, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(event, context)
        }
    }
}

/// Outcome of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookExecutionResult {
    pub hook_id: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// True only when the hook deliberately exited with code 2.
    pub blocked: bool,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl HookExecutionResult {
    /// Build a result from an exit code, applying the fixed verdict mapping.
    pub fn from_exit(hook_id: &str, exit_code: i32, stdout: String, stderr: String, duration_ms: u64) -> Self {
        Self {
            hook_id: hook_id.to_string(),
            exit_code,
            stdout,
            stderr,
            blocked: exit_code == BLOCK_EXIT_CODE,
            duration_ms,
            timed_out: false,
        }
    }

    /// A hook that was killed for running too long. Never blocks.
    pub fn timed_out(hook_id: &str, timeout_ms: u64, duration_ms: u64) -> Self {
        Self {
            hook_id: hook_id.to_string(),
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: format!("Hook timed out after {timeout_ms}ms"),
            blocked: false,
            duration_ms,
            timed_out: true,
        }
    }

    /// A hook that could not be run. Fails open.
    pub fn fault(hook_id: &str, message: String, duration_ms: u64) -> Self {
        Self::from_exit(hook_id, FAULT_EXIT_CODE, String::new(), message, duration_ms)
    }
}

/// All hook outcomes for one (event, tool) dispatch, folded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEventResult {
    /// Every hook exited 0 within its timeout.
    pub all_passed: bool,
    /// False if any hook blocked.
    #[serde(rename = "continue")]
    pub should_continue: bool,
    /// In registration order.
    pub system_messages: Vec<String>,
    /// In registration order.
    pub additional_context: Vec<String>,
    /// Explanations from blocking hooks, in registration order.
    pub block_reasons: Vec<String>,
    /// Structured fields merged across hooks, last write wins per field.
    pub hook_specific_output: serde_json::Map<String, serde_json::Value>,
    /// Per-hook outcomes in registration order.
    pub results: Vec<HookExecutionResult>,
}

impl HookEventResult {
    /// Result of a dispatch that matched no hooks.
    pub fn empty() -> Self {
        Self {
            all_passed: true,
            should_continue: true,
            system_messages: Vec::new(),
            additional_context: Vec::new(),
            block_reasons: Vec::new(),
            hook_specific_output: serde_json::Map::new(),
            results: Vec::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        !self.should_continue
    }
}

impl Default for HookEventResult {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> HookContext {
        HookContext {
            session_id: "s-1".into(),
            cwd: PathBuf::from("/work"),
            permission_mode: PermissionMode::Default,
        }
    }

    #[test]
    fn exit_code_mapping_is_exact() {
        for code in [0, 1, 3, 42, 124, 127, 255, -1] {
            let result = HookExecutionResult::from_exit("h", code, String::new(), String::new(), 0);
            assert!(!result.blocked, "exit code {code} must not block");
        }
        assert!(HookExecutionResult::from_exit("h", 2, String::new(), String::new(), 0).blocked);
    }

    #[test]
    fn timeout_never_blocks() {
        let result = HookExecutionResult::timed_out("h", 100, 100);
        assert_eq!(result.exit_code, 124);
        assert!(result.timed_out);
        assert!(!result.blocked);
    }

    #[test]
    fn pre_tool_use_serialization() {
        let input = HookInput::pre_tool_use(ctx(), "Bash", json!({"command": "ls"}));
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["event"], "PreToolUse");
        assert_eq!(value["tool_name"], "Bash");
        assert_eq!(value["tool_input"]["command"], "ls");
        assert_eq!(value["context"]["session_id"], "s-1");
        assert_eq!(value["context"]["permission_mode"], "default");
        assert!(value.get("tool_output").is_none());
        assert!(value.get("prompt").is_none());
    }

    #[test]
    fn stop_event_selection() {
        assert_eq!(HookInput::stop(ctx(), false, false).event, HookEventType::Stop);
        assert_eq!(HookInput::stop(ctx(), true, false).event, HookEventType::SubagentStop);
    }

    #[test]
    fn event_result_serializes_continue_key() {
        let value = serde_json::to_value(HookEventResult::empty()).unwrap();
        assert_eq!(value["continue"], true);
        assert_eq!(value["allPassed"], true);
    }

    #[test]
    fn only_tool_events_are_tool_events() {
        let tool_events: Vec<_> = HookEventType::ALL
            .iter()
            .filter(|e| e.is_tool_event())
            .collect();
        assert_eq!(tool_events, [&HookEventType::PreToolUse, &HookEventType::PostToolUse]);
    }
}
