//! The action gate: permission check, hooks, execution, in a fixed order.

use bulwark_hooks::{HookContext, HookEventResult, HookEventType, HookInput, HookPipeline};
use bulwark_permissions::{PermissionEngine, PermissionRequest};
use bulwark_tools::{SharedSession, ToolRegistry};
use bulwark_types::{BulwarkError, ToolContext, ToolError, ToolOutput};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Hard failures of a gated call.
pub type GateError = BulwarkError;

/// Points a single tool call passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    Requested,
    PermissionChecked,
    PreHooksRun,
    /// Terminal: a PreToolUse hook vetoed the call.
    Blocked,
    Executed,
    PostHooksRun,
    Completed,
}

/// How an admitted call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The tool ran. `output.is_error` reports tool-level failure.
    Completed {
        output: ToolOutput,
        stages: Vec<GateStage>,
        pre_hooks: HookEventResult,
        post_hooks: HookEventResult,
    },
    /// A PreToolUse hook exited with code 2; the tool never ran.
    HookBlocked {
        reasons: Vec<String>,
        system_messages: Vec<String>,
        stages: Vec<GateStage>,
    },
}

impl GateOutcome {
    pub fn stages(&self) -> &[GateStage] {
        match self {
            GateOutcome::Completed { stages, .. } | GateOutcome::HookBlocked { stages, .. } => stages,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, GateOutcome::HookBlocked { .. })
    }
}

/// Composes the permission engine, hook pipeline and tools for one session.
pub struct ActionGate {
    permissions: Arc<PermissionEngine>,
    hooks: Arc<HookPipeline>,
    tools: ToolRegistry,
    session: SharedSession,
    session_id: String,
}

impl ActionGate {
    pub fn new(
        permissions: Arc<PermissionEngine>,
        hooks: Arc<HookPipeline>,
        tools: ToolRegistry,
        session: SharedSession,
    ) -> Self {
        Self {
            permissions,
            hooks,
            tools,
            session,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    /// Current working directory of the shared command session.
    pub async fn cwd(&self) -> PathBuf {
        self.session.lock().await.current_dir().to_path_buf()
    }

    /// Session facts handed to every hook.
    pub async fn hook_context(&self) -> HookContext {
        HookContext {
            session_id: self.session_id.clone(),
            cwd: self.cwd().await,
            permission_mode: self.permissions.mode(),
        }
    }

    /// Run one tool call through the gate.
    ///
    /// `Err` only for a permission denial, a security block, or an unknown
    /// tool. A hook veto is an `Ok(HookBlocked)`; tool failures come back as
    /// an error `ToolOutput` inside `Completed`.
    pub async fn invoke(&self, tool: &str, input: serde_json::Value) -> Result<GateOutcome, GateError> {
        let mut stages = vec![GateStage::Requested];

        let Some(is_read_only) = self.tools.is_read_only(tool) else {
            return Err(ToolError::UnknownTool { name: tool.to_string() }.into());
        };

        // 1. Permission rules
        let request = PermissionRequest::new(tool, input.clone());
        if let Err(reason) = self.permissions.authorize(&request, is_read_only).await {
            tracing::info!(tool, %reason, "Tool call denied");
            return Err(GateError::PermissionDenied {
                tool: tool.to_string(),
                reason,
            });
        }
        stages.push(GateStage::PermissionChecked);

        // 2. PreToolUse hooks
        let context = self.hook_context().await;
        let pre_hooks = self
            .hooks
            .dispatch(&HookInput::pre_tool_use(context.clone(), tool, input.clone()))
            .await;
        stages.push(GateStage::PreHooksRun);

        if pre_hooks.is_blocked() {
            stages.push(GateStage::Blocked);
            return Ok(GateOutcome::HookBlocked {
                reasons: pre_hooks.block_reasons,
                system_messages: pre_hooks.system_messages,
                stages,
            });
        }

        // 3. The tool itself
        let ctx = ToolContext {
            session_id: self.session_id.clone(),
            cwd: context.cwd,
        };
        let output = match self.tools.execute(tool, input.clone(), ctx).await {
            Ok(output) => output,
            Err(e) => match e.escalate() {
                Ok(hard) => {
                    tracing::info!(tool, error = %hard, "Tool call blocked");
                    return Err(hard);
                }
                Err(other) => ToolOutput::error(other.to_string()),
            },
        };
        stages.push(GateStage::Executed);
        tracing::debug!(tool, is_error = output.is_error, "Tool executed");

        // 4. PostToolUse hooks see the directory the tool left behind.
        // They cannot undo the call; a block here is only reported.
        let post_hooks = self
            .hooks
            .dispatch(&HookInput::post_tool_use(
                self.hook_context().await,
                tool,
                input,
                output.text.clone(),
                output.is_error,
            ))
            .await;
        stages.push(GateStage::PostHooksRun);
        if post_hooks.is_blocked() {
            tracing::warn!(tool, reasons = ?post_hooks.block_reasons, "PostToolUse hook objected after execution");
        }

        stages.push(GateStage::Completed);
        Ok(GateOutcome::Completed {
            output,
            stages,
            pre_hooks,
            post_hooks,
        })
    }

    /// Dispatch a lifecycle event that is not tied to a tool call.
    ///
    /// `detail` is the prompt text, notification message, or reason string,
    /// depending on the event. Tool events belong to [`invoke`](Self::invoke)
    /// and are ignored here.
    pub async fn notify(&self, event: HookEventType, detail: Option<String>) -> HookEventResult {
        if event.is_tool_event() {
            tracing::warn!(%event, "Tool events are dispatched by invoke; ignoring");
            return HookEventResult::empty();
        }

        let context = self.hook_context().await;
        let input = match (event, detail) {
            (HookEventType::UserPromptSubmit, detail) => {
                HookInput::user_prompt_submit(context, detail.unwrap_or_default())
            }
            (HookEventType::Notification, detail) => HookInput::notification(context, detail.unwrap_or_default()),
            (HookEventType::Stop, _) => HookInput::stop(context, false, false),
            (HookEventType::SubagentStop, _) => HookInput::stop(context, true, false),
            (event, Some(reason)) => HookInput::with_reason(event, context, reason),
            (event, None) => HookInput::new(event, context),
        };
        self.hooks.dispatch(&input).await
    }
}
