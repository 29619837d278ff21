//! Permission engine — the main entry point for permission checks.

use crate::matcher::RuleMatcher;
use crate::prompt::PromptHandler;
use crate::types::*;
use std::sync::{Arc, Mutex, PoisonError};

/// Tools whose `ask` decisions are waived in accept-edits mode.
const EDIT_TOOLS: [&str; 4] = ["Edit", "Write", "MultiEdit", "NotebookEdit"];

/// The central permission engine: evaluates rules, applies the session mode,
/// and resolves `ask` through an optional prompt handler.
pub struct PermissionEngine {
    /// Static rules loaded from config, in declaration order.
    rules: Vec<PermissionRule>,
    /// Session-scoped rules added via "always allow" responses.
    session_rules: Mutex<Vec<PermissionRule>>,
    mode: PermissionMode,
    /// Optional prompt handler for interactive permission prompts.
    prompt_handler: Option<Arc<dyn PromptHandler>>,
}

impl PermissionEngine {
    /// Create a new permission engine with the given rules.
    pub fn new(rules: Vec<PermissionRule>, prompt_handler: Option<Arc<dyn PromptHandler>>) -> Self {
        Self {
            rules,
            session_rules: Mutex::new(Vec::new()),
            mode: PermissionMode::Default,
            prompt_handler,
        }
    }

    /// Create an engine that allows everything.
    pub fn bypass() -> Self {
        Self::new(Vec::new(), None).with_mode(PermissionMode::BypassPermissions)
    }

    pub fn with_mode(mut self, mode: PermissionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Decide whether a tool call is allowed, denied, or needs confirmation.
    ///
    /// Evaluation order:
    /// 1. Bypass mode allows everything.
    /// 2. Plan mode denies any tool that is not read-only.
    /// 3. Session rules (added via "always allow") can only allow.
    /// 4. Static rules: first match wins.
    /// 5. Default: allow.
    pub fn check(&self, request: &PermissionRequest, is_read_only: bool) -> PermissionDecision {
        match self.mode {
            PermissionMode::BypassPermissions => return PermissionDecision::Allow,
            PermissionMode::Plan if !is_read_only => {
                return PermissionDecision::Deny {
                    reason: format!("plan mode only allows read-only tools ('{}' is not)", request.tool),
                };
            }
            _ => {}
        }

        let session_rules = self
            .session_rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(result) = RuleMatcher::first_match(&session_rules, request) {
            if result.level == PermissionLevel::Allow {
                return PermissionDecision::Allow;
            }
        }
        drop(session_rules);

        let Some(result) = RuleMatcher::first_match(&self.rules, request) else {
            return PermissionDecision::Allow;
        };

        tracing::debug!(tool = %request.tool, rule = %result.description, "Permission rule matched");

        match result.level {
            PermissionLevel::Allow => PermissionDecision::Allow,
            PermissionLevel::Deny => PermissionDecision::Deny {
                reason: format!("Tool '{}' denied by {}", request.tool, result.description),
            },
            PermissionLevel::Ask
                if self.mode == PermissionMode::AcceptEdits
                    && EDIT_TOOLS.contains(&request.tool.as_str()) =>
            {
                PermissionDecision::Allow
            }
            PermissionLevel::Ask => PermissionDecision::Ask {
                tool: request.tool.clone(),
                description: format!("Tool '{}' requires permission ({})", request.tool, result.description),
            },
        }
    }

    /// Add a session-scoped allow rule (from "always allow" responses).
    /// Dies with the process — not persisted to config.
    pub fn add_session_rule(&self, rule: PermissionRule) {
        self.session_rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rule);
    }

    /// Prompt the operator. Returns `Deny` if no handler is set.
    pub async fn prompt(&self, request: &PermissionRequest, description: &str) -> PromptResponse {
        match &self.prompt_handler {
            Some(handler) => handler.prompt_permission(request, description).await,
            // No prompt handler = non-interactive mode, safe default is deny
            None => PromptResponse::Deny,
        }
    }

    /// Check, then resolve `ask` through the prompt handler.
    ///
    /// `Err` carries the reason shown to the operator when the call is denied.
    pub async fn authorize(&self, request: &PermissionRequest, is_read_only: bool) -> Result<(), String> {
        match self.check(request, is_read_only) {
            PermissionDecision::Allow => Ok(()),
            PermissionDecision::Deny { reason } => Err(reason),
            PermissionDecision::Ask { description, .. } => {
                match self.prompt(request, &description).await {
                    PromptResponse::AllowOnce => Ok(()),
                    PromptResponse::AlwaysAllow => {
                        self.add_session_rule(PermissionRule::new(
                            request.tool.clone(),
                            None,
                            PermissionLevel::Allow,
                        ));
                        Ok(())
                    }
                    PromptResponse::Deny => Err(format!("{description}: denied by user")),
                }
            }
        }
    }
}
