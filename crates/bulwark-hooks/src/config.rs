//! Per-namespace hook configuration documents.
//!
//! ```json
//! {
//!   "PreToolUse": [
//!     { "matcher": "Edit|Write", "hooks": [ { "type": "command", "command": "${NAMESPACE_ROOT}/lint.sh" } ] }
//!   ]
//! }
//! ```
//!
//! The same map may also be nested under a top-level `"hooks"` key.

use crate::types::{DEFAULT_HOOK_TIMEOUT_MS, HookAction, HookEventType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event → matcher groups, as declared by one namespace.
pub type HooksConfig = BTreeMap<HookEventType, Vec<MatcherGroup>>;

/// Hooks sharing one tool-name matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherGroup {
    /// Empty or absent = every tool.
    #[serde(default)]
    pub matcher: String,
    pub hooks: Vec<HookSpec>,
}

/// One hook entry as written in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSpec {
    #[serde(flatten)]
    pub action: ActionSpec,
    /// Timeout in milliseconds (default: 10000).
    #[serde(default = "default_hook_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub once: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// `type` tag plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionSpec {
    Command { command: String },
    Prompt { prompt: String },
}

impl From<&ActionSpec> for HookAction {
    fn from(spec: &ActionSpec) -> Self {
        match spec {
            ActionSpec::Command { command } => HookAction::Command(command.clone()),
            ActionSpec::Prompt { prompt } => HookAction::Prompt(prompt.clone()),
        }
    }
}

fn default_hook_timeout() -> u64 {
    DEFAULT_HOOK_TIMEOUT_MS
}

fn default_enabled() -> bool {
    true
}

/// Parse a namespace document. Any structural error rejects the whole document.
pub fn parse_hooks_config(document: &serde_json::Value) -> Result<HooksConfig, serde_json::Error> {
    let body = match document.get("hooks") {
        Some(inner) if inner.is_object() => inner,
        _ => document,
    };
    HooksConfig::deserialize(body)
}
