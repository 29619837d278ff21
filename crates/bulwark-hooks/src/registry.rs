//! Hook registry — definitions bucketed by event, tagged with their namespace.

use crate::config::{HooksConfig, parse_hooks_config};
use crate::matcher::{MatchOutcome, ToolMatcher};
use crate::types::{HookDefinition, HookEventType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A definition plus the namespace that declared it.
#[derive(Debug, Clone)]
pub struct RegisteredHook {
    pub definition: HookDefinition,
    pub namespace: String,
    /// Root directory of the namespace, substituted for `${NAMESPACE_ROOT}`.
    pub root: PathBuf,
    matcher: ToolMatcher,
}

impl RegisteredHook {
    /// Whether this hook applies to `tool_name` (`None` for non-tool events).
    fn applies_to(&self, tool_name: Option<&str>) -> bool {
        if !self.definition.enabled {
            return false;
        }
        let Some(tool_name) = tool_name else {
            return true;
        };
        match self.matcher.check(tool_name) {
            MatchOutcome::Matched => true,
            MatchOutcome::NoMatch => false,
            MatchOutcome::InvalidPattern { .. } => {
                tracing::debug!(hook = %self.definition.id, "Skipping hook with invalid matcher");
                false
            }
        }
    }
}

/// Stores hooks per event in registration order.
///
/// Registration and `clear` take `&mut self`, so a reload cannot overlap an
/// in-flight dispatch that borrows the registry.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: HashMap<HookEventType, Vec<RegisteredHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every hook in `config` under `namespace`. Returns how many were added.
    pub fn register(&mut self, namespace: &str, root: impl AsRef<Path>, config: &HooksConfig) -> usize {
        let root = root.as_ref();
        let mut added = 0;

        for (event, groups) in config {
            let bucket = self.hooks.entry(*event).or_default();
            for (group_index, group) in groups.iter().enumerate() {
                let matcher = ToolMatcher::compile(&group.matcher);
                if let ToolMatcher::Invalid { pattern, error } = &matcher {
                    tracing::warn!(
                        namespace,
                        event = %event,
                        %pattern,
                        %error,
                        "Invalid hook matcher; these hooks will never fire"
                    );
                }

                for (hook_index, spec) in group.hooks.iter().enumerate() {
                    let definition = HookDefinition {
                        id: format!("{namespace}:{event}:{group_index}:{hook_index}"),
                        action: (&spec.action).into(),
                        timeout_ms: spec.timeout_ms,
                        once: spec.once,
                        matcher: group.matcher.clone(),
                        enabled: spec.enabled,
                    };
                    bucket.push(RegisteredHook {
                        definition,
                        namespace: namespace.to_string(),
                        root: root.to_path_buf(),
                        matcher: matcher.clone(),
                    });
                    added += 1;
                }
            }
        }

        tracing::debug!(namespace, added, "Registered hooks");
        added
    }

    /// Parse and register a raw namespace document. A malformed document is
    /// skipped with a warning and registers nothing.
    pub fn register_document(
        &mut self,
        namespace: &str,
        root: impl AsRef<Path>,
        document: &serde_json::Value,
    ) -> usize {
        match parse_hooks_config(document) {
            Ok(config) => self.register(namespace, root, &config),
            Err(e) => {
                tracing::warn!(namespace, error = %e, "Skipping malformed hooks document");
                0
            }
        }
    }

    /// Remove every registered hook.
    pub fn clear(&mut self) {
        self.hooks.clear();
    }

    /// Enabled hooks for `event` whose matcher accepts `tool_name`, in
    /// registration order. Without a tool name every enabled hook matches.
    pub fn matching(&self, event: HookEventType, tool_name: Option<&str>) -> Vec<&RegisteredHook> {
        self.hooks
            .get(&event)
            .map(|hooks| hooks.iter().filter(|h| h.applies_to(tool_name)).collect())
            .unwrap_or_default()
    }

    /// All hooks for `event`, enabled or not.
    pub fn hooks_for(&self, event: HookEventType) -> &[RegisteredHook] {
        self.hooks.get(&event).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HookAction;
    use serde_json::json;

    fn document() -> serde_json::Value {
        json!({
            "PreToolUse": [
                { "matcher": "Edit|Write", "hooks": [
                    { "type": "command", "command": "fmt.sh" },
                    { "type": "command", "command": "lint.sh", "enabled": false }
                ] },
                { "matcher": "Bash", "hooks": [ { "type": "command", "command": "audit.sh" } ] },
                { "hooks": [ { "type": "command", "command": "log.sh" } ] }
            ],
            "UserPromptSubmit": [
                { "matcher": "Bash", "hooks": [ { "type": "prompt", "prompt": "check $ARGUMENTS" } ] }
            ]
        })
    }

    fn ids(hooks: &[&RegisteredHook]) -> Vec<String> {
        hooks.iter().map(|h| h.definition.id.clone()).collect()
    }

    #[test]
    fn register_counts_and_ids() {
        let mut registry = HookRegistry::new();
        let added = registry.register_document("fmt", "/plugins/fmt", &document());
        assert_eq!(added, 5);
        assert_eq!(registry.len(), 5);

        let first = &registry.hooks_for(HookEventType::PreToolUse)[0];
        assert_eq!(first.definition.id, "fmt:PreToolUse:0:0");
        assert_eq!(first.namespace, "fmt");
        assert_eq!(first.root, PathBuf::from("/plugins/fmt"));
        assert_eq!(first.definition.action, HookAction::Command("fmt.sh".into()));
    }

    #[test]
    fn matching_filters_by_tool_and_enabled() {
        let mut registry = HookRegistry::new();
        registry.register_document("ns", "/ns", &document());

        let edit = registry.matching(HookEventType::PreToolUse, Some("Edit"));
        assert_eq!(ids(&edit), ["ns:PreToolUse:0:0", "ns:PreToolUse:2:0"]);

        let bash = registry.matching(HookEventType::PreToolUse, Some("Bash"));
        assert_eq!(ids(&bash), ["ns:PreToolUse:1:0", "ns:PreToolUse:2:0"]);

        assert!(registry.matching(HookEventType::PostToolUse, Some("Bash")).is_empty());
    }

    #[test]
    fn non_tool_events_ignore_matcher() {
        let mut registry = HookRegistry::new();
        registry.register_document("ns", "/ns", &document());
        assert_eq!(registry.matching(HookEventType::UserPromptSubmit, None).len(), 1);
    }

    #[test]
    fn registration_order_across_namespaces() {
        let mut registry = HookRegistry::new();
        let doc = json!({ "Stop": [ { "hooks": [ { "type": "command", "command": "x" } ] } ] });
        registry.register_document("b", "/b", &doc);
        registry.register_document("a", "/a", &doc);
        let hooks = registry.matching(HookEventType::Stop, None);
        assert_eq!(ids(&hooks), ["b:Stop:0:0", "a:Stop:0:0"]);
    }

    #[test]
    fn malformed_document_is_skipped() {
        let mut registry = HookRegistry::new();
        registry.register_document("good", "/g", &document());
        let added = registry.register_document("bad", "/b", &json!({ "PreToolUse": "nope" }));
        assert_eq!(added, 0);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn invalid_matcher_registers_but_never_fires() {
        let mut registry = HookRegistry::new();
        let doc = json!({ "PreToolUse": [ { "matcher": "(", "hooks": [ { "type": "command", "command": "x" } ] } ] });
        assert_eq!(registry.register_document("ns", "/ns", &doc), 1);
        assert!(registry.matching(HookEventType::PreToolUse, Some("(")).is_empty());
        assert!(registry.matching(HookEventType::PreToolUse, Some("Bash")).is_empty());
    }

    #[test]
    fn clear_resets() {
        let mut registry = HookRegistry::new();
        registry.register_document("ns", "/ns", &document());
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.matching(HookEventType::PreToolUse, Some("Edit")).is_empty());
    }
}
