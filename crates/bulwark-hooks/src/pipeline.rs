//! Hook pipeline — select, run concurrently, aggregate.

use crate::aggregate::aggregate;
use crate::executor::HookExecutor;
use crate::registry::{HookRegistry, RegisteredHook};
use crate::types::{HookEventResult, HookInput};
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Dispatches lifecycle events to registered hooks.
#[derive(Debug, Default)]
pub struct HookPipeline {
    registry: HookRegistry,
    executor: HookExecutor,
    /// Ids of `once` hooks that have already fired.
    fired_once: Mutex<HashSet<String>>,
}

impl HookPipeline {
    pub fn new(registry: HookRegistry, executor: HookExecutor) -> Self {
        Self {
            registry,
            executor,
            fired_once: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Mutable access for (re)registration. Requires exclusive ownership, so
    /// no dispatch can be in flight.
    pub fn registry_mut(&mut self) -> &mut HookRegistry {
        &mut self.registry
    }

    /// Drop all hooks and forget which `once` hooks have fired.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.fired_once
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Run every hook matching `input` and fold the outcomes.
    ///
    /// Hooks run concurrently; results keep registration order. No match
    /// yields [`HookEventResult::empty`].
    pub async fn dispatch(&self, input: &HookInput) -> HookEventResult {
        let tool_name = if input.event.is_tool_event() {
            input.tool_name.as_deref()
        } else {
            None
        };

        let selected = self.select(input, tool_name);
        if selected.is_empty() {
            return HookEventResult::empty();
        }

        tracing::debug!(
            event = %input.event,
            tool = tool_name.unwrap_or(""),
            count = selected.len(),
            "Dispatching hooks"
        );

        let runs = selected.iter().map(|hook| {
            self.executor.run(
                &hook.definition,
                input,
                &hook.root,
                Duration::from_millis(hook.definition.timeout_ms),
            )
        });
        let result = aggregate(join_all(runs).await);

        if result.is_blocked() {
            tracing::info!(event = %input.event, reasons = ?result.block_reasons, "Hook blocked action");
        }
        result
    }

    /// Matching hooks minus `once` hooks that already fired. A `once` hook is
    /// claimed here, before it runs, so overlapping dispatches fire it once.
    fn select(&self, input: &HookInput, tool_name: Option<&str>) -> Vec<&RegisteredHook> {
        let matching = self.registry.matching(input.event, tool_name);
        if matching.iter().all(|h| !h.definition.once) {
            return matching;
        }

        let mut fired = self.fired_once.lock().unwrap_or_else(PoisonError::into_inner);
        matching
            .into_iter()
            .filter(|h| !h.definition.once || fired.insert(h.definition.id.clone()))
            .collect()
    }
}
