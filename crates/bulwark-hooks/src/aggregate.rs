//! Fold per-hook results into one event result.

use crate::types::{HookEventResult, HookExecutionResult};
use serde::Deserialize;

/// Optional structured output a hook may print to stdout.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HookOutput {
    #[serde(default)]
    system_message: Option<String>,
    #[serde(default)]
    additional_context: Option<String>,
    #[serde(default)]
    hook_specific_output: Option<serde_json::Map<String, serde_json::Value>>,
}

impl HookOutput {
    /// Stdout that is not a JSON object is plain text and carries nothing.
    fn parse(stdout: &str) -> Self {
        let trimmed = stdout.trim();
        if !trimmed.starts_with('{') {
            return Self::default();
        }
        serde_json::from_str(trimmed).unwrap_or_default()
    }
}

/// Combine results (already in registration order) into a [`HookEventResult`].
pub fn aggregate(results: Vec<HookExecutionResult>) -> HookEventResult {
    let mut event = HookEventResult::empty();

    for result in &results {
        if result.exit_code != 0 || result.timed_out {
            event.all_passed = false;
        }

        if result.blocked {
            event.should_continue = false;
            let reason = if result.stderr.trim().is_empty() {
                result.stdout.trim()
            } else {
                result.stderr.trim()
            };
            event.block_reasons.push(if reason.is_empty() {
                format!("Blocked by hook {}", result.hook_id)
            } else {
                reason.to_string()
            });
        }

        let output = HookOutput::parse(&result.stdout);
        if let Some(message) = output.system_message {
            event.system_messages.push(message);
        }
        if let Some(context) = output.additional_context {
            event.additional_context.push(context);
        }
        if let Some(fields) = output.hook_specific_output {
            event.hook_specific_output.extend(fields);
        }
    }

    event.results = results;
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(id: &str, code: i32, stdout: &str, stderr: &str) -> HookExecutionResult {
        HookExecutionResult::from_exit(id, code, stdout.into(), stderr.into(), 1)
    }

    #[test]
    fn empty_passes() {
        let event = aggregate(Vec::new());
        assert!(event.all_passed);
        assert!(event.should_continue);
        assert!(event.results.is_empty());
    }

    #[test]
    fn one_block_stops_the_action() {
        let event = aggregate(vec![
            result("A", 0, r#"{"systemMessage":"A ran"}"#, ""),
            result("B", 2, "", ""),
        ]);
        assert!(!event.should_continue);
        assert!(!event.all_passed);
        assert_eq!(event.system_messages, ["A ran"]);
        assert_eq!(event.results.len(), 2);
        assert_eq!(event.results[0].hook_id, "A");
        assert_eq!(event.results[1].hook_id, "B");
        assert_eq!(event.block_reasons, ["Blocked by hook B"]);
    }

    #[test]
    fn failures_and_timeouts_do_not_block() {
        let event = aggregate(vec![
            result("A", 1, "", "boom"),
            HookExecutionResult::timed_out("B", 10, 10),
        ]);
        assert!(event.should_continue);
        assert!(!event.all_passed);
        assert!(event.block_reasons.is_empty());
    }

    #[test]
    fn block_reason_prefers_stderr() {
        let event = aggregate(vec![
            result("A", 2, "from stdout", "from stderr\n"),
            result("B", 2, "only stdout\n", ""),
        ]);
        assert_eq!(event.block_reasons, ["from stderr", "only stdout"]);
    }

    #[test]
    fn structured_output_is_collected_in_order() {
        let event = aggregate(vec![
            result(
                "A",
                0,
                &json!({
                    "systemMessage": "first",
                    "additionalContext": "ctx-a",
                    "hookSpecificOutput": { "decision": "allow", "note": "a" }
                })
                .to_string(),
                "",
            ),
            result("B", 0, "plain text output", ""),
            result(
                "C",
                0,
                &json!({ "systemMessage": "third", "hookSpecificOutput": { "note": "c" } }).to_string(),
                "",
            ),
        ]);
        assert!(event.all_passed);
        assert_eq!(event.system_messages, ["first", "third"]);
        assert_eq!(event.additional_context, ["ctx-a"]);
        assert_eq!(event.hook_specific_output["decision"], "allow");
        assert_eq!(event.hook_specific_output["note"], "c");
    }

    #[test]
    fn malformed_json_is_ignored() {
        let event = aggregate(vec![result("A", 0, "{not json", "")]);
        assert!(event.system_messages.is_empty());
        assert!(event.should_continue);
    }
}
