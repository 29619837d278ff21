//! Terminal-based prompt handler for interactive permission prompts.

use bulwark_permissions::{ArgumentShape, PermissionRequest, PromptHandler, PromptResponse};
use bulwark_types::truncate_str;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::pin::Pin;

/// Longest argument summary shown in a prompt.
const SUMMARY_BYTES: usize = 80;

/// Prompts the operator in the terminal for permission decisions.
pub struct TerminalPromptHandler;

impl PromptHandler for TerminalPromptHandler {
    fn prompt_permission<'a>(
        &'a self,
        request: &'a PermissionRequest,
        description: &'a str,
    ) -> Pin<Box<dyn Future<Output = PromptResponse> + Send + 'a>> {
        let description = description.to_string();
        let summary = summarize(&request.arguments);

        Box::pin(async move {
            // Use spawn_blocking since we read from stdin
            let result = tokio::task::spawn_blocking(move || {
                let stderr = io::stderr();
                let mut err = stderr.lock();

                let _ = writeln!(err);
                let _ = writeln!(err, "  {description}");
                if !summary.is_empty() {
                    let _ = writeln!(err, "  {summary}");
                }
                let _ = write!(err, "  [y] Allow once  [a] Always allow  [n] Deny  > ");
                let _ = err.flush();

                let mut input = String::new();
                let _ = io::stdin().lock().read_line(&mut input);
                parse_response(&input)
            })
            .await;

            result.unwrap_or(PromptResponse::Deny)
        })
    }
}

/// Anything other than an explicit yes or always is a denial.
fn parse_response(input: &str) -> PromptResponse {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => PromptResponse::AllowOnce,
        "a" | "always" => PromptResponse::AlwaysAllow,
        _ => PromptResponse::Deny,
    }
}

/// One-line view of the arguments the rule engine matched against.
fn summarize(arguments: &serde_json::Value) -> String {
    let shape = ArgumentShape::classify(arguments);
    let text = shape.as_str();
    let short = truncate_str(text, SUMMARY_BYTES);
    let label = match &shape {
        ArgumentShape::Command(_) => "command",
        ArgumentShape::Path(_) => "path",
        ArgumentShape::Url(_) => "url",
        ArgumentShape::Opaque(_) => "input",
    };
    if short.len() < text.len() {
        format!("{label}: {short}...")
    } else {
        format!("{label}: {short}")
    }
}
