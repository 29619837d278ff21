//! Prompt handler trait for interactive permission prompts.

use crate::types::{PermissionRequest, PromptResponse};
use std::future::Future;
use std::pin::Pin;

/// Resolves `ask` decisions by asking the operator.
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility, matching the `Tool` trait.
pub trait PromptHandler: Send + Sync {
    /// Show the request and the rule description, then wait for the operator's answer.
    fn prompt_permission<'a>(
        &'a self,
        request: &'a PermissionRequest,
        description: &'a str,
    ) -> Pin<Box<dyn Future<Output = PromptResponse> + Send + 'a>>;
}
