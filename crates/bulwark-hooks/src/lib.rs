//! Lifecycle hooks for Bulwark.
//!
//! Hooks are external commands (or prompt templates) registered per namespace
//! against a lifecycle event and a tool-name matcher. At each lifecycle point
//! the [`HookPipeline`] finds the matching hooks, runs them as subprocesses
//! with the [`HookInput`] JSON on stdin, and folds their verdicts into a
//! [`HookEventResult`].
//!
//! Exit codes: `0` allow, `2` block, anything else (including a timeout,
//! reported as `124`) allows. A broken hook never halts the agent.

pub mod aggregate;
pub mod config;
pub mod executor;
pub mod matcher;
pub mod pipeline;
pub mod registry;
pub mod types;

pub use aggregate::aggregate;
pub use config::{HookSpec, HooksConfig, MatcherGroup, parse_hooks_config};
pub use executor::{HookExecutor, PromptHookEvaluator, PromptVerdict};
pub use matcher::{MatchOutcome, ToolMatcher, matches};
pub use pipeline::HookPipeline;
pub use registry::{HookRegistry, RegisteredHook};
pub use types::*;
