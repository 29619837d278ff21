//! Permission system for Bulwark.
//!
//! Permission levels: allow / deny / ask.
//! Rules are ordered; the first rule whose tool glob (and optional argument
//! glob) matches decides. No match means allow.

pub mod args;
pub mod engine;
pub mod matcher;
pub mod prompt;
pub mod types;

pub use args::ArgumentShape;
pub use engine::PermissionEngine;
pub use matcher::{EvaluateResult, RuleMatcher, evaluate};
pub use prompt::PromptHandler;
pub use types::*;
