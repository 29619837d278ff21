//! Action gate for Bulwark.
//!
//! Every tool call passes the permission engine, then the PreToolUse hooks,
//! then the tool itself (shell commands go through the persistent command
//! session and its security classifier), then the PostToolUse hooks.

mod gate;

pub use gate::{ActionGate, GateError, GateOutcome, GateStage};
