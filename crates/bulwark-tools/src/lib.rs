//! Gated tools for Bulwark.

mod bash;
mod registry;

pub use bash::{BashTool, SharedSession};
pub use registry::ToolRegistry;
