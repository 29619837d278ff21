//! Shared types and error hierarchy for Bulwark.

pub mod error;
pub mod tool;
pub mod util;

pub use error::{BulwarkError, ConfigError, ToolError};
pub use tool::*;
pub use util::{truncate_output, truncate_str};
