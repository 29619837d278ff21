//! Shell-specific error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`CommandSession`](crate::CommandSession).
///
/// Process-level failures are not errors: they come back as a
/// [`CommandOutput`](crate::CommandOutput) with a non-zero exit code.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Command blocked by security policy [{category}] (pattern `{pattern}`): {reason}")]
    SecurityBlocked {
        category: String,
        pattern: String,
        reason: String,
    },

    #[error("Invalid working directory {}: {message}", path.display())]
    InvalidWorkingDirectory { path: PathBuf, message: String },
}
