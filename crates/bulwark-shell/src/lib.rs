//! Command execution core for Bulwark.
//!
//! - [`classify`] assigns a risk verdict (allow / warn / block) to a command string.
//! - [`CommandSession`] runs commands in a shell while carrying the working
//!   directory from one call to the next, refusing anything the classifier blocks.

pub mod classifier;
pub mod error;
pub mod session;
pub mod spawner;

pub use classifier::{SecurityVerdict, Severity, classify};
pub use error::ShellError;
pub use session::{CommandOutput, CommandSession, TIMEOUT_EXIT_CODE};
pub use spawner::{
    ProcessSpawner, RawOutput, ShellSpawner, SpawnRequest, SpawnResult, run_process_group,
};
