//! Persistent command session — one logical shell whose working directory
//! survives across calls.
//!
//! A child process cannot change its parent's directory, so every command is
//! wrapped: it runs inside a `{ ...; }` group, its exit status is saved, and the
//! shell then prints a unique delimiter followed by `pwd`. The session splits
//! stdout on that delimiter to recover both the real output and the directory
//! the command left the shell in.

use crate::classifier::classify;
use crate::error::ShellError;
use crate::spawner::{ProcessSpawner, RawOutput, ShellSpawner, SpawnRequest, SpawnResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Exit code reported when a command is killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported for spawn failures and signal deaths.
const FAILURE_EXIT_CODE: i32 = 1;

/// Result of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Reason from a `warn` security verdict, if the command drew one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_warning: Option<String>,
}

impl CommandOutput {
    fn failure(message: String) -> Self {
        Self {
            exit_code: FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: message,
            security_warning: None,
        }
    }
}

/// A shell session with durable working-directory state.
///
/// `execute` takes `&mut self`: calls on one session can never overlap, since
/// each one reads and may rewrite the working directory. Runtimes that share a
/// session put it behind an async mutex.
pub struct CommandSession {
    working_directory: PathBuf,
    environment: Arc<BTreeMap<String, String>>,
    spawner: Arc<dyn ProcessSpawner>,
}

impl std::fmt::Debug for CommandSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSession")
            .field("working_directory", &self.working_directory)
            .field("environment_vars", &self.environment.len())
            .finish_non_exhaustive()
    }
}

impl CommandSession {
    /// Create a session rooted at `cwd`, snapshotting the process environment.
    ///
    /// Later changes to the process environment are not observed.
    pub fn new(cwd: impl AsRef<Path>) -> Result<Self, ShellError> {
        Ok(Self {
            working_directory: validate_directory(cwd.as_ref())?,
            environment: Arc::new(snapshot_environment(std::env::vars_os())),
            spawner: Arc::new(ShellSpawner::default()),
        })
    }

    /// Replace the environment snapshot.
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    /// Replace the process spawner.
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// The directory the next command will run in.
    pub fn current_dir(&self) -> &Path {
        &self.working_directory
    }

    /// Run `command` in the session's directory.
    ///
    /// Fails only when the security classifier blocks the command, in which
    /// case nothing is spawned. Every other failure comes back as a non-zero
    /// `exit_code`.
    pub async fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, ShellError> {
        let verdict = classify(command);
        if verdict.is_blocked() {
            tracing::warn!(
                category = %verdict.category,
                reason = %verdict.reason,
                "Refusing to run blocked command"
            );
            return Err(ShellError::SecurityBlocked {
                category: verdict.category,
                pattern: verdict.pattern,
                reason: verdict.reason,
            });
        }

        let delimiter = new_delimiter();
        let request = SpawnRequest {
            script: wrap_command(command, &delimiter),
            cwd: self.working_directory.clone(),
            env: Arc::clone(&self.environment),
            timeout,
        };

        tracing::debug!(cwd = %self.working_directory.display(), command, "Executing command");

        let mut output = match self.spawner.spawn(request).await {
            SpawnResult::Completed(raw) => self.finish(raw, &delimiter),
            SpawnResult::TimedOut => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Command timed out");
                CommandOutput {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout: String::new(),
                    stderr: format!("Command timed out after {}ms", timeout.as_millis()),
                    security_warning: None,
                }
            }
            SpawnResult::Failed(e) => {
                tracing::warn!(error = %e, "Failed to spawn command");
                CommandOutput::failure(format!("Failed to spawn command: {e}"))
            }
        };

        if verdict.is_warning() {
            output.security_warning = Some(verdict.reason);
        }
        Ok(output)
    }

    /// Split the delimiter off stdout and adopt the reported directory.
    fn finish(&mut self, raw: RawOutput, delimiter: &str) -> CommandOutput {
        let stdout = String::from_utf8_lossy(&raw.stdout);
        let mut stderr = String::from_utf8_lossy(&raw.stderr).into_owned();

        let (body, reported_dir) = split_delimited(&stdout, delimiter);
        if let Some(dir) = reported_dir {
            self.adopt_directory(Path::new(dir));
        }

        let exit_code = match (raw.code, raw.signal) {
            (Some(code), _) => code,
            (None, signal) => {
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                match signal {
                    Some(sig) => stderr.push_str(&format!("Process terminated by signal {sig}")),
                    None => stderr.push_str("Process terminated abnormally"),
                }
                FAILURE_EXIT_CODE
            }
        };

        CommandOutput {
            exit_code,
            stdout: body.to_string(),
            stderr,
            security_warning: None,
        }
    }

    fn adopt_directory(&mut self, dir: &Path) {
        if dir.is_absolute() && dir.is_dir() {
            if dir != self.working_directory {
                tracing::debug!(cwd = %dir.display(), "Working directory changed");
                self.working_directory = dir.to_path_buf();
            }
        } else {
            tracing::debug!(dir = %dir.display(), "Ignoring reported directory that does not exist");
        }
    }
}

/// Keep the variables that are valid UTF-8; the rest are dropped with a warning.
fn snapshot_environment(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> BTreeMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                let name = match &key {
                    Ok(key) => key.clone(),
                    Err(raw) => raw.to_string_lossy().into_owned(),
                };
                tracing::warn!(variable = %name, "Skipping non-UTF-8 environment variable");
                None
            }
        })
        .collect()
}

fn validate_directory(path: &Path) -> Result<PathBuf, ShellError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| ShellError::InvalidWorkingDirectory {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    if !canonical.is_dir() {
        return Err(ShellError::InvalidWorkingDirectory {
            path: path.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }
    Ok(canonical)
}

/// A delimiter no legitimate output will contain.
fn new_delimiter() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("__BULWARK_CWD_{nanos}_{}__", uuid::Uuid::new_v4().simple())
}

/// Wrap `command` so the shell reports its final directory after `delimiter`
/// and exits with the command's own status.
fn wrap_command(command: &str, delimiter: &str) -> String {
    format!(
        "{{ {command}\n}}\n__bulwark_status=$?\nprintf '\\n%s\\n' '{delimiter}'\npwd\nexit $__bulwark_status\n"
    )
}

/// Split stdout into (command output, reported directory).
///
/// Without the delimiter (the shell exited early) the whole text is output
/// and no directory is reported.
fn split_delimited<'a>(stdout: &'a str, delimiter: &str) -> (&'a str, Option<&'a str>) {
    let marker = format!("\n{delimiter}\n");
    match stdout.rfind(&marker) {
        Some(idx) => {
            let tail = &stdout[idx + marker.len()..];
            let dir = tail.strip_suffix('\n').unwrap_or(tail);
            (&stdout[..idx], (!dir.is_empty()).then_some(dir))
        }
        None => (stdout, None),
    }
}
