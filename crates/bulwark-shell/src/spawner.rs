//! Process spawning seam used by [`CommandSession`](crate::CommandSession).

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long to keep reading pipes after the process group is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause between SIGTERM and SIGKILL when a timed-out group is torn down.
const KILL_GRACE: Duration = Duration::from_millis(250);

/// Everything needed to run one wrapped command.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Full shell script, already wrapped by the session.
    pub script: String,
    pub cwd: PathBuf,
    /// Environment snapshot; the child sees exactly these variables.
    pub env: Arc<BTreeMap<String, String>>,
    pub timeout: Duration,
}

/// Buffered result of a process that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    /// Exit code, `None` if the process died from a signal.
    pub code: Option<i32>,
    /// Terminating signal, if any.
    pub signal: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// How a spawn attempt ended.
#[derive(Debug)]
pub enum SpawnResult {
    Completed(RawOutput),
    /// The process was killed after exceeding its timeout.
    TimedOut,
    /// The process could not be started or awaited.
    Failed(std::io::Error),
}

/// Starts processes on behalf of a session.
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility, matching the `Tool` trait.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, request: SpawnRequest) -> Pin<Box<dyn Future<Output = SpawnResult> + Send + '_>>;
}

/// Default spawner: runs the script with `<shell> -c`.
#[derive(Debug, Clone)]
pub struct ShellSpawner {
    shell: String,
}

impl ShellSpawner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellSpawner {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl ProcessSpawner for ShellSpawner {
    fn spawn(&self, request: SpawnRequest) -> Pin<Box<dyn Future<Output = SpawnResult> + Send + '_>> {
        Box::pin(async move {
            let mut command = Command::new(&self.shell);
            command
                .arg("-c")
                .arg(&request.script)
                .current_dir(&request.cwd)
                .env_clear()
                .envs(request.env.iter());
            run_process_group(command, None, request.timeout).await
        })
    }
}

/// Run `command` as the leader of a new process group, writing `stdin` to it
/// when given.
///
/// Completion is the leader's exit, not EOF on its pipes: a background job
/// that inherited stdout cannot hold the call open. When the leader exits the
/// rest of its group is killed and the pipes are drained for a bounded time.
/// On timeout the whole group gets SIGTERM, then SIGKILL.
pub async fn run_process_group(
    mut command: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> SpawnResult {
    command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return SpawnResult::Failed(e),
    };
    let group = ProcessGroup::of(&child);
    let stdout = PipeCapture::start(child.stdout.take());
    let stderr = PipeCapture::start(child.stderr.take());

    if let (Some(mut pipe), Some(bytes)) = (child.stdin.take(), stdin) {
        tokio::spawn(async move {
            // A child that ignores its input may close the pipe early.
            let _ = pipe.write_all(&bytes).await;
            let _ = pipe.shutdown().await;
        });
    }

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            group.kill();
            return SpawnResult::Failed(e);
        }
        Err(_) => {
            group.terminate().await;
            let _ = child.kill().await;
            return SpawnResult::TimedOut;
        }
    };

    // Whatever the leader left running still holds the pipes.
    group.kill();
    let (stdout, stderr) = tokio::join!(stdout.finish(), stderr.finish());
    SpawnResult::Completed(RawOutput {
        code: status.code(),
        signal: exit_signal(&status),
        stdout,
        stderr,
    })
}

/// The process group led by a spawned child.
struct ProcessGroup {
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
}

#[cfg(unix)]
impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self {
            pgid: child
                .id()
                .and_then(|pid| i32::try_from(pid).ok())
                .map(nix::unistd::Pid::from_raw),
        }
    }

    fn signal(&self, signal: nix::sys::signal::Signal) {
        if let Some(pgid) = self.pgid {
            // ESRCH means every member has already exited.
            let _ = nix::sys::signal::killpg(pgid, signal);
        }
    }

    fn kill(&self) {
        self.signal(nix::sys::signal::Signal::SIGKILL);
    }

    async fn terminate(&self) {
        self.signal(nix::sys::signal::Signal::SIGTERM);
        tokio::time::sleep(KILL_GRACE).await;
        self.kill();
    }
}

#[cfg(not(unix))]
impl ProcessGroup {
    fn of(_child: &Child) -> Self {
        Self {}
    }

    fn kill(&self) {}

    async fn terminate(&self) {
        tokio::time::sleep(KILL_GRACE).await;
    }
}

/// Reads one pipe into a shared buffer so a bounded drain keeps partial output.
struct PipeCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl PipeCapture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => lock(&buffer).extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buffer, task }
    }

    /// Wait up to [`DRAIN_TIMEOUT`] for EOF, then return what was read.
    async fn finish(mut self) -> Vec<u8> {
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
                tracing::debug!("Output pipe still open after drain timeout");
                abort.abort();
            }
        }
        std::mem::take(&mut *lock(&self.buffer))
    }
}

impl Drop for PipeCapture {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock(buffer: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
