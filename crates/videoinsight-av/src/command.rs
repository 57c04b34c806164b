//! Builder for executing external tool commands with timeout and
//! cancellation support.
//!
//! Every invocation runs in its own process group on unix, so terminating a
//! job also terminates anything the tool spawned.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output, raw bytes.
    pub stdout: Vec<u8>,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Standard output decoded as lossy UTF-8.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use videoinsight_av::ToolCommand;
/// use std::time::Duration;
///
/// # async fn example() -> videoinsight_av::Result<()> {
/// let output = ToolCommand::new("ffprobe")
///     .args(["-v", "error", "-print_format", "json", "-show_format"])
///     .arg("/path/to/video.mkv")
///     .timeout(Duration::from_secs(30))
///     .execute()
///     .await?;
/// println!("{}", output.stdout_text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

enum Waited<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

type Collector = Option<JoinHandle<std::io::Result<Vec<u8>>>>;

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            cancel: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(iter.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Tie the invocation to a cancellation token.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    /// Short tool name used in errors and logs.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if the program does not exist.
    /// - [`Error::ToolFailed`] if spawning fails or the process exits with a
    ///   non-zero status (message includes stderr).
    /// - [`Error::Timeout`] if the process outlives the timeout; the whole
    ///   process group is killed first.
    /// - [`Error::Cancelled`] if the cancellation token fires; the whole
    ///   process group is killed first.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let tool = self.tool_name();

        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(Error::Cancelled { tool });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::tool_not_found(&tool),
            _ => Error::tool_failed(&tool, format!("failed to spawn: {e}")),
        })?;

        let pid = child.id();
        debug!(tool = %tool, pid = ?pid, "Spawned tool process");
        let deadline = tokio::time::Instant::now() + self.timeout;

        // Drain both pipes concurrently so a chatty stderr cannot stall stdout.
        let mut stdout_task = spawn_collector(child.stdout.take());
        let mut stderr_task = spawn_collector(child.stderr.take());

        let token = self.cancel.clone();
        let waited = tokio::select! {
            status = child.wait() => Waited::Done(status),
            _ = tokio::time::sleep_until(deadline) => Waited::TimedOut,
            _ = cancelled(token.as_ref()) => Waited::Cancelled,
        };
        let status = match waited {
            Waited::Done(status) => status.map_err(|e| {
                Error::tool_failed(&tool, format!("I/O error waiting for process: {e}"))
            })?,
            Waited::TimedOut => {
                return Err(self
                    .stop(&mut child, pid, &stdout_task, &stderr_task, false)
                    .await)
            }
            Waited::Cancelled => {
                return Err(self
                    .stop(&mut child, pid, &stdout_task, &stderr_task, true)
                    .await)
            }
        };

        // Anything the tool left running in its group still holds the pipes
        // open, so the same deadline and token apply to draining them.
        let drained = tokio::select! {
            out = async {
                (collect(&mut stdout_task).await, collect(&mut stderr_task).await)
            } => Waited::Done(out),
            _ = tokio::time::sleep_until(deadline) => Waited::TimedOut,
            _ = cancelled(token.as_ref()) => Waited::Cancelled,
        };
        let (stdout, stderr) = match drained {
            Waited::Done(out) => out,
            Waited::TimedOut => {
                return Err(self
                    .stop(&mut child, pid, &stdout_task, &stderr_task, false)
                    .await)
            }
            Waited::Cancelled => {
                return Err(self
                    .stop(&mut child, pid, &stdout_task, &stderr_task, true)
                    .await)
            }
        };
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            return Err(Error::tool_failed(
                tool,
                format!("exited with status {}: {}", status, stderr.trim()),
            ));
        }

        Ok(ToolOutput {
            status,
            stdout,
            stderr,
        })
    }

    /// Kill the process group, drop the pipe readers, and build the error.
    async fn stop(
        &self,
        child: &mut Child,
        pid: Option<u32>,
        stdout_task: &Collector,
        stderr_task: &Collector,
        cancelled: bool,
    ) -> Error {
        let tool = self.tool_name();
        kill_tree(child, pid, &tool).await;
        abort(stdout_task);
        abort(stderr_task);
        if cancelled {
            Error::Cancelled { tool }
        } else {
            Error::Timeout {
                tool,
                after: self.timeout,
            }
        }
    }
}

fn spawn_collector<R>(pipe: Option<R>) -> Collector
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).await.map(|_| buf)
        })
    })
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

async fn collect(task: &mut Collector) -> Vec<u8> {
    match task.as_mut() {
        Some(task) => task.await.ok().and_then(|r| r.ok()).unwrap_or_default(),
        None => Vec::new(),
    }
}

fn abort(task: &Collector) {
    if let Some(task) = task {
        task.abort();
    }
}

/// Kill the child and every process in its group, then reap it.
///
/// `pid` is recorded at spawn: once the child has been reaped its id is
/// gone, but the rest of its group may still be alive.
async fn kill_tree(child: &mut Child, pid: Option<u32>, tool: &str) {
    #[cfg(not(unix))]
    let _ = pid;

    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(tool = %tool, pid, error = %e, "killpg failed");
        }
    }

    if let Err(e) = child.start_kill() {
        debug!(tool = %tool, error = %e, "Process already exited");
    }
    let _ = child.wait().await;
}
