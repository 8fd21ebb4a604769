//! Bounded invocation of external tools.
//!
//! Every external program the cycle touches goes through [`run_command`]:
//! stdout and stderr are drained concurrently and the child is killed once
//! the deadline passes. An optional cleanup hook runs after a kill. Pipes
//! still held open by a grandchild after exit are abandoned after a short
//! grace period.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{PackyError, Result};

/// Runs after a timed-out child has been killed.
pub type TimeoutHook = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal or timed out.
    pub code: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    pub fn status_label(&self) -> String {
        match (self.timed_out, self.code) {
            (true, _) => "timeout".to_string(),
            (false, Some(code)) => format!("exit code {code}"),
            (false, None) => "signal".to_string(),
        }
    }
}

/// How long the pipes may stay open after the child exits. A background
/// grandchild can inherit them; whatever was read by then is kept.
const PIPE_GRACE: Duration = Duration::from_millis(250);

/// Spawn `program args...` and wait at most `timeout` for it to exit.
///
/// Spawn failures are errors; everything after a successful spawn
/// (nonzero exit, stderr, timeout) is reported through the outcome.
pub async fn run_command(
    program: &str,
    args: &[String],
    timeout: Duration,
    on_timeout: Option<TimeoutHook>,
) -> Result<CommandOutcome> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PackyError::ToolSpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

    let stdout = Drain::spawn(child.stdout.take());
    let stderr = Drain::spawn(child.stderr.take());

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    match waited {
        Ok(status) => {
            let status = status?;
            let (stdout, stderr) = tokio::join!(stdout.finish(), stderr.finish());
            let outcome = CommandOutcome {
                stdout,
                stderr,
                code: status.code(),
                timed_out: false,
            };
            debug!(
                program,
                status = %outcome.status_label(),
                stdout_bytes = outcome.stdout.len(),
                "external tool finished"
            );
            Ok(outcome)
        }
        Err(_) => {
            warn!(program, secs = timeout.as_secs(), "external tool timed out, killing");
            if let Err(e) = child.kill().await {
                warn!(program, error = %e, "failed to kill timed-out tool");
            }
            stdout.abort();
            stderr.abort();
            if let Some(hook) = on_timeout {
                hook();
            }
            Ok(CommandOutcome {
                timed_out: true,
                ..CommandOutcome::default()
            })
        }
    }
}

/// Reads a pipe into a shared buffer so that output read so far survives
/// the reader being aborted.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Drain {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut buf = sink.lock().unwrap_or_else(|e| e.into_inner());
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        });
        Self { buf, task }
    }

    /// Wait up to [`PIPE_GRACE`] for end of file, then stop reading.
    async fn finish(mut self) -> String {
        if tokio::time::timeout(PIPE_GRACE, &mut self.task).await.is_err() {
            debug!("pipe still open after exit, abandoning reader");
            self.task.abort();
        }
        self.contents()
    }

    fn abort(self) {
        self.task.abort();
    }

    fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}
