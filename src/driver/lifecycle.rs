//! Lifecycle management for the child process (spawn, drain, kill, reap)

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;

use crate::error::{HarnessError, Result};
use crate::types::{RunId, RunRequest};

use super::command::CommandBuilder;
use super::config::STDERR_CHUNK_SIZE;

/// A freshly spawned child with its pipes detached
pub(super) struct SpawnedChild {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Spawn the child described by `request`
///
/// # Errors
/// Returns [`HarnessError::Spawn`] if the program cannot be started
pub(super) fn spawn_child(run_id: RunId, request: &RunRequest) -> Result<SpawnedChild> {
    let program = request.program();
    let mut cmd = CommandBuilder::new(request).build()?;

    let mut child = cmd.spawn().map_err(|e| {
        if let Some(ref cwd) = request.cwd
            && !cwd.exists()
        {
            return HarnessError::spawn(
                program,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("working directory does not exist: {}", cwd.display()),
                ),
            );
        }
        HarnessError::spawn(program, e)
    })?;

    log::info!(
        "[{run_id}] spawned `{}` (pid {:?})",
        request.argv.join(" "),
        child.id()
    );

    // Dropping `child` on the error paths kills it (kill_on_drop)
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| HarnessError::spawn(program, missing_pipe("stdin")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| HarnessError::spawn(program, missing_pipe("stdout")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| HarnessError::spawn(program, missing_pipe("stderr")))?;

    Ok(SpawnedChild {
        child,
        stdin,
        stdout,
        stderr,
    })
}

fn missing_pipe(name: &str) -> std::io::Error {
    std::io::Error::other(format!("failed to get {name} handle"))
}

/// Drains stderr for the whole run so the child never blocks on a full pipe
pub(super) struct StderrCollector {
    run_id: RunId,
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl StderrCollector {
    pub(super) fn spawn(run_id: RunId, mut stderr: ChildStderr) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();

        let task = tokio::spawn(async move {
            let mut chunk = vec![0u8; STDERR_CHUNK_SIZE];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) => break, // EOF
                    Ok(n) => {
                        sink.lock().extend_from_slice(&chunk[..n]);
                    }
                    Err(e) => {
                        log::debug!("[{run_id}] stderr read failed: {e}");
                        break;
                    }
                }
            }
        });

        Self {
            run_id,
            buffer,
            task,
        }
    }

    /// Wait up to `wait` for stderr to close, then return what was read
    ///
    /// A grandchild that inherited stderr can keep it open after the child
    /// exits; in that case the drain is abandoned and the text so far returned.
    /// The flag is false when the drain was abandoned.
    pub(super) async fn finish(self, wait: Duration) -> (String, bool) {
        let Self {
            run_id,
            buffer,
            mut task,
        } = self;

        let closed = tokio::time::timeout(wait, &mut task).await.is_ok();
        if !closed {
            task.abort();
            log::warn!("[{run_id}] stderr still open after {wait:?}; returning partial text");
        }

        let bytes = buffer.lock();
        (String::from_utf8_lossy(&bytes).into_owned(), closed)
    }

    /// Stop draining without waiting
    pub(super) fn abort(self) {
        self.task.abort();
    }
}

/// Kill the child and wait up to `grace` for it to be reaped
pub(super) async fn kill_and_reap(run_id: RunId, child: &mut Child, grace: Duration) {
    if let Err(e) = child.start_kill() {
        // Already exited; still reap below
        log::debug!("[{run_id}] kill failed: {e}");
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => log::info!("[{run_id}] child killed ({status})"),
        Ok(Err(e)) => log::warn!("[{run_id}] failed to reap killed child: {e}"),
        Err(_) => log::warn!("[{run_id}] killed child not reaped within {grace:?}"),
    }
}

/// Exit code as an integer; signal deaths map to `128 + signal` on Unix
pub(super) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
