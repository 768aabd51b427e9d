//! The process driver

use std::process::ExitStatus;
use std::time::Duration;

use chrono::Utc;
use tokio::process::{Child, ChildStdout};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{HarnessError, Result};
use crate::types::{PromptRule, RunId, RunRequest, RunResult};

use super::config::DriverConfig;
use super::lifecycle::{StderrCollector, exit_code, kill_and_reap, spawn_child};
use super::reader::RunState;

/// Why a run stopped before the child finished on its own
enum Interrupted {
    TimedOut(Duration),
    Cancelled,
}

/// Drives one child process per call to [`run`](Self::run)
///
/// The driver itself holds only configuration; every child, pipe and worker
/// is created inside a run and released before it returns.
#[derive(Debug, Clone, Default)]
pub struct ProcessDriver {
    config: DriverConfig,
}

impl ProcessDriver {
    /// Create a driver with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver with the given configuration
    #[must_use]
    pub const fn with_config(config: DriverConfig) -> Self {
        Self { config }
    }

    /// Driver configuration
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run the child described by `request`, answering its prompts
    ///
    /// Returns a [`RunResult`] whatever the child's exit code. `timeout`
    /// (or the configured default) bounds the whole call, stderr collection
    /// included; only reaping a killed child may add up to `kill_grace`.
    ///
    /// # Errors
    /// - [`HarnessError::Spawn`] if the child cannot be started
    /// - [`HarnessError::Timeout`] if it does not finish in time; the child is killed
    /// - [`HarnessError::Io`] if its stdout cannot be read
    pub async fn run(&self, request: &RunRequest, timeout: Option<Duration>) -> Result<RunResult> {
        self.run_with_cancel(request, timeout, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops early when `cancel` fires
    ///
    /// # Errors
    /// As [`run`](Self::run), plus [`HarnessError::Cancelled`] on cancellation
    pub async fn run_with_cancel(
        &self,
        request: &RunRequest,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        let deadline = timeout
            .or(self.config.default_timeout)
            .map(|limit| (clock + limit, limit));

        let spawned = spawn_child(run_id, request)?;
        let mut child = spawned.child;
        let pid = child.id();
        let stderr = StderrCollector::spawn(run_id, spawned.stderr);
        let mut state = RunState::new(run_id, spawned.stdin);

        let expired = async move {
            match deadline {
                Some((at, limit)) => {
                    tokio::time::sleep_until(at).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Interrupted::Cancelled),
            limit = expired => Err(Interrupted::TimedOut(limit)),
            status = self.drive(&mut state, &mut child, spawned.stdout, &request.rules) => {
                Ok(status)
            }
        };

        match outcome {
            Ok(Ok(status)) => {
                // The child has exited; stderr gets what is left of the deadline
                let (wait, bounded_by_deadline) = match deadline {
                    Some((at, _)) => {
                        let left = at.saturating_duration_since(Instant::now());
                        (left.min(self.config.join_timeout), left < self.config.join_timeout)
                    }
                    None => (self.config.join_timeout, false),
                };
                let (stderr, closed) = stderr.finish(wait).await;
                if let Some((_, limit)) = deadline
                    && bounded_by_deadline
                    && !closed
                {
                    return Err(interrupted(
                        run_id,
                        request.program(),
                        Interrupted::TimedOut(limit),
                        pid,
                        state.transcript.lines,
                    ));
                }

                let exit_code = exit_code(status);
                let duration = clock.elapsed();
                log::info!(
                    "[{run_id}] `{}` exited with {exit_code} after {duration:?}",
                    request.program()
                );

                Ok(RunResult {
                    run_id,
                    exit_code,
                    stdout: state.transcript.stdout,
                    stderr,
                    lines: state.transcript.lines,
                    prompts_matched: state.transcript.prompts_matched,
                    delivery: state.delivery,
                    pid,
                    started_at,
                    duration,
                })
            }
            Ok(Err(e)) => {
                log::warn!("[{run_id}] lost contact with child: {e}");
                self.teardown(run_id, &mut state, &mut child).await;
                stderr.abort();
                Err(e)
            }
            Err(reason) => {
                self.teardown(run_id, &mut state, &mut child).await;
                stderr.abort();
                Err(interrupted(
                    run_id,
                    request.program(),
                    reason,
                    pid,
                    state.transcript.lines,
                ))
            }
        }
    }

    /// Read to end-of-stream, release the writer, then wait for exit
    async fn drive(
        &self,
        state: &mut RunState,
        child: &mut Child,
        stdout: ChildStdout,
        rules: &[PromptRule],
    ) -> Result<ExitStatus> {
        state.read_stdout(stdout, rules).await?;
        state.release_stdin(self.config.join_timeout).await;
        Ok(child.wait().await?)
    }

    /// Kill and reap the child, then drop the writer without waiting on it
    async fn teardown(&self, run_id: RunId, state: &mut RunState, child: &mut Child) {
        kill_and_reap(run_id, child, self.config.kill_grace).await;
        state.release_stdin(Duration::ZERO).await;
    }
}

/// Error for a run that was stopped before the child finished
fn interrupted(
    run_id: RunId,
    program: &str,
    reason: Interrupted,
    pid: Option<u32>,
    lines: Vec<String>,
) -> HarnessError {
    let program = program.to_string();
    match reason {
        Interrupted::TimedOut(timeout) => {
            log::warn!("[{run_id}] `{program}` timed out after {timeout:?}");
            HarnessError::Timeout {
                program,
                timeout,
                pid,
                lines,
            }
        }
        Interrupted::Cancelled => {
            log::info!("[{run_id}] run of `{program}` cancelled");
            HarnessError::Cancelled {
                program,
                pid,
                lines,
            }
        }
    }
}
