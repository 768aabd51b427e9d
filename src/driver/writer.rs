//! Background response writer
//!
//! Owns the child's stdin for the rest of the run. Responses arrive over a
//! channel in the order the reader matched them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::WriteFailure;
use crate::types::{DeliveryReport, RunId};

use super::config::LINE_TERMINATOR;

/// Handle to the writer task
pub(super) struct ResponseWriter {
    run_id: RunId,
    tx: mpsc::UnboundedSender<String>,
    delivered: Arc<AtomicUsize>,
    task: JoinHandle<DeliveryReport>,
}

impl ResponseWriter {
    /// Spawn the writer, moving `stdin` into it
    pub(super) fn spawn(run_id: RunId, stdin: ChildStdin) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let delivered = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(write_responses(run_id, stdin, rx, delivered.clone()));

        log::debug!("[{run_id}] response writer started");

        Self {
            run_id,
            tx,
            delivered,
            task,
        }
    }

    /// Queue response lines without waiting for them to be written
    ///
    /// Returns false if the writer has already stopped after a failed write.
    pub(super) fn queue(&self, lines: &[String]) -> bool {
        lines.iter().all(|line| self.tx.send(line.clone()).is_ok())
    }

    /// Close the queue and wait up to `join_timeout` for the writer to drain it
    ///
    /// A writer that does not finish in time is aborted, which drops (and
    /// so closes) the child's stdin.
    pub(super) async fn finish(self, join_timeout: Duration) -> DeliveryReport {
        let Self {
            run_id,
            tx,
            delivered,
            mut task,
        } = self;
        drop(tx);

        match tokio::time::timeout(join_timeout, &mut task).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                log::warn!("[{run_id}] response writer failed to join: {e}");
                DeliveryReport {
                    lines_delivered: delivered.load(Ordering::SeqCst),
                    failure: None,
                    abandoned: true,
                }
            }
            Err(_) => {
                task.abort();
                log::warn!(
                    "[{run_id}] response writer still blocked after {join_timeout:?}; abandoning it"
                );
                DeliveryReport {
                    lines_delivered: delivered.load(Ordering::SeqCst),
                    failure: None,
                    abandoned: true,
                }
            }
        }
    }
}

/// Writer task body
async fn write_responses(
    run_id: RunId,
    mut stdin: ChildStdin,
    mut rx: mpsc::UnboundedReceiver<String>,
    delivered: Arc<AtomicUsize>,
) -> DeliveryReport {
    let mut index = 0;

    while let Some(line) = rx.recv().await {
        if let Err(e) = write_line(&mut stdin, &line).await {
            let failure = WriteFailure::from_io(index, &e);
            if failure.broken_pipe {
                log::warn!("[{run_id}] child closed stdin before reading response: {failure}");
            } else {
                log::warn!("[{run_id}] {failure}");
            }
            return DeliveryReport {
                lines_delivered: delivered.load(Ordering::SeqCst),
                failure: Some(failure),
                abandoned: false,
            };
        }

        delivered.fetch_add(1, Ordering::SeqCst);
        index += 1;
        // Responses are often credentials
        log::trace!("[{run_id}] > {line}");
        log::debug!("[{run_id}] delivered response line {index}");
    }

    DeliveryReport {
        lines_delivered: delivered.load(Ordering::SeqCst),
        failure: None,
        abandoned: false,
    }
}

/// Write one line and flush it, the way a terminal delivers a typed answer
async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(LINE_TERMINATOR.as_bytes()).await?;
    stdin.flush().await
}
