//! Run results

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::identifiers::RunId;
use crate::error::WriteFailure;

/// Outcome of the background response writer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Response lines written and flushed to the child's stdin
    pub lines_delivered: usize,
    /// First write that failed, if any; nothing after it was attempted
    pub failure: Option<WriteFailure>,
    /// Writer did not finish within the join timeout and was aborted
    pub abandoned: bool,
}

impl DeliveryReport {
    /// Every queued line reached the child
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failure.is_none() && !self.abandoned
    }
}

/// Everything observed during one run
///
/// `lines` is the transcript assertions are usually written against;
/// `stdout` and `stderr` hold the raw text.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Run identifier used in log output
    pub run_id: RunId,
    /// Child's exit code (`128 + signal` if it was killed by a signal)
    pub exit_code: i32,
    /// Full captured stdout, newlines included
    pub stdout: String,
    /// Full captured stderr
    pub stderr: String,
    /// Trimmed stdout lines in arrival order
    pub lines: Vec<String>,
    /// Number of (line, rule) matches that queued a response
    pub prompts_matched: usize,
    /// `None` when no prompt matched and no writer was started
    pub delivery: Option<DeliveryReport>,
    /// OS process id of the child
    pub pid: Option<u32>,
    /// When the child was spawned
    pub started_at: DateTime<Utc>,
    /// Wall time from spawn to reap
    pub duration: Duration,
}

impl RunResult {
    /// Child exited with code 0
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Transcript contains a line equal to `line`
    #[must_use]
    pub fn contains_line(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }

    /// Index of the first transcript line containing `needle`
    #[must_use]
    pub fn position_of(&self, needle: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.contains(needle))
    }

    /// Whether a response writer was started during the run
    #[must_use]
    pub const fn writer_started(&self) -> bool {
        self.delivery.is_some()
    }
}
