//! Error types for the prompt harness

use std::time::Duration;

use thiserror::Error;

/// Main error type for the prompt harness
///
/// Only conditions that prevent establishing or observing the child's output
/// are errors. A non-zero exit code is a normal [`RunResult`](crate::RunResult),
/// and a response that could not be delivered is a [`WriteFailure`] recorded
/// on the result.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Child program could not be started (not found, permission denied, ...)
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        /// Program as given in argv[0]
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Child did not terminate within the allotted time and was killed
    #[error("Timeout: `{program}` did not finish within {timeout:?}")]
    Timeout {
        /// Program as given in argv[0]
        program: String,
        /// The limit that elapsed
        timeout: Duration,
        /// OS process id of the killed child
        pid: Option<u32>,
        /// Transcript observed before the deadline
        lines: Vec<String>,
    },

    /// Run was cancelled by the caller and the child was killed
    #[error("Run of `{program}` was cancelled")]
    Cancelled {
        /// Program as given in argv[0]
        program: String,
        /// OS process id of the killed child
        pid: Option<u32>,
        /// Transcript observed before cancellation
        lines: Vec<String>,
    },

    /// Request could not be turned into a command
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Prompt or capture pattern failed to compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Scenario definition or execution error
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// JSON decode error when loading a scenario
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    /// Create a spawn error
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a scenario error
    pub fn scenario(msg: impl Into<String>) -> Self {
        Self::Scenario(msg.into())
    }

    /// Transcript captured before a fatal timeout or cancellation
    #[must_use]
    pub fn partial_lines(&self) -> Option<&[String]> {
        match self {
            Self::Timeout { lines, .. } | Self::Cancelled { lines, .. } => Some(lines),
            _ => None,
        }
    }

    /// Whether this is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A scripted response that could not be written to the child
///
/// Recoverable: the run still completes and the failure is reported through
/// [`DeliveryReport`](crate::DeliveryReport).
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[error("Failed to deliver response line {line_index}: {message}")]
pub struct WriteFailure {
    /// Index (over all lines the writer was asked to deliver) of the first undelivered line
    pub line_index: usize,
    /// OS error description
    pub message: String,
    /// Whether the child's stdin was already closed
    pub broken_pipe: bool,
}

impl WriteFailure {
    pub(crate) fn from_io(line_index: usize, err: &std::io::Error) -> Self {
        Self {
            line_index,
            message: err.to_string(),
            broken_pipe: err.kind() == std::io::ErrorKind::BrokenPipe,
        }
    }
}
