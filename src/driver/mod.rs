//! Process driver: run one child, answer its prompts, collect its output
//!
//! The driver reads the child's stdout one line at a time on the calling
//! task. When a line matches a [`PromptRule`](crate::PromptRule) the rule's
//! response is queued to a single background writer that owns the child's
//! stdin, so a child that is slow to read its input can never stall the
//! output reader.

mod command;
mod config;
mod lifecycle;
mod process;
mod reader;
mod writer;

use std::time::Duration;

use crate::error::Result;
use crate::types::{RunRequest, RunResult};

// Re-export public types
pub use config::{DEFAULT_JOIN_TIMEOUT, DriverConfig, DriverConfigBuilder};
pub use process::ProcessDriver;

/// Run `request` with a default [`ProcessDriver`]
///
/// # Errors
/// See [`ProcessDriver::run`]
pub async fn run(request: &RunRequest, timeout: Option<Duration>) -> Result<RunResult> {
    ProcessDriver::new().run(request, timeout).await
}
