//! # Prompt Harness
//!
//! Drive interactive command-line programs from tests. The harness launches a
//! child process, reads its stdout line by line, answers prompts it
//! recognizes by writing scripted lines to the child's stdin, and hands back
//! the exit code, the raw output, and the ordered transcript.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kodegen_prompt_harness::{PromptRule, RunRequest, run};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = RunRequest::builder(["acli", "auth:login"])
//!         .rule(PromptRule::contains("Enter a new API key", ["key123"]))
//!         .build();
//!
//!     let result = run(&request, Some(Duration::from_secs(30))).await?;
//!     assert_eq!(result.exit_code, 0);
//!     assert!(result.contains_line("Saved credentials"));
//!     Ok(())
//! }
//! ```
//!
//! ## How prompts are answered
//!
//! Stdout is read on the calling task, one line at a time. Every
//! [`PromptRule`] is checked against every line; a match queues the rule's
//! response on a background writer that owns the child's stdin. The reader
//! never waits on that write, so a child that prints more before reading its
//! input cannot deadlock the run. Once stdout closes the writer is joined
//! with a bounded wait and the child is reaped.
//!
//! A run that never matches a prompt never starts a writer. A response that
//! cannot be written because the child already closed its stdin is logged and
//! recorded in [`RunResult::delivery`]; it does not fail the run.
//!
//! ## Scenarios
//!
//! [`scenario`] chains runs together. Values captured from one step's
//! transcript are stored in a [`ScenarioContext`] and substituted into later
//! steps through `{{name}}` placeholders.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, HarnessError>`](Result):
//!
//! ```no_run
//! # use kodegen_prompt_harness::{HarnessError, RunRequest, run};
//! # use std::time::Duration;
//! # async fn example() {
//! let request = RunRequest::new(["sleep", "60"], vec![]);
//! match run(&request, Some(Duration::from_secs(1))).await {
//!     Ok(result) => log::info!("exit code {}", result.exit_code),
//!     Err(HarnessError::Timeout { lines, .. }) => {
//!         log::error!("timed out after {} line(s)", lines.len());
//!     }
//!     Err(e) => log::error!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod driver;
pub mod error;
pub mod scenario;
pub mod types;

// Re-export commonly used types for external API
pub use driver::{DriverConfig, DriverConfigBuilder, ProcessDriver, run};
pub use error::{HarnessError, Result, WriteFailure};
pub use scenario::{Capture, Scenario, ScenarioContext, ScenarioOutcome, ScenarioStep, StepReport};
pub use types::{
    DeliveryReport, PromptMatcher, PromptRule, RunId, RunRequest, RunRequestBuilder, RunResult,
    StepName,
};

pub use tokio_util::sync::CancellationToken;

/// Version of the harness
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
