//! Type definitions for the prompt harness
//!
//! - [`identifiers`] - Type-safe ID wrappers (`RunId`, `StepName`)
//! - [`rule`] - Prompt rules and matchers
//! - [`request`] - Run requests and their builder
//! - [`result`] - Run results and delivery reports

pub mod identifiers;
pub mod request;
pub mod result;
pub mod rule;

// Re-export commonly used types
pub use identifiers::{RunId, StepName};
pub use request::{RunRequest, RunRequestBuilder};
pub use result::{DeliveryReport, RunResult};
pub use rule::{PromptMatcher, PromptRule};
