//! Multi-step scenarios with explicit context
//!
//! A scenario is an ordered list of runs where later steps can use values
//! captured from earlier transcripts. The values live in a
//! [`ScenarioContext`] that is passed into [`Scenario::run`] and handed back
//! in the [`ScenarioOutcome`]; nothing is shared between steps implicitly.

mod context;
mod runner;
mod step;

pub use context::ScenarioContext;
pub use runner::{Scenario, ScenarioOutcome, StepReport};
pub use step::{Capture, ScenarioStep};
