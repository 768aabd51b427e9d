//! Scenario execution

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::ProcessDriver;
use crate::error::{HarnessError, Result};
use crate::types::{RunResult, StepName};

use super::context::ScenarioContext;
use super::step::ScenarioStep;

/// An ordered list of steps sharing one [`ScenarioContext`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Optional scenario name
    #[serde(default)]
    pub name: Option<String>,
    /// Per-step timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Steps, run in order
    pub steps: Vec<ScenarioStep>,
    /// Per-step timeout set through [`timeout`](Self::timeout); wins over `timeout_secs`
    #[serde(skip)]
    timeout: Option<Duration>,
}

/// What one step did
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Step name
    pub name: StepName,
    /// Exit code the step was expected to produce
    pub expected_exit: i32,
    /// Values captured into the context by this step
    pub captured: Vec<(String, String)>,
    /// The run itself
    pub result: RunResult,
}

impl StepReport {
    /// Step produced its expected exit code
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.result.exit_code == self.expected_exit
    }
}

/// Result of a whole scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    /// Context after the last step that ran
    pub context: ScenarioContext,
    /// Reports for every step that ran
    pub steps: Vec<StepReport>,
    /// First step whose exit code was unexpected; later steps did not run
    pub stopped_at: Option<StepName>,
}

impl ScenarioOutcome {
    /// Every step ran and produced its expected exit code
    #[must_use]
    pub fn passed(&self) -> bool {
        self.stopped_at.is_none() && self.steps.iter().all(StepReport::passed)
    }
}

impl Scenario {
    /// Create a scenario from steps
    #[must_use]
    pub fn new(steps: Vec<ScenarioStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Set the per-step timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Timeout applied to each step, if any
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.timeout.or_else(|| self.timeout_secs.map(Duration::from_secs))
    }

    /// Parse a scenario from JSON
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or a pattern is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(json)?;
        if scenario.steps.is_empty() {
            return Err(HarnessError::scenario("scenario has no steps"));
        }
        Ok(scenario)
    }

    /// Load a scenario from a JSON file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Run every step in order, threading `ctx` through them
    ///
    /// Stops after the first step with an unexpected exit code; that step is
    /// still reported and its captures are skipped.
    ///
    /// # Errors
    /// Returns error if a step cannot be spawned, times out, references a
    /// missing context value, or a capture finds nothing
    pub async fn run(
        &self,
        driver: &ProcessDriver,
        mut ctx: ScenarioContext,
    ) -> Result<ScenarioOutcome> {
        let timeout = self.step_timeout();
        let mut reports = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let request = step.to_request(&ctx)?;
            log::info!("step `{}`: {}", step.name, request.argv.join(" "));

            let result = driver.run(&request, timeout).await?;
            let expected_exit = step.expected_exit();

            if result.exit_code != expected_exit {
                log::warn!(
                    "step `{}` exited with {} (expected {expected_exit}); stopping",
                    step.name,
                    result.exit_code
                );
                reports.push(StepReport {
                    name: step.name.clone(),
                    expected_exit,
                    captured: Vec::new(),
                    result,
                });
                return Ok(ScenarioOutcome {
                    context: ctx,
                    steps: reports,
                    stopped_at: Some(step.name.clone()),
                });
            }

            let mut captured = Vec::with_capacity(step.captures.len());
            for capture in &step.captures {
                let value = capture.apply(&result.lines).ok_or_else(|| {
                    HarnessError::scenario(format!(
                        "step `{}`: capture `{}` matched no output line",
                        step.name,
                        capture.name()
                    ))
                })?;
                log::debug!("step `{}`: captured `{}`", step.name, capture.name());
                ctx.insert(capture.name(), value.clone());
                captured.push((capture.name().to_string(), value));
            }

            reports.push(StepReport {
                name: step.name.clone(),
                expected_exit,
                captured,
                result,
            });
        }

        Ok(ScenarioOutcome {
            context: ctx,
            steps: reports,
            stopped_at: None,
        })
    }
}
