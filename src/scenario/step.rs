//! Scenario steps and transcript captures

use std::collections::HashMap;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;

use crate::error::{HarnessError, Result};
use crate::types::{PromptRule, RunRequest, StepName};

use super::context::ScenarioContext;

// ============================================================================
// Capture
// ============================================================================

/// Pulls a value out of a step's transcript into the context
///
/// The first transcript line matching `pattern` supplies the value: capture
/// group 1 if the pattern has one, otherwise the whole match.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawCapture")]
pub struct Capture {
    name: String,
    pattern: Regex,
}

impl Capture {
    /// Create a capture storing into `name`
    ///
    /// # Errors
    /// Returns error if `pattern` is not a valid regex
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// Context key the value is stored under
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value from the first matching line, if any
    #[must_use]
    pub fn apply(&self, lines: &[String]) -> Option<String> {
        lines.iter().find_map(|line| {
            let caps = self.pattern.captures(line)?;
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCapture {
    name: String,
    pattern: String,
}

impl TryFrom<RawCapture> for Capture {
    type Error = HarnessError;

    fn try_from(raw: RawCapture) -> Result<Self> {
        Self::new(raw.name, &raw.pattern)
    }
}

// ============================================================================
// Scenario Step
// ============================================================================

/// One run inside a scenario
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioStep {
    /// Step name, used in reports and errors
    pub name: StepName,
    /// Program and arguments; may contain `{{placeholders}}`
    pub argv: Vec<String>,
    /// Prompt rules; responses may contain `{{placeholders}}`
    #[serde(default)]
    pub rules: Vec<PromptRule>,
    /// Extra environment; values may contain `{{placeholders}}`
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Values to extract from the transcript after the run
    #[serde(default)]
    pub captures: Vec<Capture>,
    /// Exit code the step must produce for the scenario to continue (default 0)
    #[serde(default)]
    pub expect_exit: Option<i32>,
}

impl ScenarioStep {
    /// Create a step with no rules or captures
    pub fn new<I, S>(name: impl Into<StepName>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            argv: argv.into_iter().map(Into::into).collect(),
            rules: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            captures: Vec::new(),
            expect_exit: None,
        }
    }

    /// Add a prompt rule
    #[must_use]
    pub fn rule(mut self, rule: PromptRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a capture
    #[must_use]
    pub fn capture(mut self, capture: Capture) -> Self {
        self.captures.push(capture);
        self
    }

    /// Set an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the expected exit code
    #[must_use]
    pub const fn expect_exit(mut self, code: i32) -> Self {
        self.expect_exit = Some(code);
        self
    }

    /// Exit code this step must produce
    #[must_use]
    pub fn expected_exit(&self) -> i32 {
        self.expect_exit.unwrap_or(0)
    }

    /// Build the concrete request for this step from `ctx`
    ///
    /// # Errors
    /// Returns [`HarnessError::Scenario`] if a placeholder has no value
    pub fn to_request(&self, ctx: &ScenarioContext) -> Result<RunRequest> {
        let argv = self
            .argv
            .iter()
            .map(|arg| ctx.expand(arg))
            .collect::<Result<Vec<_>>>()?;

        let rules = self
            .rules
            .iter()
            .map(|rule| rule.try_map_response(|line| ctx.expand(line)))
            .collect::<Result<Vec<_>>>()?;

        let env = self
            .env
            .iter()
            .map(|(k, v)| Ok((k.clone(), ctx.expand(v)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(RunRequest {
            argv,
            rules,
            cwd: self.cwd.clone(),
            env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_prefers_first_group() {
        let capture = Capture::new("uuid", r"Application UUID:\s+(\S+)").unwrap();
        let lines = vec![
            "Listing applications".to_string(),
            "Application UUID: a47ac10b-58cc".to_string(),
            "Application UUID: ffffffff".to_string(),
        ];
        assert_eq!(capture.apply(&lines).as_deref(), Some("a47ac10b-58cc"));
    }

    #[test]
    fn capture_without_group_takes_whole_match() {
        let capture = Capture::new("id", r"\d+-[a-f0-9]+").unwrap();
        let lines = vec!["env 24-a47ac10b ready".to_string()];
        assert_eq!(capture.apply(&lines).as_deref(), Some("24-a47ac10b"));
    }

    #[test]
    fn to_request_expands_argv_env_and_responses() {
        let step = ScenarioStep::new("link", ["acli", "app:link", "{{app}}"])
            .rule(PromptRule::contains("Choose", ["{{choice}}"]))
            .env("ACLI_KEY", "{{key}}");
        let ctx = ScenarioContext::new()
            .with("app", "a47")
            .with("choice", "3")
            .with("key", "k1");

        let request = step.to_request(&ctx).unwrap();
        assert_eq!(request.argv, ["acli", "app:link", "a47"]);
        assert_eq!(request.rules[0].response(), ["3"]);
        assert_eq!(request.env.get("ACLI_KEY").map(String::as_str), Some("k1"));
    }

    #[test]
    fn to_request_fails_on_missing_value() {
        let step = ScenarioStep::new("link", ["acli", "{{app}}"]);
        assert!(step.to_request(&ScenarioContext::new()).is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let step: ScenarioStep = serde_json::from_str(
            r#"{"name": "whoami", "argv": ["id", "-u"],
                "captures": [{"name": "uid", "pattern": "^(\\d+)$"}]}"#,
        )
        .unwrap();
        assert_eq!(step.name.as_str(), "whoami");
        assert_eq!(step.expected_exit(), 0);
        assert_eq!(step.captures[0].name(), "uid");
        assert!(step.rules.is_empty());
    }
}
