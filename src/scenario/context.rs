//! Values carried from one scenario step to the next

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Named string values threaded through a scenario
///
/// `{{name}}` placeholders in step argv, env values and prompt responses are
/// expanded from here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioContext {
    values: BTreeMap<String, String>,
}

impl ScenarioContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Number of values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context holds no values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over values in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every `{{name}}` in `template` with its value
    ///
    /// # Errors
    /// Returns [`HarnessError::Scenario`] naming the first missing key
    pub fn expand(&self, template: &str) -> Result<String> {
        let mut missing = None;
        let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            match self.values.get(key) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(key) => Err(HarnessError::scenario(format!(
                "no value for placeholder `{{{{{key}}}}}` in `{template}`"
            ))),
            None => Ok(expanded.into_owned()),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScenarioContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_placeholders() {
        let ctx = ScenarioContext::new()
            .with("app", "a47ac10b")
            .with("env_id", "24-a47ac10b");
        assert_eq!(
            ctx.expand("api:environments:list {{app}} --env={{ env_id }}").unwrap(),
            "api:environments:list a47ac10b --env=24-a47ac10b"
        );
    }

    #[test]
    fn leaves_text_without_placeholders_alone() {
        let ctx = ScenarioContext::new();
        assert_eq!(ctx.expand("{not a placeholder}").unwrap(), "{not a placeholder}");
    }

    #[test]
    fn missing_key_is_an_error() {
        let ctx = ScenarioContext::new().with("app", "x");
        let err = ctx.expand("{{app}} {{uuid}}").unwrap_err();
        assert!(err.to_string().contains("{{uuid}}"), "{err}");
    }

    #[test]
    fn insert_returns_previous_value() {
        let mut ctx: ScenarioContext = [("k", "1")].into_iter().collect();
        assert_eq!(ctx.insert("k", "2").as_deref(), Some("1"));
        assert_eq!(ctx.get("k"), Some("2"));
        assert_eq!(ctx.len(), 1);
    }
}
