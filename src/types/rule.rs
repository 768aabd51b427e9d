//! Prompt rules: which output lines to answer, and with what

use regex::Regex;
use serde::Deserialize;

use crate::error::{HarnessError, Result};

/// Condition evaluated against each raw stdout line
#[derive(Debug, Clone)]
pub enum PromptMatcher {
    /// Line contains this substring
    Contains(String),
    /// Line matches this regular expression anywhere
    Regex(Regex),
}

impl PromptMatcher {
    /// Check a raw output line (newline still attached) against this matcher
    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        match self {
            Self::Contains(needle) => line.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(line),
        }
    }

    /// Source text of the matcher, for logging
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Contains(needle) => needle,
            Self::Regex(re) => re.as_str(),
        }
    }
}

/// A match condition on an output line paired with the lines to type back
///
/// Rules are not consumed when they fire. A prompt that repeats triggers the
/// same response again.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawPromptRule")]
pub struct PromptRule {
    matcher: PromptMatcher,
    response: Vec<String>,
}

impl PromptRule {
    /// Rule that fires on lines containing `needle`
    pub fn contains<I, S>(needle: impl Into<String>, response: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matcher: PromptMatcher::Contains(needle.into()),
            response: response.into_iter().map(Into::into).collect(),
        }
    }

    /// Rule that fires on lines matching the regular expression `pattern`
    ///
    /// # Errors
    /// Returns error if `pattern` is not a valid regex
    pub fn regex<I, S>(pattern: &str, response: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            matcher: PromptMatcher::Regex(Regex::new(pattern)?),
            response: response.into_iter().map(Into::into).collect(),
        })
    }

    /// The match condition
    #[must_use]
    pub const fn matcher(&self) -> &PromptMatcher {
        &self.matcher
    }

    /// Lines written to the child when this rule fires, in order
    #[must_use]
    pub fn response(&self) -> &[String] {
        &self.response
    }

    /// Whether `line` triggers this rule
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.matcher.is_match(line)
    }

    /// Same matcher with every response line rewritten by `f`
    ///
    /// # Errors
    /// Returns the first error produced by `f`
    pub fn try_map_response<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let response = self
            .response
            .iter()
            .map(|line| f(line))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            matcher: self.matcher.clone(),
            response,
        })
    }
}

/// Wire shape of a rule in scenario files
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPromptRule {
    #[serde(rename = "match")]
    pattern: String,
    #[serde(default)]
    regex: bool,
    #[serde(default)]
    response: Vec<String>,
}

impl TryFrom<RawPromptRule> for PromptRule {
    type Error = HarnessError;

    fn try_from(raw: RawPromptRule) -> Result<Self> {
        if raw.pattern.is_empty() {
            return Err(HarnessError::invalid_request(
                "prompt rule `match` must not be empty",
            ));
        }
        if raw.regex {
            Self::regex(&raw.pattern, raw.response)
        } else {
            Ok(Self::contains(raw.pattern, raw.response))
        }
    }
}
