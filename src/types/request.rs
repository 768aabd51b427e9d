//! Run requests and their builder
//!
//! A [`RunRequest`] is everything the driver needs to launch one child:
//! argv, the prompt rules to answer, and optional process environment.

use std::collections::HashMap;
use std::path::PathBuf;

use super::rule::PromptRule;

// ============================================================================
// Run Request
// ============================================================================

/// One child invocation plus the prompts to answer while it runs
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Program followed by its arguments
    pub argv: Vec<String>,
    /// Prompt rules, evaluated in order against every stdout line
    pub rules: Vec<PromptRule>,
    /// Working directory for the child
    pub cwd: Option<PathBuf>,
    /// Extra environment variables, added on top of the inherited environment
    pub env: HashMap<String, String>,
}

impl RunRequest {
    /// Create a request from argv and rules
    pub fn new<I, S>(argv: I, rules: Vec<PromptRule>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            rules,
            ..Self::default()
        }
    }

    /// Create a new builder for `RunRequest`
    pub fn builder<I, S>(argv: I) -> RunRequestBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RunRequestBuilder {
            request: Self::new(argv, Vec::new()),
        }
    }

    /// Program name (argv[0]), empty if argv is empty
    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// Arguments after the program name
    #[must_use]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

// ============================================================================
// Builder for RunRequest
// ============================================================================

/// Builder for `RunRequest`
#[derive(Debug)]
pub struct RunRequestBuilder {
    request: RunRequest,
}

impl RunRequestBuilder {
    /// Add a prompt rule
    #[must_use]
    pub fn rule(mut self, rule: PromptRule) -> Self {
        self.request.rules.push(rule);
        self
    }

    /// Add a substring rule answering `needle` with `response`
    #[must_use]
    pub fn answer<I, S>(self, needle: impl Into<String>, response: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(PromptRule::contains(needle, response))
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.request.cwd = Some(path.into());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.env.insert(key.into(), value.into());
        self
    }

    /// Build the request
    #[must_use]
    pub fn build(self) -> RunRequest {
        self.request
    }
}
