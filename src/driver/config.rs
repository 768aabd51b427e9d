//! Configuration constants and types for the process driver

use std::time::Duration;

/// How long to wait for the response writer or the stderr drain to finish
/// once stdout has closed
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a killed child to be reaped
pub(super) const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Terminator appended to every response line
pub(super) const LINE_TERMINATOR: &str = "\n";

/// Read size for the stderr drain
pub(super) const STDERR_CHUNK_SIZE: usize = 4096;

// ============================================================================
// Driver Config
// ============================================================================

/// Tunables shared by every run of a [`ProcessDriver`](super::ProcessDriver)
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Bounded wait for the response writer and stderr drain after stdout closes
    pub join_timeout: Duration,
    /// Bounded wait for reaping a child after it was killed
    pub kill_grace: Duration,
    /// Timeout applied when `run` is called without one
    pub default_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
            default_timeout: None,
        }
    }
}

impl DriverConfig {
    /// Create a new builder for `DriverConfig`
    #[must_use]
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }
}

// ============================================================================
// Builder for DriverConfig
// ============================================================================

/// Builder for `DriverConfig`
#[derive(Debug, Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Set the writer/stderr join timeout
    #[must_use]
    pub const fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    /// Set the grace period for reaping a killed child
    #[must_use]
    pub const fn kill_grace(mut self, grace: Duration) -> Self {
        self.config.kill_grace = grace;
        self
    }

    /// Set the timeout used when a run does not specify one
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(self) -> DriverConfig {
        self.config
    }
}
