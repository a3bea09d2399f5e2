//! Follower configuration.

use std::time::Duration;

/// Default pause between open attempts while waiting for the file.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Controls how a [`Follower`](crate::Follower) waits for its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowConfig {
    /// How long to keep retrying open+watch before giving up.
    ///
    /// Zero means a single attempt: any failure is returned immediately.
    pub startup_timeout: Duration,

    /// Pause between consecutive attempts inside the startup window.
    pub retry_interval: Duration,
}

impl FollowConfig {
    /// Creates a config that retries for `startup_timeout_secs` seconds.
    pub fn new(startup_timeout_secs: u64) -> Self {
        Self {
            startup_timeout: Duration::from_secs(startup_timeout_secs),
            ..Self::default()
        }
    }

    pub fn with_startup_timeout(mut self, startup_timeout: Duration) -> Self {
        self.startup_timeout = startup_timeout;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Returns `true` when startup failures should be retried.
    pub fn retries(&self) -> bool {
        !self.startup_timeout.is_zero()
    }
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::ZERO,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}
