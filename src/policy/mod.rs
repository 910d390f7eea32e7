use std::time::Duration;

pub const DEFAULT_WINDOW_SECONDS: u64 = 60;
pub const DEFAULT_MAX_REQUESTS: u64 = 5;

/// Fixed window rate limit policy applied to every client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// The rate limiting interval.
    pub interval: Duration,
    /// The total requests to be allowed within the interval.
    pub max_requests: u64,
}

impl Policy {
    pub fn new(interval: Duration, max_requests: u64) -> Self {
        Self {
            interval,
            max_requests,
        }
    }

    pub fn from_secs(window_seconds: u64, max_requests: u64) -> Self {
        Self::new(Duration::from_secs(window_seconds), max_requests)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_WINDOW_SECONDS, DEFAULT_MAX_REQUESTS)
    }
}
