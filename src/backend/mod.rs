pub mod memory;

#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub mod redis;

use crate::policy::Policy;
use actix_web::rt::time::Instant;
use async_trait::async_trait;
use std::fmt;

pub use memory::InMemoryStore;

/// Error produced by a [CounterStore] that could not answer a request.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::Denied
        }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}

/// Which kind of store answered (or is configured to answer) rate limit checks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StoreKind {
    /// A counter service shared between all server instances.
    Shared,
    /// A map private to this process.
    Local,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of counting a single request against a key.
#[derive(Debug, Clone)]
pub struct RateStatus {
    pub decision: Decision,
    /// Number of requests seen for the key in the current window, including this one.
    pub count: u64,
    /// Total number of requests that are permitted within the rate limit interval.
    pub limit: u64,
    /// Number of requests that will be permitted until the limit resets.
    pub remaining: u64,
    /// Time at which the rate limit resets.
    pub reset: Instant,
}

impl RateStatus {
    pub fn new(count: u64, limit: u64, reset: Instant) -> Self {
        Self {
            decision: Decision::from_allowed(count <= limit),
            count,
            limit,
            remaining: limit.saturating_sub(count),
            reset,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }

    /// Seconds until the rate limit resets (rounded upwards, so that it is guaranteed to be reset
    /// after waiting for the duration).
    pub fn seconds_until_reset(&self) -> u64 {
        let millis = self
            .reset
            .saturating_duration_since(Instant::now())
            .as_millis() as f64;
        (millis / 1000f64).ceil() as u64
    }
}

/// Describes a rate limit counter store and its fixed window algorithm.
///
/// Implementations are shared between all request handlers, so they must be safe to call
/// concurrently. Increments for the same key must never be lost.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request for `key` and report whether it fits within `policy`.
    async fn increment(&self, key: &str, policy: &Policy) -> Result<RateStatus, StoreError>;

    fn kind(&self) -> StoreKind;
}
