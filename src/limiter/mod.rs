mod client_key;

pub use client_key::{client_key, UNKNOWN_CLIENT};

use crate::backend::{CounterStore, InMemoryStore, RateStatus, StoreKind};
use crate::policy::Policy;

/// Per-client fixed window rate limiter.
///
/// Counts go to the configured [CounterStore]. Whenever that store fails to answer, the single
/// request is counted in a process-local map instead, so that a store outage never blocks a
/// submission.
pub struct RateLimiter {
    store: Option<Box<dyn CounterStore>>,
    local: InMemoryStore,
    policy: Policy,
}

impl RateLimiter {
    /// A limiter that only ever counts in this process.
    pub fn local(policy: Policy) -> Self {
        Self {
            store: None,
            local: InMemoryStore::new(),
            policy,
        }
    }

    /// A limiter that counts in `store`, falling back to the local map when it fails.
    pub fn with_store(store: Box<dyn CounterStore>, policy: Policy) -> Self {
        Self {
            store: Some(store),
            local: InMemoryStore::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The kind of store requests are counted in while it is healthy.
    pub fn kind(&self) -> StoreKind {
        self.store
            .as_ref()
            .map_or(StoreKind::Local, |store| store.kind())
    }

    /// Count one request for `key` and report whether it is allowed.
    pub async fn check_and_increment(&self, key: &str) -> RateStatus {
        let key = if key.is_empty() { UNKNOWN_CLIENT } else { key };
        if let Some(store) = &self.store {
            match store.increment(key, &self.policy).await {
                Ok(status) => return status,
                Err(e) => {
                    log::warn!(
                        "Rate limit store ({}) failed: {e}, counting in local map instead",
                        store.kind()
                    );
                }
            }
        }
        self.local.count(key, &self.policy)
    }
}
