use crate::backend::{CounterStore, RateStatus, StoreError, StoreKind};
use crate::policy::Policy;
use actix_web::rt::time::Instant;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// A fixed window [CounterStore] that keeps its buckets in a process-local
/// [DashMap](dashmap::DashMap).
///
/// Buckets are never evicted; an expired bucket is only reset when its key is seen again.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    map: Arc<DashMap<String, Record>>,
}

struct Record {
    count: u64,
    expires_at: Instant,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous form of [CounterStore::increment]; the local map cannot fail.
    pub fn count(&self, key: &str, policy: &Policy) -> RateStatus {
        let now = Instant::now();
        let mut record = self.map.entry(key.to_owned()).or_insert_with(|| Record {
            count: 0,
            expires_at: now + policy.interval,
        });
        // The whole window restarts once it has elapsed, nothing carries over.
        if now > record.expires_at {
            record.count = 0;
            record.expires_at = now + policy.interval;
        }
        record.count = record.count.saturating_add(1);
        RateStatus::new(record.count, policy.max_requests, record.expires_at)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn increment(&self, key: &str, policy: &Policy) -> Result<RateStatus, StoreError> {
        Ok(self.count(key, policy))
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINUTE: Duration = Duration::from_secs(60);

    #[actix_web::test]
    async fn test_allow_deny() {
        tokio::time::pause();
        let store = InMemoryStore::new();
        let policy = Policy::new(MINUTE, 5);
        for i in 1..=5 {
            // First 5 should be allowed, with a strictly increasing count
            let status = store.increment("KEY1", &policy).await.unwrap();
            assert!(status.is_allowed());
            assert_eq!(status.count, i);
            assert_eq!(status.remaining, 5 - i);
        }
        // Sixth should be denied
        let status = store.increment("KEY1", &policy).await.unwrap();
        assert!(status.decision.is_denied());
        assert_eq!(status.count, 6);
        assert_eq!(status.remaining, 0);
    }

    #[actix_web::test]
    async fn test_single_request_window() {
        tokio::time::pause();
        let store = InMemoryStore::new();
        let policy = Policy::new(MINUTE, 1);

        let first = store.count("1.2.3.4", &policy);
        assert!(first.is_allowed());
        assert_eq!(first.count, 1);

        let second = store.count("1.2.3.4", &policy);
        assert!(!second.is_allowed());
        assert_eq!(second.count, 2);
    }

    #[actix_web::test]
    async fn test_reset() {
        tokio::time::pause();
        let store = InMemoryStore::new();
        let policy = Policy::new(Duration::from_secs(1), 1);
        assert!(store.count("KEY1", &policy).is_allowed());
        assert!(!store.count("KEY1", &policy).is_allowed());

        // Still inside the window: expiry is only passed strictly after the interval
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.count("KEY1", &policy).count, 3);

        tokio::time::advance(Duration::from_millis(1001)).await;
        // The bucket was never evicted, the reset happens lazily on access
        assert_eq!(store.len(), 1);
        let status = store.count("KEY1", &policy);
        assert!(status.is_allowed());
        assert_eq!(status.count, 1);
        assert_eq!(status.reset, Instant::now() + Duration::from_secs(1));
    }

    #[actix_web::test]
    async fn test_output() {
        tokio::time::pause();
        let store = InMemoryStore::new();
        let policy = Policy::new(MINUTE, 2);
        let start = Instant::now();

        let status = store.count("KEY1", &policy);
        assert_eq!(status.remaining, 1);
        assert_eq!(status.limit, 2);
        assert_eq!(status.reset, start + MINUTE);

        // The reset time is fixed by the first request of the window
        tokio::time::advance(Duration::from_secs(10)).await;
        let status = store.count("KEY1", &policy);
        assert_eq!(status.remaining, 0);
        assert_eq!(status.reset, start + MINUTE);
        assert_eq!(status.seconds_until_reset(), 50);
    }

    #[actix_web::test]
    async fn test_keys_are_independent() {
        tokio::time::pause();
        let store = InMemoryStore::new();
        let policy = Policy::new(MINUTE, 1);
        assert!(store.count("KEY1", &policy).is_allowed());
        assert!(store.count("KEY2", &policy).is_allowed());
        assert!(!store.count("KEY1", &policy).is_allowed());
        assert_eq!(store.len(), 2);
        assert_eq!(store.kind(), StoreKind::Local);
    }
}
