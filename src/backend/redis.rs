use crate::backend::{CounterStore, RateStatus, StoreError, StoreKind};
use crate::policy::Policy;
use actix_web::rt::time::{timeout, Instant};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_KEY_PREFIX: &str = "rate:";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Redis error: {0}")]
    Redis(
        #[source]
        #[from]
        redis::RedisError,
    ),
    #[error("Redis did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Unexpected PING response: {0}")]
    UnexpectedPong(String),
}

/// A fixed window [CounterStore] that keeps its counters in Redis, so that every server
/// instance sees the same counts.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: Option<String>,
    timeout: Duration,
}

impl RedisStore {
    /// Connect to the Redis instance at `url` and confirm that it answers a `PING`.
    ///
    /// Both the connection and the `PING` are bounded by `timeout`, which also bounds every
    /// later counter update.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Builder, Error> {
        let client = redis::Client::open(url)?;
        let connection = bounded(timeout, ConnectionManager::new(client)).await?;
        let store = Builder {
            connection,
            key_prefix: Some(DEFAULT_KEY_PREFIX.to_owned()),
            timeout,
        };
        store.ping().await?;
        Ok(store)
    }

    fn make_key<'t>(&self, key: &'t str) -> Cow<'t, str> {
        match &self.key_prefix {
            None => Cow::Borrowed(key),
            Some(prefix) => Cow::Owned(format!("{prefix}{key}")),
        }
    }

    async fn request(&self, key: &str, policy: &Policy) -> Result<RateStatus, Error> {
        let key = self.make_key(key);
        let window = policy.interval.as_secs().max(1);

        let mut pipe = redis::pipe();
        pipe.atomic()
            // Increment the rate limit count, creating the key at 1
            .cmd("INCR")
            .arg(key.as_ref())
            // Remaining time-to-live of the key, -1 when it has none
            .cmd("TTL")
            .arg(key.as_ref());

        let mut con = self.connection.clone();
        let (count, ttl): (u64, i64) = bounded(self.timeout, pipe.query_async(&mut con)).await?;

        // A fresh key starts the window. A key without any expiry can only be left behind by an
        // interrupted update, and would otherwise never reset.
        let ttl = if count == 1 || ttl < 0 {
            let () = bounded(
                self.timeout,
                redis::cmd("EXPIRE")
                    .arg(key.as_ref())
                    .arg(window)
                    .query_async(&mut con),
            )
            .await?;
            window
        } else {
            ttl as u64
        };

        Ok(RateStatus::new(
            count,
            policy.max_requests,
            Instant::now() + Duration::from_secs(ttl),
        ))
    }
}

impl Builder {
    async fn ping(&self) -> Result<(), Error> {
        let mut con = self.connection.clone();
        let pong: String = bounded(self.timeout, redis::cmd("PING").query_async(&mut con)).await?;
        if pong != "PONG" {
            return Err(Error::UnexpectedPong(pong));
        }
        Ok(())
    }

    /// Apply an optional prefix to all rate limit keys given to this store (defaults to
    /// `rate:`).
    ///
    /// The prefix is used as a 'namespace' to avoid collision with other keys inside Redis.
    pub fn key_prefix(mut self, key_prefix: Option<&str>) -> Self {
        self.key_prefix = key_prefix.map(ToOwned::to_owned);
        self
    }

    pub fn build(self) -> RedisStore {
        RedisStore {
            connection: self.connection,
            key_prefix: self.key_prefix,
            timeout: self.timeout,
        }
    }
}

pub struct Builder {
    connection: ConnectionManager,
    key_prefix: Option<String>,
    timeout: Duration,
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, Error>
where
    F: std::future::Future<Output = redis::RedisResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout(limit)),
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, key: &str, policy: &Policy) -> Result<RateStatus, StoreError> {
        Ok(self.request(key, policy).await?)
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Shared
    }
}
