//! Redis-backed counter store for `turnstile` (companion crate).
//!
//! Counters live in Redis as plain integer keys driven by GET/INCR/EXPIRE,
//! so rate limit state is shared across every instance pointing at the same
//! server. INCR is atomic on the Redis side, which is exactly the guarantee
//! the decision engine needs from its store.
//!
//! Connections go through [`redis::aio::ConnectionManager`], which
//! multiplexes one connection and reconnects on failure; cloning the store is
//! cheap and every clone shares the underlying connection.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::fmt;
use std::time::Duration;
use turnstile::CounterStore;

pub use redis::RedisError;

/// Configuration for [`RedisCounterStore`].
#[derive(Debug, Clone, Default)]
pub struct RedisConfig {
    /// Bound on each store round-trip. `None` leaves calls unbounded, which
    /// means an unresponsive Redis stalls request admission until the
    /// transport gives up.
    pub response_timeout: Option<Duration>,
}

/// Counter store backed by Redis GET/INCR/EXPIRE.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect with default configuration.
    ///
    /// # Errors
    /// Returns `Err` if the URL is invalid or the initial connection fails.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        Self::connect_with_config(url, RedisConfig::default()).await
    }

    /// Connect with custom configuration.
    ///
    /// # Errors
    /// Returns `Err` if the URL is invalid or the initial connection fails.
    pub async fn connect_with_config(url: &str, config: RedisConfig) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let mut manager_config = ConnectionManagerConfig::new();
        if let Some(timeout) = config.response_timeout {
            manager_config = manager_config.set_response_timeout(timeout);
        }
        let connection = ConnectionManager::new_with_config(client, manager_config).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    type Error = RedisError;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let mut conn = self.connection.clone();
        conn.get(key).await
    }

    async fn incr(&self, key: &str) -> Result<(), Self::Error> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.incr(key, 1).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), Self::Error> {
        let mut conn = self.connection.clone();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let _: bool = conn.expire(key, seconds).await?;
        Ok(())
    }
}
