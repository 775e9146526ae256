//! Redis grant store.
//!
//! Uses a [`ConnectionManager`], which multiplexes one connection across tasks
//! and reconnects on failure, so the handle can be cloned freely per request.
//! Connects and commands are bounded by [`STORE_CONNECT_TIMEOUT`] and
//! [`STORE_RESPONSE_TIMEOUT`], so an unresponsive server fails the request
//! with `StoreUnavailable` instead of stalling it.

use crate::config::{STORE_CONNECT_TIMEOUT, STORE_RESPONSE_TIMEOUT};
use crate::protocol::models::NamespacedKey;
use crate::store::GrantStore;
use crate::PunchError;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Grant store backed by Redis `EXISTS` / `EXPIRE`.
#[derive(Clone)]
pub struct RedisGrantStore {
    conn: ConnectionManager,
}

impl RedisGrantStore {
    /// Connect to the Redis server at `url`.
    ///
    /// # Errors
    /// - `StoreUnavailable` if the URL is malformed or the first connection fails
    pub async fn connect(url: &str) -> Result<Self, PunchError> {
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(STORE_CONNECT_TIMEOUT)
            .set_response_timeout(STORE_RESPONSE_TIMEOUT);
        Self::connect_with_config(url, config).await
    }

    /// Connect with explicit connection manager settings.
    pub async fn connect_with_config(
        url: &str,
        config: ConnectionManagerConfig,
    ) -> Result<Self, PunchError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new_with_config(client, config).await?;
        debug!("Connected to grant store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl GrantStore for RedisGrantStore {
    async fn exists(&self, key: &NamespacedKey) -> Result<bool, PunchError> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(key.as_str()).await?;
        Ok(found)
    }

    async fn renew(&self, key: &NamespacedKey, ttl: Duration) -> Result<bool, PunchError> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let updated: bool = conn.expire(key.as_str(), seconds).await?;
        Ok(updated)
    }

    async fn ping(&self) -> Result<(), PunchError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
