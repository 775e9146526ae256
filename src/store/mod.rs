//! Grant store: existence lookup and TTL renewal of grant records.
//!
//! A grant record is a store entry whose mere presence means "granted".
//! Punchgate never creates records; it only reads them and extends their
//! lifetime after they validated a punch.

pub mod memory;
pub mod redis;

use crate::protocol::models::NamespacedKey;
use crate::PunchError;
use async_trait::async_trait;
use std::time::Duration;

pub use self::memory::MemoryGrantStore;
pub use self::redis::RedisGrantStore;

/// Backend holding grant records.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Whether a live record exists for `key`. Has no side effects.
    async fn exists(&self, key: &NamespacedKey) -> Result<bool, PunchError>;

    /// Reset the expiry of `key` to `ttl` from now.
    ///
    /// Returns `Ok(false)` when the record vanished since it was checked.
    async fn renew(&self, key: &NamespacedKey, ttl: Duration) -> Result<bool, PunchError>;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), PunchError>;
}
