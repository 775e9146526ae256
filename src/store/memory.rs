//! In-memory grant store with Redis-like expiry semantics.
//!
//! Records are plain map entries with an optional expiry instant computed from
//! the injected [`Clock`]. Expired entries behave as absent. The store can be
//! switched "offline" to exercise the fail-closed paths of the pipeline.

use crate::clock::{Clock, SystemClock};
use crate::protocol::models::NamespacedKey;
use crate::store::GrantStore;
use crate::PunchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// In-memory grant store.
pub struct MemoryGrantStore {
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, Option<DateTime<Utc>>>>,
    offline: AtomicBool,
}

impl Default for MemoryGrantStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryGrantStore {
    /// Create an empty store driven by `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Insert a record under the full store key (e.g. `ipset:abc123`).
    ///
    /// `ttl` of `None` creates a record that never expires.
    pub fn insert(&self, store_key: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| self.expiry_from_now(ttl));
        self.records().insert(store_key.to_string(), expires_at);
    }

    /// Remove a record.
    pub fn remove(&self, store_key: &str) {
        self.records().remove(store_key);
    }

    /// Remaining lifetime of a live record, like Redis `TTL`.
    ///
    /// Returns `None` when the record is absent, expired, or has no expiry.
    pub fn ttl(&self, store_key: &str) -> Option<Duration> {
        let now = self.clock.now_utc();
        let expires_at = (*self.records().get(store_key)?)?;
        (expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Simulate the backend becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Option<DateTime<Utc>>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn expiry_from_now(&self, ttl: Duration) -> DateTime<Utc> {
        let now = self.clock.now_utc();
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn check_online(&self) -> Result<(), PunchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PunchError::StoreUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    /// Drop the record if it expired, returning whether it is still live.
    fn purge_if_expired(
        records: &mut HashMap<String, Option<DateTime<Utc>>>,
        store_key: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match records.get(store_key) {
            None => false,
            Some(None) => true,
            Some(Some(expires_at)) if *expires_at > now => true,
            Some(Some(_)) => {
                records.remove(store_key);
                false
            }
        }
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn exists(&self, key: &NamespacedKey) -> Result<bool, PunchError> {
        self.check_online()?;
        let now = self.clock.now_utc();
        let mut records = self.records();
        Ok(Self::purge_if_expired(&mut records, key.as_str(), now))
    }

    async fn renew(&self, key: &NamespacedKey, ttl: Duration) -> Result<bool, PunchError> {
        self.check_online()?;
        let now = self.clock.now_utc();
        let expires_at = self.expiry_from_now(ttl);
        let mut records = self.records();
        if !Self::purge_if_expired(&mut records, key.as_str(), now) {
            return Ok(false);
        }
        records.insert(key.as_str().to_string(), Some(expires_at));
        Ok(true)
    }

    async fn ping(&self) -> Result<(), PunchError> {
        self.check_online()
    }
}
