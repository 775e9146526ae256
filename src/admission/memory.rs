//! In-memory allow-set mirroring `ipset add -exist` semantics.

use crate::admission::Admitter;
use crate::clock::{Clock, SystemClock};
use crate::PunchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Members = HashMap<(String, IpAddr), Option<DateTime<Utc>>>;

/// Allow-sets held in memory, keyed by set name and address.
///
/// Re-adding a member overwrites its timeout. Expired members are dropped on read.
pub struct MemoryAllowSet {
    clock: Arc<dyn Clock>,
    members: Mutex<Members>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl Default for MemoryAllowSet {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryAllowSet {
    /// Create empty allow-sets driven by `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            members: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Live members of `set_name`, sorted.
    pub fn members(&self, set_name: &str) -> Vec<IpAddr> {
        let now = self.clock.now_utc();
        let mut members: Vec<IpAddr> = self
            .lock()
            .iter()
            .filter(|((set, _), expires_at)| set == set_name && is_live(**expires_at, now))
            .map(|((_, addr), _)| *addr)
            .collect();
        members.sort();
        members
    }

    /// Whether `addr` is a live member of `set_name`.
    pub fn contains(&self, set_name: &str, addr: IpAddr) -> bool {
        let now = self.clock.now_utc();
        self.lock()
            .get(&(set_name.to_string(), addr))
            .is_some_and(|expires_at| is_live(*expires_at, now))
    }

    /// Remaining membership lifetime, `None` if absent or without timeout.
    pub fn remaining(&self, set_name: &str, addr: IpAddr) -> Option<Duration> {
        let now = self.clock.now_utc();
        let expires_at = (*self.lock().get(&(set_name.to_string(), addr))?)?;
        (expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Number of admission attempts, including failed ones.
    pub fn admission_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every following admission fail like a broken filter tool.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn is_live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.map_or(true, |at| at > now)
}

#[async_trait]
impl Admitter for MemoryAllowSet {
    async fn admit(
        &self,
        set_name: &str,
        addr: IpAddr,
        timeout: Option<u64>,
    ) -> Result<(), PunchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PunchError::AdmissionFailed { code: Some(1) });
        }

        // ipset caps timeouts well below i32::MAX seconds
        let expires_at = timeout.filter(|t| *t > 0).map(|t| {
            self.clock.now_utc() + chrono::Duration::seconds(t.min(i32::MAX as u64) as i64)
        });
        self.lock().insert((set_name.to_string(), addr), expires_at);
        Ok(())
    }
}
