//! Validator chain: ordered, extensible key checks.
//!
//! The chain evaluates its checks in priority order and stops at the first one
//! that recognizes the key. That check is then asked to renew the grant it
//! holds for the key, which keeps keys in active use alive while dormant ones
//! expire.
//!
//! Failure policy:
//! - A check that errors is logged and counts as "not found" for that check.
//!   Later checks still run, so the bypass check works with the store down.
//! - If no check recognizes the key and at least one check failed, the chain
//!   returns that infrastructure error instead of `KeyInvalid`.
//! - A failing check never authorizes.

use crate::config::PunchConfig;
use crate::protocol::models::NamespacedKey;
use crate::store::GrantStore;
use crate::PunchError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One authority that can recognize keys.
#[async_trait]
pub trait KeyCheck: Send + Sync {
    /// Name used in logs and in [`Authorization`].
    fn name(&self) -> &'static str;

    /// Whether this authority currently recognizes `key`. Must be cheap.
    async fn contains(&self, key: &NamespacedKey) -> Result<bool, PunchError>;

    /// Extend the lifetime of the grant this authority holds for `key`.
    ///
    /// Returns whether anything was renewed. Authorities without expiring
    /// grants keep the default no-op.
    async fn renew(&self, _key: &NamespacedKey, _ttl: Duration) -> Result<bool, PunchError> {
        Ok(false)
    }
}

/// Privileged always-present check accepting one fixed literal.
///
/// SECURITY: fail-open by construction. Kept as its own check so it can be
/// audited and disabled (`PunchConfig::bypass_key = None`) independently.
pub struct BypassCheck {
    key: String,
}

impl BypassCheck {
    /// Accept exactly `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl KeyCheck for BypassCheck {
    fn name(&self) -> &'static str {
        "bypass"
    }

    async fn contains(&self, key: &NamespacedKey) -> Result<bool, PunchError> {
        Ok(key.raw() == self.key)
    }
}

/// Check backed by the grant store.
pub struct StoreCheck {
    store: Arc<dyn GrantStore>,
}

impl StoreCheck {
    /// Check keys against `store`.
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KeyCheck for StoreCheck {
    fn name(&self) -> &'static str {
        "grant-store"
    }

    async fn contains(&self, key: &NamespacedKey) -> Result<bool, PunchError> {
        self.store.exists(key).await
    }

    async fn renew(&self, key: &NamespacedKey, ttl: Duration) -> Result<bool, PunchError> {
        let renewed = self.store.renew(key, ttl).await?;
        if !renewed {
            debug!(key = %key.fingerprint(), "Grant vanished before renewal");
        }
        Ok(renewed)
    }
}

/// Check against a fixed set of keys held in memory.
pub struct StaticKeyCheck {
    keys: HashSet<String>,
}

impl StaticKeyCheck {
    /// Accept any of `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl KeyCheck for StaticKeyCheck {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn contains(&self, key: &NamespacedKey) -> Result<bool, PunchError> {
        Ok(self.keys.contains(key.raw()))
    }
}

/// Successful authorization of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    /// Name of the check that recognized the key.
    pub check: &'static str,

    /// Whether that check renewed a grant.
    pub renewed: bool,
}

/// Ordered list of key checks.
#[derive(Default)]
pub struct ValidatorChain {
    checks: Vec<Arc<dyn KeyCheck>>,
}

impl ValidatorChain {
    /// Create an empty chain. An empty chain rejects every key.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: the bypass check (unless disabled), then the grant store.
    pub fn from_config(config: &PunchConfig, store: Arc<dyn GrantStore>) -> Self {
        let mut chain = Self::new();
        if let Some(bypass) = &config.bypass_key {
            chain = chain.with_check(Arc::new(BypassCheck::new(bypass.clone())));
        }
        chain.with_check(Arc::new(StoreCheck::new(store)))
    }

    /// Append a check with the lowest priority so far.
    pub fn with_check(mut self, check: Arc<dyn KeyCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Names of the checks in evaluation order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Find the first check recognizing `key`.
    ///
    /// # Returns
    /// * `Ok(Some(check))` - A check recognized the key
    /// * `Ok(None)` - Every check answered and none recognized the key
    /// * `Err(_)` - No check recognized the key and at least one check failed
    pub async fn find_match(
        &self,
        key: &NamespacedKey,
    ) -> Result<Option<&dyn KeyCheck>, PunchError> {
        let mut failure = None;

        for check in &self.checks {
            match check.contains(key).await {
                Ok(true) => {
                    debug!(check = check.name(), key = %key.fingerprint(), "Key recognized");
                    return Ok(Some(check.as_ref()));
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        check = check.name(),
                        key = %key.fingerprint(),
                        error = %e,
                        "Key check failed, treating key as not found"
                    );
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    /// Whether any check recognizes `key`. Does not renew anything.
    pub async fn validate(&self, key: &NamespacedKey) -> Result<bool, PunchError> {
        Ok(self.find_match(key).await?.is_some())
    }

    /// Validate `key` and renew its grant for `ttl` on success.
    ///
    /// A failed renewal is logged and does not revoke the authorization.
    ///
    /// # Errors
    /// - `KeyInvalid` - No check recognized the key
    /// - `StoreUnavailable` (or another infrastructure error) - a check failed
    ///   and none recognized the key
    pub async fn authorize(
        &self,
        key: &NamespacedKey,
        ttl: Duration,
    ) -> Result<Authorization, PunchError> {
        let check = self.find_match(key).await?.ok_or(PunchError::KeyInvalid)?;

        let renewed = match check.renew(key, ttl).await {
            Ok(renewed) => renewed,
            Err(e) => {
                warn!(
                    check = check.name(),
                    key = %key.fingerprint(),
                    error = %e,
                    "Grant renewal failed"
                );
                false
            }
        };

        Ok(Authorization {
            check: check.name(),
            renewed,
        })
    }
}
