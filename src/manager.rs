//! Punch Manager - the authorization-and-admission pipeline.
//!
//! The `PunchManager` runs one punch end to end:
//! - Validate the key against the validator chain
//! - Renew the matching grant
//! - Admit the caller's address into the allow-set
//!
//! Each step completes before the next starts. Admission failures do not fail
//! the punch: they are logged and reported in [`PunchOutcome::admitted`].

use crate::admission::{Admitter, IpsetAdmitter};
use crate::config::PunchConfig;
use crate::policy::chain::ValidatorChain;
use crate::protocol::models::PunchKey;
use crate::store::GrantStore;
use crate::PunchError;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Result of an authorized punch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunchOutcome {
    /// Name of the check that authorized the key.
    pub check: &'static str,

    /// Whether a grant TTL was reset.
    pub renewed: bool,

    /// Whether the packet filter accepted the address.
    pub admitted: bool,
}

/// Main entry point of the gateway.
///
/// Create one instance per process and share it between requests.
pub struct PunchManager {
    config: PunchConfig,
    store: Arc<dyn GrantStore>,
    chain: ValidatorChain,
    admitter: Arc<dyn Admitter>,
}

impl PunchManager {
    /// Create a manager with the standard chain and the `ipset` admitter.
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration validation fails.
    pub fn new(config: PunchConfig, store: Arc<dyn GrantStore>) -> Result<Self, PunchError> {
        config.validate()?;
        let admitter = Arc::new(IpsetAdmitter::from_config(&config)?);
        Self::with_admitter(config, store, admitter)
    }

    /// Create a manager with the standard chain and a custom admitter.
    pub fn with_admitter(
        config: PunchConfig,
        store: Arc<dyn GrantStore>,
        admitter: Arc<dyn Admitter>,
    ) -> Result<Self, PunchError> {
        config.validate()?;
        let chain = ValidatorChain::from_config(&config, store.clone());
        Ok(Self::with_chain(config, store, chain, admitter))
    }

    /// Create a manager from fully custom parts.
    ///
    /// `store` is only used for health checks; authorization goes through `chain`.
    pub fn with_chain(
        config: PunchConfig,
        store: Arc<dyn GrantStore>,
        chain: ValidatorChain,
        admitter: Arc<dyn Admitter>,
    ) -> Self {
        Self {
            config,
            store,
            chain,
            admitter,
        }
    }

    /// Punch a hole for `addr` using `key`.
    ///
    /// # Errors
    /// - `KeyMissing` - No key, or an empty key
    /// - `KeyInvalid` - No check recognized the key
    /// - `StoreUnavailable` - A check failed and none recognized the key
    ///
    /// Admission failures are not errors; see [`PunchOutcome::admitted`].
    pub async fn punch(&self, key: Option<&str>, addr: IpAddr) -> Result<PunchOutcome, PunchError> {
        let key = PunchKey::new(key.ok_or(PunchError::KeyMissing)?)?;
        self.punch_key(&key, addr).await
    }

    /// Punch with an already parsed key.
    pub async fn punch_key(&self, key: &PunchKey, addr: IpAddr) -> Result<PunchOutcome, PunchError> {
        let namespaced = key.namespaced();
        let auth = self
            .chain
            .authorize(&namespaced, self.config.grant_ttl)
            .await?;

        let admitted = self.admit(addr).await;

        info!(
            key = %key.fingerprint(),
            %addr,
            check = auth.check,
            renewed = auth.renewed,
            admitted,
            "Punch accepted"
        );

        Ok(PunchOutcome {
            check: auth.check,
            renewed: auth.renewed,
            admitted,
        })
    }

    /// Admit `addr` into the configured allow-set, logging any failure.
    async fn admit(&self, addr: IpAddr) -> bool {
        let result = self
            .admitter
            .admit(
                &self.config.set_name,
                addr,
                self.config.effective_set_timeout(),
            )
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    %addr,
                    set = %self.config.set_name,
                    error = %e,
                    "Admission failed; punch still acknowledged"
                );
                false
            }
        }
    }

    /// Check that the grant store is reachable.
    pub async fn ping_store(&self) -> Result<(), PunchError> {
        self.store.ping().await
    }

    /// Get the current configuration.
    pub fn config(&self) -> &PunchConfig {
        &self.config
    }

    /// Get the validator chain.
    pub fn chain(&self) -> &ValidatorChain {
        &self.chain
    }
}
