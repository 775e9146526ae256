//! Punchgate configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Prefix applied to every caller key before it is looked up in the grant store.
pub const GRANT_NAMESPACE: &str = "ipset:";

/// Key that always validates, used for operational testing of the gateway.
///
/// SECURITY: this is a deliberate fail-open shortcut. It is only honoured by
/// [`crate::policy::chain::BypassCheck`] and can be switched off with
/// [`PunchConfig::bypass_key`] set to `None`.
pub const BYPASS_KEY: &str = "6e65ede4-75ea-4703-b264-abfe15dd9638";

/// Allow-set the gateway adds callers to.
pub const DEFAULT_SET_NAME: &str = "vault-allow";

/// Port the HTTP server listens on.
pub const DEFAULT_PORT: u16 = 8000;

/// Redis endpoint holding the grant records.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost";

/// TTL a grant record is reset to on every successful punch (one week).
pub const DEFAULT_GRANT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound on a single packet-filter invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on packet-filter processes running at the same time.
pub const DEFAULT_MAX_CONCURRENT_ADMISSIONS: usize = 16;

/// Upper bound on establishing a grant store connection.
pub const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single grant store command.
pub const STORE_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration of the authorization-and-admission pipeline.
#[derive(Debug, Clone)]
pub struct PunchConfig {
    /// Name of the ipset allow-set callers are added to.
    pub set_name: String,

    /// Per-member timeout passed to the packet filter, in seconds.
    /// `None` (or zero) adds members without a timeout.
    pub set_timeout: Option<u64>,

    /// TTL a grant record is reset to after it validated a punch.
    pub grant_ttl: Duration,

    /// Bypass literal honoured by the chain. `None` disables the bypass check.
    pub bypass_key: Option<String>,

    /// Packet-filter program followed by leading arguments, e.g. `["sudo", "ipset"]`.
    pub ipset_command: Vec<String>,

    /// Timeout for one packet-filter invocation. The child is killed when it expires.
    pub command_timeout: Duration,

    /// Maximum number of packet-filter processes running concurrently.
    pub max_concurrent_admissions: usize,
}

impl Default for PunchConfig {
    fn default() -> Self {
        Self {
            set_name: DEFAULT_SET_NAME.to_string(),
            set_timeout: None,
            grant_ttl: DEFAULT_GRANT_TTL,
            bypass_key: Some(BYPASS_KEY.to_string()),
            ipset_command: vec!["ipset".to_string()],
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_concurrent_admissions: DEFAULT_MAX_CONCURRENT_ADMISSIONS,
        }
    }
}

impl PunchConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::PunchError> {
        if self.set_name.is_empty() {
            return Err(crate::PunchError::ConfigError(
                "set_name cannot be empty".to_string(),
            ));
        }
        if self.set_name.chars().any(char::is_whitespace) {
            return Err(crate::PunchError::ConfigError(format!(
                "set_name must not contain whitespace, got {:?}",
                self.set_name
            )));
        }
        if self.grant_ttl.as_secs() == 0 {
            return Err(crate::PunchError::ConfigError(
                "grant_ttl must be at least one second".to_string(),
            ));
        }
        if matches!(self.bypass_key.as_deref(), Some("")) {
            return Err(crate::PunchError::ConfigError(
                "bypass_key cannot be empty (use None to disable it)".to_string(),
            ));
        }
        if self.ipset_command.first().map_or(true, |p| p.is_empty()) {
            return Err(crate::PunchError::ConfigError(
                "ipset_command cannot be empty".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(crate::PunchError::ConfigError(
                "command_timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_admissions == 0 {
            return Err(crate::PunchError::ConfigError(
                "max_concurrent_admissions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Member timeout actually handed to the packet filter.
    ///
    /// Zero means "no timeout", matching how ipset treats an omitted value.
    pub fn effective_set_timeout(&self) -> Option<u64> {
        self.set_timeout.filter(|t| *t > 0)
    }
}

/// Process-level settings for the HTTP server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// Redis connection URL for the grant store.
    pub redis_url: String,

    /// Verbose logging.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            debug: false,
        }
    }
}
