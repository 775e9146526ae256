//! Command-line and environment configuration for the `punchgate` binary.
//!
//! Every flag can also be set through the environment variable named next to
//! it. `DEBUG` is a presence toggle: any value, even empty, turns it on.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::config::{
    PunchConfig, ServerConfig, BYPASS_KEY, DEFAULT_COMMAND_TIMEOUT, DEFAULT_GRANT_TTL,
    DEFAULT_MAX_CONCURRENT_ADMISSIONS, DEFAULT_PORT, DEFAULT_REDIS_URL, DEFAULT_SET_NAME,
};
use crate::PunchError;

/// Port-knocking gateway: admits callers presenting a valid key into an ipset allow-set
#[derive(Parser, Debug)]
#[command(name = "punchgate", version, about)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "PUNCH_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Verbose logging (also enabled when DEBUG is present in the environment)
    #[arg(long)]
    pub debug: bool,

    /// Redis URL of the grant store
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// The ipset allow-set callers are added to
    #[arg(long, env = "PUNCH_SET_NAME", default_value = DEFAULT_SET_NAME)]
    pub set_name: String,

    /// Membership timeout in seconds passed to ipset (omit for none)
    #[arg(long, env = "PUNCH_SET_TIMEOUT")]
    pub set_timeout: Option<u64>,

    /// Seconds a grant record lives after its last successful punch
    #[arg(long, env = "PUNCH_GRANT_TTL", default_value_t = DEFAULT_GRANT_TTL.as_secs())]
    pub grant_ttl: u64,

    /// Packet-filter command, split on whitespace (e.g. "sudo -n ipset")
    #[arg(long, env = "PUNCH_IPSET_COMMAND", default_value = "ipset")]
    pub ipset_command: String,

    /// Seconds before a packet-filter invocation is killed
    #[arg(long, env = "PUNCH_COMMAND_TIMEOUT", default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs())]
    pub command_timeout: u64,

    /// Maximum packet-filter processes running at once
    #[arg(long, env = "PUNCH_MAX_ADMISSIONS", default_value_t = DEFAULT_MAX_CONCURRENT_ADMISSIONS)]
    pub max_concurrent_admissions: usize,

    /// Reject the built-in bypass key.
    ///
    /// The environment value is falsey-parsed: `0`, `false`, `no`, `off` or
    /// empty keep the key enabled, anything else disables it.
    #[arg(
        long,
        env = "PUNCH_DISABLE_BYPASS_KEY",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub disable_bypass_key: bool,
}

impl Cli {
    /// Convert the parsed arguments into validated configuration.
    ///
    /// `debug_env` reports whether `DEBUG` is present in the environment.
    pub fn into_configs(self, debug_env: bool) -> Result<(ServerConfig, PunchConfig), PunchError> {
        let server = ServerConfig {
            listen_addr: SocketAddr::new(self.host, self.port),
            redis_url: self.redis_url,
            debug: self.debug || debug_env,
        };

        let punch = PunchConfig {
            set_name: self.set_name,
            set_timeout: self.set_timeout,
            grant_ttl: Duration::from_secs(self.grant_ttl),
            bypass_key: (!self.disable_bypass_key).then(|| BYPASS_KEY.to_string()),
            ipset_command: self
                .ipset_command
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            command_timeout: Duration::from_secs(self.command_timeout),
            max_concurrent_admissions: self.max_concurrent_admissions,
        };
        punch.validate()?;

        Ok((server, punch))
    }
}
