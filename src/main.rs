//! Punchgate - port-knocking gateway server.

use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use punchgate::cli::Cli;
use punchgate::server::{self, create_app};
use punchgate::{PunchManager, RedisGrantStore};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let debug_env = std::env::var_os("DEBUG").is_some();
    let (server_config, punch_config) = cli
        .into_configs(debug_env)
        .context("invalid configuration")?;

    // RUST_LOG wins over the debug toggle
    let default_level = if server_config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting punchgate...");
    info!(
        set = %punch_config.set_name,
        set_timeout = ?punch_config.effective_set_timeout(),
        grant_ttl = ?punch_config.grant_ttl,
        bypass_enabled = punch_config.bypass_key.is_some(),
        "Admission settings"
    );

    // the store handle lives for the duration of the server and is dropped after shutdown
    let store = RedisGrantStore::connect(&server_config.redis_url)
        .await
        .with_context(|| format!("failed to connect to grant store at {}", server_config.redis_url))?;
    info!("Grant store connected");

    let manager = Arc::new(PunchManager::new(punch_config, Arc::new(store))?);

    let listener = TcpListener::bind(server_config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", server_config.listen_addr))?;

    server::serve(listener, create_app(manager), server::shutdown_signal())
        .await
        .context("http server failed")?;

    info!("punchgate stopped");
    Ok(())
}
