//! # Punchgate
//!
//! **Port-knocking gateway: a valid key opens the firewall for the caller's address.**
//!
//! A caller POSTs a secret key. If a check in the validator chain recognizes
//! it, the matching grant record is renewed and the caller's transport-layer
//! address is added to an `ipset` allow-set.
//!
//! ## Pipeline
//!
//! 1. **Validate** - ordered [`ValidatorChain`] of [`KeyCheck`]s, first success wins
//! 2. **Renew** - the matching check resets the grant TTL (sliding one-week window)
//! 3. **Admit** - [`Admitter`] runs `ipset add <set> -exist <addr> [timeout <n>]`
//!
//! ## Quickstart
//!
//! ```no_run
//! use punchgate::{create_app, PunchConfig, PunchManager, RedisGrantStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RedisGrantStore::connect("redis://localhost").await?);
//! let manager = Arc::new(PunchManager::new(PunchConfig::default(), store)?);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! punchgate::server::serve(listener, create_app(manager), punchgate::server::shutdown_signal()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security notes
//!
//! - **Bypass key** - a fixed literal always validates. It lives in its own
//!   [`BypassCheck`] and is disabled with `bypass_key: None`.
//! - **Fail-closed checks** - a store failure never authorizes a key.
//! - **Fire-and-forget admission** - the punch is acknowledged even when the
//!   packet filter fails; the failure is logged at `error` level.
//! - **Address source** - only the peer address is admitted, never a value
//!   from the request body.

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;

// Protocol layer
pub mod protocol;

// Store layer
pub mod store;

// Policy layer
pub mod policy;

// Admission layer
pub mod admission;

// Manager (main public API)
pub mod manager;

// HTTP boundary
pub mod server;

// Re-exports for public API
pub use admission::{Admitter, IpsetAdmitter, MemoryAllowSet};
pub use clock::{Clock, SystemClock};
pub use config::{PunchConfig, ServerConfig};
pub use errors::PunchError;
pub use manager::{PunchManager, PunchOutcome};
pub use policy::chain::{Authorization, BypassCheck, KeyCheck, StoreCheck, ValidatorChain};
pub use protocol::models::{NamespacedKey, PunchKey};
pub use server::create_app;
pub use store::{GrantStore, MemoryGrantStore, RedisGrantStore};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
