//! Admission controller: grants an address temporary access via the packet filter.
//!
//! Admission is idempotent with exist-overwrite semantics: adding an address
//! that is already in the set succeeds, keeps a single entry, and refreshes
//! its timeout.

pub mod ipset;
pub mod memory;

use crate::PunchError;
use async_trait::async_trait;
use std::net::IpAddr;

pub use self::ipset::IpsetAdmitter;
pub use self::memory::MemoryAllowSet;

/// Packet-filter controller.
#[async_trait]
pub trait Admitter: Send + Sync {
    /// Add `addr` to the allow-set `set_name`, replacing any existing entry.
    ///
    /// `timeout` is the membership lifetime in seconds; `None` never expires.
    async fn admit(
        &self,
        set_name: &str,
        addr: IpAddr,
        timeout: Option<u64>,
    ) -> Result<(), PunchError>;
}
