//! Punchgate error types.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while authorizing a key or admitting an address.
#[derive(Debug, Error)]
pub enum PunchError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No key provided, or the key was empty.
    #[error("key missing")]
    KeyMissing,

    /// No check in the validator chain recognized the key.
    #[error("key invalid")]
    KeyInvalid,

    /// The grant store could not be reached or answered with an error.
    #[error("Grant store unavailable: {0}")]
    StoreUnavailable(String),

    /// The packet-filter tool could not be started.
    #[error("Failed to spawn packet-filter command: {0}")]
    AdmissionSpawn(String),

    /// The packet-filter tool exited with a non-zero status.
    #[error("Packet-filter command failed (exit code {code:?})")]
    AdmissionFailed {
        /// Exit code, `None` when the process was killed by a signal.
        code: Option<i32>,
    },

    /// The packet-filter tool did not finish in time and was killed.
    #[error("Packet-filter command timed out after {timeout:?}")]
    AdmissionTimeout {
        /// Configured command timeout.
        timeout: Duration,
    },
}

impl PunchError {
    /// Whether this error comes from a collaborator rather than from the caller.
    ///
    /// Infrastructure errors must never be reported as an authorization result.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            PunchError::StoreUnavailable(_)
                | PunchError::AdmissionSpawn(_)
                | PunchError::AdmissionFailed { .. }
                | PunchError::AdmissionTimeout { .. }
        )
    }
}

impl From<redis::RedisError> for PunchError {
    fn from(e: redis::RedisError) -> Self {
        PunchError::StoreUnavailable(e.to_string())
    }
}
