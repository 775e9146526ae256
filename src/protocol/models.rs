//! Wire models for the punch API and the key types flowing through the pipeline.

use crate::config::GRANT_NAMESPACE;
use crate::PunchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A caller-supplied key. Guaranteed non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct PunchKey(String);

impl PunchKey {
    /// Wrap a raw key, rejecting the empty string.
    pub fn new(raw: impl Into<String>) -> Result<Self, PunchError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(PunchError::KeyMissing);
        }
        Ok(Self(raw))
    }

    /// The key exactly as the caller sent it.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key under the grant-store namespace.
    pub fn namespaced(&self) -> NamespacedKey {
        NamespacedKey {
            raw: self.0.clone(),
            full: format!("{}{}", GRANT_NAMESPACE, self.0),
        }
    }

    /// Short fingerprint safe to write to logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

// Keys are secrets: never print them.
impl fmt::Debug for PunchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PunchKey").field(&self.fingerprint()).finish()
    }
}

/// A key prefixed with [`GRANT_NAMESPACE`], as stored in the grant store.
#[derive(Clone, PartialEq, Eq)]
pub struct NamespacedKey {
    raw: String,
    full: String,
}

impl NamespacedKey {
    /// The store key, e.g. `ipset:abc123`.
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// The caller's key without the namespace.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Short fingerprint safe to write to logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.raw)
    }
}

impl fmt::Debug for NamespacedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamespacedKey")
            .field(&self.fingerprint())
            .finish()
    }
}

/// First 12 hex chars of the SHA-256 of a key.
fn fingerprint(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(&hash[..6])
}

/// Body of `POST /punch`.
#[derive(Debug, Deserialize)]
pub struct PunchRequest {
    /// The caller's key.
    #[serde(default)]
    pub key: Option<String>,
}

impl PunchRequest {
    /// Extract the key from a raw request body.
    ///
    /// An empty body, a body that is not a JSON object with a string `key`,
    /// and an empty `key` are all reported as [`PunchError::KeyMissing`].
    pub fn key_from_body(body: &[u8]) -> Result<PunchKey, PunchError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PunchError::KeyMissing);
        }
        let request: PunchRequest =
            serde_json::from_slice(body).map_err(|_| PunchError::KeyMissing)?;
        PunchKey::new(request.key.ok_or(PunchError::KeyMissing)?)
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Machine-readable error message.
    pub error: String,
}

/// Body of `GET /`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloBody {
    /// Always `"world"`.
    pub hello: String,
}

impl Default for HelloBody {
    fn default() -> Self {
        Self {
            hello: "world".to_string(),
        }
    }
}
