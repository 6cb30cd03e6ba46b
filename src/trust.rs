//! Trusted issuer keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::keys::VerifyingKey;

/// One entry of a verifier's trust set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedKey {
    /// Key id, as published by the service
    pub kid: String,
    /// The issuer's public key
    pub public_key: VerifyingKey,
}

impl TrustedKey {
    /// Creates a trust-set entry.
    #[must_use]
    pub fn new(kid: impl Into<String>, public_key: VerifyingKey) -> Self {
        Self {
            kid: kid.into(),
            public_key,
        }
    }

    /// Decodes an entry from a base64 SPKI DER public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyDecode`](crate::Error::KeyDecode) if the key does
    /// not decode.
    pub fn from_spki_base64(kid: impl Into<String>, public_key_b64: &str) -> Result<Self> {
        Ok(Self::new(kid, VerifyingKey::from_spki_base64(public_key_b64)?))
    }
}

/// A signing key as published at `GET /v1/public-keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    /// Key id
    pub kid: String,
    /// Key type, `OKP` for Ed25519
    pub kty: String,
    /// Algorithm, `EdDSA`
    pub alg: String,
    /// Base64 SPKI DER
    pub public_key_b64: String,
    /// When the key was created
    pub created_at: DateTime<Utc>,
    /// When the key was revoked, if it was
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl PublicKeyInfo {
    /// Returns true if the key has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Decodes the published key into a trust-set entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyDecode`](crate::Error::KeyDecode) if the key does
    /// not decode.
    pub fn to_trusted_key(&self) -> Result<TrustedKey> {
        TrustedKey::from_spki_base64(self.kid.clone(), &self.public_key_b64)
    }
}

/// Builds a trust set from published keys, in order.
///
/// Revoked keys and keys that fail to decode are left out.
#[must_use]
pub fn trusted_keys_from(infos: &[PublicKeyInfo]) -> Vec<TrustedKey> {
    infos
        .iter()
        .filter_map(|info| {
            if info.is_revoked() {
                debug!(kid = %info.kid, "skipping revoked key");
                return None;
            }
            match info.to_trusted_key() {
                Ok(key) => Some(key),
                Err(e) => {
                    debug!(kid = %info.kid, error = %e, "skipping undecodable key");
                    None
                }
            }
        })
        .collect()
}
