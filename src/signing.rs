//! Canonical request signing.
//!
//! Every signed request commits to the exact byte string
//!
//! ```text
//! METHOD \n PATH \n TIMESTAMP \n NONCE \n hex(sha256(BODY))
//! ```
//!
//! Field order and the single `\n` separator are part of the wire contract;
//! signer and verifier must build the same bytes.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use ed25519_dalek::{Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hashing::sha256_hex;
use crate::keys::{SigningKey, VerifyingKey};

/// Header carrying the request timestamp.
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";
/// Header carrying the request nonce.
pub const HEADER_NONCE: &str = "X-Nonce";
/// Header carrying the lowercase hex SHA-256 of the body.
pub const HEADER_BODY_SHA256: &str = "X-Body-Sha256";
/// Header carrying the base64 Ed25519 signature.
pub const HEADER_SIGNATURE: &str = "X-Signature";
/// Header carrying the agent id.
pub const HEADER_AGENT_ID: &str = "X-Agent-Id";

const SEPARATOR: u8 = b'\n';

/// Builds the canonical signing input for a request.
///
/// ```
/// let input = openleash::build_signing_input(
///     "POST",
///     "/v1/authorize",
///     "2024-01-15T10:30:00.000Z",
///     "test-nonce",
///     br#"{"hello":"world"}"#,
/// );
/// assert_eq!(
///     String::from_utf8(input).unwrap(),
///     "POST\n/v1/authorize\n2024-01-15T10:30:00.000Z\ntest-nonce\n\
///      93a23971a914e5eacbf0a8d25154cda309c3c1c72fbb9914d47c60f3cb681588"
/// );
/// ```
#[must_use]
pub fn build_signing_input(
    method: &str,
    path: &str,
    timestamp: &str,
    nonce: &str,
    body: &[u8],
) -> Vec<u8> {
    build_signing_input_from_digest(method, path, timestamp, nonce, &sha256_hex(body))
}

/// Builds the signing input from an already computed body digest, as a
/// receiver does from the `X-Body-Sha256` header.
#[must_use]
pub fn build_signing_input_from_digest(
    method: &str,
    path: &str,
    timestamp: &str,
    nonce: &str,
    body_sha256: &str,
) -> Vec<u8> {
    let fields = [method, path, timestamp, nonce, body_sha256];
    let mut input = Vec::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            input.push(SEPARATOR);
        }
        input.extend_from_slice(field.as_bytes());
    }
    input
}

/// Signs arbitrary bytes with the agent's key.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the key cannot produce a signature.
pub fn sign(key: &SigningKey, input: &[u8]) -> Result<Signature> {
    key.as_dalek().try_sign(input).map_err(|e| Error::Signing {
        reason: e.to_string(),
    })
}

/// Verifies a raw Ed25519 signature.
#[must_use]
pub fn verify(key: &VerifyingKey, input: &[u8], signature: &Signature) -> bool {
    key.as_dalek().verify(input, signature).is_ok()
}

/// The signature envelope attached to a request as headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHeaders {
    /// `X-Timestamp`
    #[serde(rename = "X-Timestamp")]
    pub timestamp: String,
    /// `X-Nonce`
    #[serde(rename = "X-Nonce")]
    pub nonce: String,
    /// `X-Body-Sha256`
    #[serde(rename = "X-Body-Sha256")]
    pub body_sha256: String,
    /// `X-Signature`, base64 standard with padding
    #[serde(rename = "X-Signature")]
    pub signature: String,
}

impl SignedHeaders {
    /// Header name/value pairs in a stable order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (HEADER_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_NONCE, self.nonce.as_str()),
            (HEADER_BODY_SHA256, self.body_sha256.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }
}

/// Signs a request and returns its header envelope.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the key cannot produce a signature.
pub fn sign_request(
    method: &str,
    path: &str,
    timestamp: &str,
    nonce: &str,
    body: &[u8],
    key: &SigningKey,
) -> Result<SignedHeaders> {
    let body_sha256 = sha256_hex(body);
    let input = build_signing_input_from_digest(method, path, timestamp, nonce, &body_sha256);
    let signature = sign(key, &input)?;

    Ok(SignedHeaders {
        timestamp: timestamp.to_string(),
        nonce: nonce.to_string(),
        body_sha256,
        signature: BASE64_STANDARD.encode(signature.to_bytes()),
    })
}

/// Verifies a request signature from its header values.
///
/// Returns `false` for any failure, including an undecodable signature.
#[must_use]
pub fn verify_request_signature(
    method: &str,
    path: &str,
    timestamp: &str,
    nonce: &str,
    body_sha256: &str,
    signature_b64: &str,
    public_key: &VerifyingKey,
) -> bool {
    let Ok(bytes) = BASE64_STANDARD.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    let input = build_signing_input_from_digest(method, path, timestamp, nonce, body_sha256);
    verify(public_key, &input, &signature)
}

/// Signs a registration challenge with the agent's key.
///
/// `challenge_b64` is the `challenge_b64` field of
/// [`RegistrationChallenge`](crate::RegistrationChallenge); the decoded bytes
/// are signed and the signature returned as base64.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the challenge is not base64, or
/// [`Error::Signing`] if signing fails.
pub fn sign_challenge(key: &SigningKey, challenge_b64: &str) -> Result<String> {
    let challenge = BASE64_STANDARD
        .decode(challenge_b64)
        .map_err(|e| Error::Protocol {
            reason: format!("challenge_b64 is not base64: {e}"),
        })?;
    let signature = sign(key, &challenge)?;
    Ok(BASE64_STANDARD.encode(signature.to_bytes()))
}
