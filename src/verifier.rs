//! Offline proof token verification.
//!
//! A verifier holds a snapshot of trusted issuer keys, usually fetched from
//! `GET /v1/public-keys`, and checks proof tokens against it without
//! contacting the service. Keys are tried in the order given and the first
//! one that validates the signature decides the outcome.

use chrono::{DateTime, Utc};
use rusty_paseto::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::claims::ProofClaims;
use crate::error::{Error, Result};
use crate::keys::VerifyingKey;
use crate::timestamp::parse_timestamp;
use crate::trust::TrustedKey;

/// Reason given when the token is authentic but past its `exp`.
pub const REASON_EXPIRED: &str = "Token expired";
/// Reason given when no trusted key validates the token.
pub const REASON_NO_MATCHING_KEY: &str = "No matching key found or invalid signature";
/// Reason given when the token approves a different action.
pub const REASON_ACTION_HASH_MISMATCH: &str = "action_hash mismatch";
/// Reason given when the token was issued to a different agent.
pub const REASON_AGENT_ID_MISMATCH: &str = "agent_id mismatch";

/// Outcome of verifying a proof token.
///
/// The same shape is returned by the service's `POST /v1/verify-proof`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Whether the token is acceptable
    pub valid: bool,
    /// Why the token was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Token claims, present whenever the signature verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Map<String, Value>>,
}

impl VerifyResult {
    fn accepted(claims: Map<String, Value>) -> Self {
        Self {
            valid: true,
            reason: None,
            claims: Some(claims),
        }
    }

    fn rejected(reason: &str, claims: Option<Map<String, Value>>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
            claims,
        }
    }

    /// Deserializes the claims into [`ProofClaims`].
    ///
    /// Returns `None` when there are no claims.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClaims`] if the claims lack a required field.
    pub fn proof_claims(&self) -> Option<Result<ProofClaims>> {
        self.claims.as_ref().map(|claims| {
            serde_json::from_value(Value::Object(claims.clone())).map_err(|e| {
                Error::InvalidClaims {
                    reason: e.to_string(),
                }
            })
        })
    }

    /// Converts the outcome into a `Result` for `?`-style callers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenExpired`] for an expired token and
    /// [`Error::VerificationFailure`] for every other rejection.
    pub fn into_result(self) -> Result<Map<String, Value>> {
        match (self.valid, self.claims) {
            (true, Some(claims)) => Ok(claims),
            (false, Some(claims)) if self.reason.as_deref() == Some(REASON_EXPIRED) => {
                Err(Error::TokenExpired {
                    expired_at: claims
                        .get("exp")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            _ => Err(Error::VerificationFailure),
        }
    }
}

/// Values a relying party expects the proof to attest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofExpectations {
    /// Expected `action_hash` claim
    pub action_hash: Option<String>,
    /// Expected `agent_id` claim
    pub agent_id: Option<String>,
}

impl ProofExpectations {
    /// Expects the given action hash.
    #[must_use]
    pub fn action_hash(mut self, hash: impl Into<String>) -> Self {
        self.action_hash = Some(hash.into());
        self
    }

    /// Expects the given agent id.
    #[must_use]
    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

/// Verifies a proof token against a trust set, using the current time.
///
/// # Example
///
/// ```
/// use openleash::{ProofIssuer, ProofRequest, verify_offline};
///
/// let issuer = ProofIssuer::generate("key-1");
/// let proof = issuer
///     .issue(ProofRequest::new("d-1", "o-1", "agent-1", "purchase", "abc"))
///     .unwrap();
///
/// let result = verify_offline(&proof.token, &[issuer.trusted_key()]);
/// assert!(result.valid);
/// assert_eq!(result.claims.unwrap()["agent_id"], "agent-1");
///
/// let result = verify_offline(&proof.token, &[]);
/// assert_eq!(result.reason.as_deref(), Some("No matching key found or invalid signature"));
/// ```
#[must_use]
pub fn verify_offline(token: &str, trusted_keys: &[TrustedKey]) -> VerifyResult {
    verify_offline_at(token, trusted_keys, Utc::now())
}

/// Verifies a proof token against a trust set at instant `now`.
///
/// The token is expired when its `exp` claim parses and is strictly before
/// `now`. An expired token still reports its claims.
#[must_use]
pub fn verify_offline_at(
    token: &str,
    trusted_keys: &[TrustedKey],
    now: DateTime<Utc>,
) -> VerifyResult {
    for trusted in trusted_keys {
        let Some(claims) = try_verify_with_key(token, &trusted.public_key) else {
            trace!(kid = %trusted.kid, "key did not validate token");
            continue;
        };

        debug!(kid = %trusted.kid, "proof signature verified");
        return if is_expired(&claims, now) {
            VerifyResult::rejected(REASON_EXPIRED, Some(claims))
        } else {
            VerifyResult::accepted(claims)
        };
    }

    debug!(keys = trusted_keys.len(), "no trusted key validated proof");
    VerifyResult::rejected(REASON_NO_MATCHING_KEY, None)
}

/// Verifies a proof token and checks it attests the expected values.
///
/// Expectations are checked only for otherwise valid tokens. When both
/// mismatch, the agent id mismatch is reported.
#[must_use]
pub fn verify_offline_expecting(
    token: &str,
    trusted_keys: &[TrustedKey],
    expected: &ProofExpectations,
) -> VerifyResult {
    let mut result = verify_offline(token, trusted_keys);
    if !result.valid {
        return result;
    }

    let claim = |name: &str| {
        result
            .claims
            .as_ref()
            .and_then(|c| c.get(name))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    let action_hash = claim("action_hash");
    let agent_id = claim("agent_id");

    if let Some(expected_hash) = &expected.action_hash
        && action_hash.as_deref() != Some(expected_hash.as_str())
    {
        result.valid = false;
        result.reason = Some(REASON_ACTION_HASH_MISMATCH.to_string());
    }
    if let Some(expected_agent) = &expected.agent_id
        && agent_id.as_deref() != Some(expected_agent.as_str())
    {
        result.valid = false;
        result.reason = Some(REASON_AGENT_ID_MISMATCH.to_string());
    }
    result
}

/// Checks signature and structure only; `exp` is left to the caller.
fn try_verify_with_key(token: &str, verifying_key: &VerifyingKey) -> Option<Map<String, Value>> {
    let key_bytes = verifying_key.to_bytes();
    let key_wrapper = Key::<32>::from(&key_bytes);
    let paseto_key = PasetoAsymmetricPublicKey::<V4, Public>::from(&key_wrapper);

    let payload = Paseto::<V4, Public>::try_verify(
        token,
        &paseto_key,
        None::<Footer>,
        None::<ImplicitAssertion>,
    )
    .ok()?;

    match serde_json::from_str::<Value>(&payload).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

fn is_expired(claims: &Map<String, Value>, now: DateTime<Utc>) -> bool {
    claims
        .get("exp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .is_some_and(|exp| exp < now)
}
