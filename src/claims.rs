//! Proof token claims.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Issuer claim carried by tokens minted by the OpenLeash service.
pub const DEFAULT_ISSUER: &str = "openleash";

/// Default lifetime of a proof token.
pub const DEFAULT_PROOF_TTL: Duration = Duration::from_secs(120);

/// Claims carried in a proof token payload.
///
/// Field order matches the service's serialization, so a token minted from
/// these claims is byte-identical to one minted by the service for the same
/// decision.
///
/// # Example
///
/// ```
/// use openleash::ProofClaims;
///
/// let claims = ProofClaims::builder()
///     .kid("key-1")
///     .decision_id("decision-1")
///     .owner_principal_id("owner-1")
///     .agent_id("agent-1")
///     .action_type("purchase")
///     .action_hash("5fed50d1afcf598480f64ca09edb042a8a09c6b33c8712e3faeeea2aa1d4297d")
///     .build()
///     .unwrap();
///
/// assert_eq!(claims.iss, "openleash");
/// assert!(claims.matched_rule_id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofClaims {
    /// Token issuer
    pub iss: String,
    /// Id of the key that signed the token
    pub kid: String,
    /// When the token was issued
    #[serde(with = "crate::timestamp::millis")]
    pub iat: DateTime<Utc>,
    /// When the token stops being valid
    #[serde(with = "crate::timestamp::millis")]
    pub exp: DateTime<Utc>,
    /// The authorization decision this proof attests
    pub decision_id: String,
    /// Owner the agent acted for
    pub owner_principal_id: String,
    /// The agent that requested the action
    pub agent_id: String,
    /// Type of the approved action
    pub action_type: String,
    /// Hex SHA-256 of the canonical action
    pub action_hash: String,
    /// Policy rule that matched, `null` when the default applied
    pub matched_rule_id: Option<String>,
    /// Trust profile of the relying party
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_profile: Option<String>,
    /// Constraints in force when the decision was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints_snapshot: Option<Value>,
}

impl ProofClaims {
    /// Creates a new builder for proof claims.
    #[must_use]
    pub fn builder() -> ProofClaimsBuilder {
        ProofClaimsBuilder::new()
    }

    /// Returns true if `now` is past the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now
    }
}

/// Builder for [`ProofClaims`].
#[derive(Debug, Clone)]
pub struct ProofClaimsBuilder {
    issuer: String,
    kid: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    ttl: Duration,
    decision_id: Option<String>,
    owner_principal_id: Option<String>,
    agent_id: Option<String>,
    action_type: Option<String>,
    action_hash: Option<String>,
    matched_rule_id: Option<String>,
    trust_profile: Option<String>,
    constraints_snapshot: Option<Value>,
}

impl ProofClaimsBuilder {
    /// Creates a builder with issuer `openleash` and a 120 second TTL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            kid: None,
            issued_at: None,
            ttl: DEFAULT_PROOF_TTL,
            decision_id: None,
            owner_principal_id: None,
            agent_id: None,
            action_type: None,
            action_hash: None,
            matched_rule_id: None,
            trust_profile: None,
            constraints_snapshot: None,
        }
    }

    /// Overrides the issuer claim.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the signing key id.
    #[must_use]
    pub fn kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Pins the issue instant. Defaults to the time of [`build`](Self::build).
    #[must_use]
    pub fn issued_at(mut self, iat: DateTime<Utc>) -> Self {
        self.issued_at = Some(iat);
        self
    }

    /// Sets the time-to-live.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the decision id.
    #[must_use]
    pub fn decision_id(mut self, id: impl Into<String>) -> Self {
        self.decision_id = Some(id.into());
        self
    }

    /// Sets the owner principal id.
    #[must_use]
    pub fn owner_principal_id(mut self, id: impl Into<String>) -> Self {
        self.owner_principal_id = Some(id.into());
        self
    }

    /// Sets the agent id.
    #[must_use]
    pub fn agent_id(mut self, id: impl Into<String>) -> Self {
        self.agent_id = Some(id.into());
        self
    }

    /// Sets the action type.
    #[must_use]
    pub fn action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = Some(action_type.into());
        self
    }

    /// Sets the action hash.
    #[must_use]
    pub fn action_hash(mut self, hash: impl Into<String>) -> Self {
        self.action_hash = Some(hash.into());
        self
    }

    /// Sets the matched rule id.
    #[must_use]
    pub fn matched_rule_id(mut self, id: impl Into<String>) -> Self {
        self.matched_rule_id = Some(id.into());
        self
    }

    /// Sets the trust profile.
    #[must_use]
    pub fn trust_profile(mut self, profile: impl Into<String>) -> Self {
        self.trust_profile = Some(profile.into());
        self
    }

    /// Sets the constraints snapshot.
    #[must_use]
    pub fn constraints_snapshot(mut self, constraints: Value) -> Self {
        self.constraints_snapshot = Some(constraints);
        self
    }

    /// Builds the claims.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClaims`] if a required field is missing or
    /// the TTL does not fit a timestamp.
    pub fn build(self) -> Result<ProofClaims> {
        let iat = self.issued_at.unwrap_or_else(Utc::now);
        let ttl = chrono::Duration::from_std(self.ttl).map_err(|_| Error::InvalidClaims {
            reason: format!("ttl {:?} is out of range", self.ttl),
        })?;
        let exp = iat.checked_add_signed(ttl).ok_or_else(|| Error::InvalidClaims {
            reason: format!("ttl {:?} overflows the expiry timestamp", self.ttl),
        })?;

        Ok(ProofClaims {
            iss: self.issuer,
            kid: required(self.kid, "kid")?,
            iat,
            exp,
            decision_id: required(self.decision_id, "decision_id")?,
            owner_principal_id: required(self.owner_principal_id, "owner_principal_id")?,
            agent_id: required(self.agent_id, "agent_id")?,
            action_type: required(self.action_type, "action_type")?,
            action_hash: required(self.action_hash, "action_hash")?,
            matched_rule_id: self.matched_rule_id,
            trust_profile: self.trust_profile,
            constraints_snapshot: self.constraints_snapshot,
        })
    }
}

impl Default for ProofClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| Error::InvalidClaims {
        reason: format!("missing required field '{field}'"),
    })
}
