//! Proof token issuer.
//!
//! Mints the PASETO v4.public proof tokens the service returns when it
//! approves an action. Relying parties use it to stand up test issuers and
//! to reproduce conformance vectors.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusty_paseto::prelude::*;
use serde_json::Value;

use crate::claims::{DEFAULT_PROOF_TTL, ProofClaims, ProofClaimsBuilder};
use crate::error::{Error, Result};
use crate::keys::{SigningKey, VerifyingKey};
use crate::trust::TrustedKey;

/// The per-decision inputs of a proof token.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofRequest {
    /// The authorization decision
    pub decision_id: String,
    /// Owner the agent acted for
    pub owner_principal_id: String,
    /// The requesting agent
    pub agent_id: String,
    /// Type of the approved action
    pub action_type: String,
    /// Hex SHA-256 of the canonical action
    pub action_hash: String,
    /// Policy rule that matched
    pub matched_rule_id: Option<String>,
    /// Trust profile of the relying party
    pub trust_profile: Option<String>,
    /// Constraints in force
    pub constraints_snapshot: Option<Value>,
}

impl ProofRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(
        decision_id: impl Into<String>,
        owner_principal_id: impl Into<String>,
        agent_id: impl Into<String>,
        action_type: impl Into<String>,
        action_hash: impl Into<String>,
    ) -> Self {
        Self {
            decision_id: decision_id.into(),
            owner_principal_id: owner_principal_id.into(),
            agent_id: agent_id.into(),
            action_type: action_type.into(),
            action_hash: action_hash.into(),
            matched_rule_id: None,
            trust_profile: None,
            constraints_snapshot: None,
        }
    }

    /// Sets the matched rule id.
    #[must_use]
    pub fn with_matched_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.matched_rule_id = Some(rule_id.into());
        self
    }

    /// Sets the trust profile.
    #[must_use]
    pub fn with_trust_profile(mut self, profile: impl Into<String>) -> Self {
        self.trust_profile = Some(profile.into());
        self
    }

    /// Sets the constraints snapshot.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Value) -> Self {
        self.constraints_snapshot = Some(constraints);
        self
    }
}

/// A freshly minted proof token.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedProof {
    /// The `v4.public.` token
    pub token: String,
    /// The `exp` claim
    pub expires_at: DateTime<Utc>,
    /// The claims that were signed
    pub claims: ProofClaims,
}

/// Signs proof tokens with one key.
///
/// # Example
///
/// ```
/// use openleash::{ProofIssuer, ProofRequest, SigningKey, verify_offline};
///
/// let issuer = ProofIssuer::generate("key-1");
/// let proof = issuer
///     .issue(ProofRequest::new("decision-1", "owner-1", "agent-1", "purchase", "abc"))
///     .unwrap();
///
/// let result = verify_offline(&proof.token, &[issuer.trusted_key()]);
/// assert!(result.valid);
/// ```
#[derive(Debug, Clone)]
pub struct ProofIssuer {
    kid: String,
    signing_key: SigningKey,
    default_ttl: Duration,
}

impl ProofIssuer {
    /// Creates an issuer for `signing_key`, published under `kid`.
    #[must_use]
    pub fn new(kid: impl Into<String>, signing_key: SigningKey, default_ttl: Duration) -> Self {
        Self {
            kid: kid.into(),
            signing_key,
            default_ttl,
        }
    }

    /// Creates an issuer with a random key and the default TTL.
    #[must_use]
    pub fn generate(kid: impl Into<String>) -> Self {
        Self::new(kid, SigningKey::generate(), DEFAULT_PROOF_TTL)
    }

    /// The key id placed in the `kid` claim.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Returns the issuer's public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The trust-set entry a verifier needs for this issuer.
    #[must_use]
    pub fn trusted_key(&self) -> TrustedKey {
        TrustedKey::new(self.kid.clone(), self.verifying_key())
    }

    /// Returns the default TTL.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issues a proof valid for the default TTL from now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClaims`] if the claims cannot be built or the
    /// token cannot be signed.
    pub fn issue(&self, request: ProofRequest) -> Result<IssuedProof> {
        self.issue_at(request, Utc::now())
    }

    /// Issues a proof whose `iat` is `issued_at`.
    ///
    /// # Errors
    ///
    /// See [`ProofIssuer::issue`].
    pub fn issue_at(&self, request: ProofRequest, issued_at: DateTime<Utc>) -> Result<IssuedProof> {
        let mut builder = ProofClaimsBuilder::new()
            .kid(&self.kid)
            .issued_at(issued_at)
            .ttl(self.default_ttl)
            .decision_id(request.decision_id)
            .owner_principal_id(request.owner_principal_id)
            .agent_id(request.agent_id)
            .action_type(request.action_type)
            .action_hash(request.action_hash);
        if let Some(rule) = request.matched_rule_id {
            builder = builder.matched_rule_id(rule);
        }
        if let Some(profile) = request.trust_profile {
            builder = builder.trust_profile(profile);
        }
        if let Some(constraints) = request.constraints_snapshot {
            builder = builder.constraints_snapshot(constraints);
        }
        let claims = builder.build()?;

        let token = self.issue_claims(&claims)?;
        Ok(IssuedProof {
            token,
            expires_at: claims.exp,
            claims,
        })
    }

    /// Signs `claims` verbatim as a footer-less v4.public token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClaims`] if serialization or signing fails.
    pub fn issue_claims(&self, claims: &ProofClaims) -> Result<String> {
        let payload = serde_json::to_string(claims).map_err(|e| Error::InvalidClaims {
            reason: e.to_string(),
        })?;

        let key_bytes = self.signing_key.as_dalek().to_keypair_bytes();
        let key_wrapper = Key::<64>::from(&key_bytes);
        let paseto_key = PasetoAsymmetricPrivateKey::<V4, Public>::from(&key_wrapper);

        Paseto::<V4, Public>::default()
            .set_payload(Payload::from(payload.as_str()))
            .try_sign(&paseto_key)
            .map_err(|e| Error::InvalidClaims {
                reason: format!("token signing failed: {e}"),
            })
    }
}
