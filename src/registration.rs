//! Registration handshake messages.
//!
//! Registration binds an agent's public key to its agent id:
//!
//! 1. the agent asks for a challenge (`POST /v1/agents/registration-challenge`),
//! 2. signs the challenge bytes with its private key
//!    ([`sign_challenge`](crate::sign_challenge)),
//! 3. submits the signature (`POST /v1/agents/register`).
//!
//! The challenge is single-use and time-bounded. Both properties are
//! enforced by the service; these types only shape the requests and parse
//! the responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::keys::VerifyingKey;

/// Path of the challenge endpoint.
pub const CHALLENGE_PATH: &str = "/v1/agents/registration-challenge";
/// Path of the registration endpoint.
pub const REGISTER_PATH: &str = "/v1/agents/register";

/// Body of a challenge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// The agent id being registered
    pub agent_id: String,
    /// Base64 SPKI DER of the agent's public key
    pub agent_pubkey_b64: String,
    /// Owner principal the agent will act for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_principal_id: Option<String>,
    /// Free-form attributes stored with the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_attributes_json: Option<Map<String, Value>>,
}

impl ChallengeRequest {
    /// Creates a challenge request for `agent_id` and its public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`](crate::Error::Encoding) if the key cannot
    /// be serialized.
    pub fn new(agent_id: impl Into<String>, public_key: &VerifyingKey) -> Result<Self> {
        Ok(Self {
            agent_id: agent_id.into(),
            agent_pubkey_b64: public_key.to_spki_base64()?,
            owner_principal_id: None,
            agent_attributes_json: None,
        })
    }

    /// Sets the owner principal.
    #[must_use]
    pub fn owner(mut self, owner_principal_id: impl Into<String>) -> Self {
        self.owner_principal_id = Some(owner_principal_id.into());
        self
    }

    /// Sets agent attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.agent_attributes_json = Some(attributes);
        self
    }
}

/// A challenge issued by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationChallenge {
    /// Identifier to quote when completing registration
    pub challenge_id: String,
    /// Random challenge bytes, base64
    pub challenge_b64: String,
    /// After this instant the service rejects the challenge
    pub expires_at: DateTime<Utc>,
}

impl RegistrationChallenge {
    /// Returns true once `now` is past the challenge expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Body of a registration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// The challenge being answered
    pub challenge_id: String,
    /// The agent id being registered
    pub agent_id: String,
    /// Base64 SPKI DER of the agent's public key
    pub agent_pubkey_b64: String,
    /// Base64 Ed25519 signature over the decoded challenge bytes
    pub signature_b64: String,
    /// Owner principal the agent will act for
    pub owner_principal_id: String,
    /// Free-form attributes stored with the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_attributes_json: Option<Map<String, Value>>,
}

/// Lifecycle status of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    /// The agent may sign requests
    Active,
    /// The agent's key has been revoked
    Revoked,
    /// A status this SDK does not know about
    #[serde(other)]
    Unknown,
}

/// The registration record returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRegistration {
    /// Service-assigned principal id of the agent
    pub agent_principal_id: String,
    /// The agent id that was registered
    pub agent_id: String,
    /// Owner principal the agent acts for
    pub owner_principal_id: String,
    /// Current status
    pub status: AgentStatus,
    /// When the agent was registered
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;

    #[test]
    fn challenge_request_omits_unset_owner() {
        let key = SigningKey::generate();
        let request = ChallengeRequest::new("agent-1", &key.verifying_key()).unwrap();

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["agent_id"], "agent-1");
        assert_eq!(
            json["agent_pubkey_b64"],
            key.verifying_key().to_spki_base64().unwrap()
        );
        assert!(json.get("owner_principal_id").is_none());
        assert!(json.get("agent_attributes_json").is_none());
    }

    #[test]
    fn challenge_request_with_owner() {
        let key = SigningKey::generate();
        let request = ChallengeRequest::new("agent-1", &key.verifying_key())
            .unwrap()
            .owner("owner-7");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["owner_principal_id"], "owner-7");
    }

    #[test]
    fn parses_challenge_response() {
        let challenge: RegistrationChallenge = serde_json::from_str(
            r#"{"challenge_id":"c-1","challenge_b64":"AAEC","expires_at":"2024-01-15T10:35:00.000Z"}"#,
        )
        .unwrap();

        assert_eq!(challenge.challenge_id, "c-1");
        let before = crate::parse_timestamp("2024-01-15T10:34:59.999Z").unwrap();
        let after = crate::parse_timestamp("2024-01-15T10:35:00.001Z").unwrap();
        assert!(!challenge.is_expired_at(before));
        assert!(challenge.is_expired_at(after));
    }

    #[test]
    fn parses_registration_record() {
        let record: AgentRegistration = serde_json::from_str(
            r#"{
                "agent_principal_id": "p-1",
                "agent_id": "agent-1",
                "owner_principal_id": "owner-7",
                "status": "ACTIVE",
                "created_at": "2024-01-15T10:30:00.000Z"
            }"#,
        )
        .unwrap();

        assert_eq!(record.status, AgentStatus::Active);
        assert_eq!(record.owner_principal_id, "owner-7");
    }

    #[test]
    fn unknown_status_does_not_fail_parsing() {
        let record: AgentRegistration = serde_json::from_str(
            r#"{"agent_principal_id":"p","agent_id":"a","owner_principal_id":"o",
                "status":"SUSPENDED","created_at":"2024-01-15T10:30:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(record.status, AgentStatus::Unknown);
    }
}
