//! Signed envelopes for privileged calls.

use serde::Serialize;

use crate::canonical::to_canonical_json;
use crate::error::Result;
use crate::keys::SigningKey;
use crate::signing::{HEADER_AGENT_ID, SignedHeaders, sign_request};
use crate::timestamp::now_timestamp;

/// Path of the authorization endpoint.
pub const AUTHORIZE_PATH: &str = "/v1/authorize";

/// A fresh request nonce: a random UUID v4, lowercase and hyphenated.
#[must_use]
pub fn new_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A fully signed `POST /v1/authorize` request, ready to send.
///
/// The body is the canonical (JCS) encoding of the action, and those exact
/// bytes are what the signature commits to.
///
/// ```
/// use openleash::{AuthorizedRequest, SigningKey, verify_request_signature};
///
/// let key = SigningKey::generate();
/// let action = serde_json::json!({"action_type": "purchase", "amount_minor": 5000});
/// let request = AuthorizedRequest::build("agent-1", &key, &action).unwrap();
///
/// assert_eq!(request.body, br#"{"action_type":"purchase","amount_minor":5000}"#);
/// assert!(verify_request_signature(
///     request.method,
///     request.path,
///     &request.headers.timestamp,
///     &request.headers.nonce,
///     &request.headers.body_sha256,
///     &request.headers.signature,
///     &key.verifying_key(),
/// ));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRequest {
    /// Always `POST`
    pub method: &'static str,
    /// Always [`AUTHORIZE_PATH`]
    pub path: &'static str,
    /// Sent as `X-Agent-Id`
    pub agent_id: String,
    /// Canonical JSON body
    pub body: Vec<u8>,
    /// Signature envelope
    pub headers: SignedHeaders,
}

impl AuthorizedRequest {
    /// Builds and signs a request with the current time and a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`](crate::Error::Encoding) if the action is
    /// not representable as canonical JSON, or
    /// [`Error::Signing`](crate::Error::Signing) if signing fails.
    pub fn build<A: Serialize + ?Sized>(
        agent_id: impl Into<String>,
        key: &SigningKey,
        action: &A,
    ) -> Result<Self> {
        Self::build_at(agent_id, key, action, &now_timestamp(), &new_nonce())
    }

    /// Builds and signs a request with a caller-chosen timestamp and nonce.
    ///
    /// The nonce must never be reused for the same agent.
    ///
    /// # Errors
    ///
    /// See [`AuthorizedRequest::build`].
    pub fn build_at<A: Serialize + ?Sized>(
        agent_id: impl Into<String>,
        key: &SigningKey,
        action: &A,
        timestamp: &str,
        nonce: &str,
    ) -> Result<Self> {
        let body = to_canonical_json(action)?.into_bytes();
        let headers = sign_request("POST", AUTHORIZE_PATH, timestamp, nonce, &body, key)?;

        Ok(Self {
            method: "POST",
            path: AUTHORIZE_PATH,
            agent_id: agent_id.into(),
            body,
            headers,
        })
    }

    /// All headers to send, including `Content-Type` and `X-Agent-Id`.
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("Content-Type", "application/json"),
            (HEADER_AGENT_ID, self.agent_id.as_str()),
        ];
        pairs.extend(self.headers.pairs());
        pairs
    }
}
