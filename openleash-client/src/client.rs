//! The OpenLeash service client.

use openleash::{
    AUTHORIZE_PATH, AgentRegistration, AuthorizedRequest, CHALLENGE_PATH, ChallengeRequest,
    PublicKeyInfo, REGISTER_PATH, RegisterRequest, RegistrationChallenge, Result, SigningKey,
    TrustedKey, VerifyResult, VerifyingKey, sign_challenge, trusted_keys_from,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::transport::Transport;

/// Path of the online proof verification endpoint.
pub const VERIFY_PROOF_PATH: &str = "/v1/verify-proof";
/// Path of the public key listing.
pub const PUBLIC_KEYS_PATH: &str = "/v1/public-keys";
/// Path of the health check.
pub const HEALTH_PATH: &str = "/v1/health";

#[derive(Debug, Serialize)]
struct VerifyProofRequest<'a> {
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_action_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_agent_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PublicKeysResponse {
    keys: Vec<PublicKeyInfo>,
}

/// Service liveness report from `GET /v1/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    /// `ok` when the service is up
    pub status: String,
    /// Service clock, RFC 3339
    pub time: String,
    /// Service version
    pub version: String,
}

/// Blocking client for the OpenLeash HTTP API.
///
/// Every call blocks the calling thread until the response arrives or the
/// configured timeout elapses. Nothing is retried.
///
/// ```no_run
/// use openleash::SigningKey;
/// use openleash_client::{ClientConfig, OpenLeashClient};
///
/// let client = OpenLeashClient::new(ClientConfig::from_env()?)?;
/// let key = SigningKey::generate();
///
/// client.register_agent(&key, "shop-agent", "owner-1")?;
/// let decision = client.authorize(
///     "shop-agent",
///     &key,
///     &serde_json::json!({"action_type": "purchase"}),
/// )?;
/// println!("{decision}");
/// # Ok::<(), openleash::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct OpenLeashClient {
    transport: Transport,
}

impl OpenLeashClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](openleash::Error::Config) if the base URL is
    /// not an absolute http(s) URL.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(&config)?,
        })
    }

    /// Creates a client from [`ClientConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](openleash::Error::Config) for invalid
    /// environment values.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// The normalized service root.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.transport.base_url()
    }

    /// Asks the service for a registration challenge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](openleash::Error::Transport) for network
    /// failures and non-success statuses, and
    /// [`Error::Protocol`](openleash::Error::Protocol) for an unexpected body.
    pub fn request_challenge(
        &self,
        agent_id: &str,
        public_key: &VerifyingKey,
        owner_principal_id: Option<&str>,
    ) -> Result<RegistrationChallenge> {
        let mut request = ChallengeRequest::new(agent_id, public_key)?;
        if let Some(owner) = owner_principal_id {
            request = request.owner(owner);
        }
        self.send_challenge_request(&request)
    }

    /// Sends a prepared challenge request, e.g. one carrying agent
    /// attributes.
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge).
    pub fn send_challenge_request(
        &self,
        request: &ChallengeRequest,
    ) -> Result<RegistrationChallenge> {
        debug!(agent_id = %request.agent_id, "requesting registration challenge");
        let body = serde_json::to_vec(request)?;
        self.transport.post_json(CHALLENGE_PATH, &[], &body)
    }

    /// Completes registration with a signed challenge.
    ///
    /// `signature_b64` is the output of [`sign_challenge`].
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge).
    pub fn complete_registration(
        &self,
        challenge_id: &str,
        agent_id: &str,
        public_key: &VerifyingKey,
        signature_b64: &str,
        owner_principal_id: &str,
    ) -> Result<AgentRegistration> {
        self.send_register_request(&RegisterRequest {
            challenge_id: challenge_id.to_string(),
            agent_id: agent_id.to_string(),
            agent_pubkey_b64: public_key.to_spki_base64()?,
            signature_b64: signature_b64.to_string(),
            owner_principal_id: owner_principal_id.to_string(),
            agent_attributes_json: None,
        })
    }

    /// Sends a prepared registration request.
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge).
    pub fn send_register_request(&self, request: &RegisterRequest) -> Result<AgentRegistration> {
        debug!(
            agent_id = %request.agent_id,
            challenge_id = %request.challenge_id,
            "completing registration"
        );
        let body = serde_json::to_vec(request)?;
        self.transport.post_json(REGISTER_PATH, &[], &body)
    }

    /// Runs the whole handshake: challenge, sign, register.
    ///
    /// # Errors
    ///
    /// Any error of the two requests, or
    /// [`Error::Protocol`](openleash::Error::Protocol) if the challenge is not
    /// base64.
    pub fn register_agent(
        &self,
        key: &SigningKey,
        agent_id: &str,
        owner_principal_id: &str,
    ) -> Result<AgentRegistration> {
        let public_key = key.verifying_key();
        let challenge = self.request_challenge(agent_id, &public_key, Some(owner_principal_id))?;
        let signature = sign_challenge(key, &challenge.challenge_b64)?;
        self.complete_registration(
            &challenge.challenge_id,
            agent_id,
            &public_key,
            &signature,
            owner_principal_id,
        )
    }

    /// Signs and submits an action for authorization.
    ///
    /// The decision body is returned as-is.
    ///
    /// # Errors
    ///
    /// [`Error::Encoding`](openleash::Error::Encoding) if the action cannot be
    /// canonicalized, otherwise see
    /// [`request_challenge`](Self::request_challenge).
    pub fn authorize<A: Serialize + ?Sized>(
        &self,
        agent_id: &str,
        key: &SigningKey,
        action: &A,
    ) -> Result<Value> {
        let request = AuthorizedRequest::build(agent_id, key, action)?;
        self.send_authorized(&request)
    }

    /// Submits a prebuilt signed request.
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge).
    pub fn send_authorized(&self, request: &AuthorizedRequest) -> Result<Value> {
        debug!(agent_id = %request.agent_id, nonce = %request.headers.nonce, "authorizing action");
        self.transport
            .post_json(AUTHORIZE_PATH, &request.header_pairs(), &request.body)
    }

    /// Asks the service to verify a proof token.
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge). A rejected token is
    /// an `Ok` result with `valid: false`.
    pub fn verify_proof_online(
        &self,
        token: &str,
        expected_action_hash: Option<&str>,
        expected_agent_id: Option<&str>,
    ) -> Result<VerifyResult> {
        let body = serde_json::to_vec(&VerifyProofRequest {
            token,
            expected_action_hash,
            expected_agent_id,
        })?;
        self.transport.post_json(VERIFY_PROOF_PATH, &[], &body)
    }

    /// Lists the service's proof signing keys, revoked ones included.
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge).
    pub fn public_keys(&self) -> Result<Vec<PublicKeyInfo>> {
        let response: PublicKeysResponse = self.transport.get_json(PUBLIC_KEYS_PATH)?;
        Ok(response.keys)
    }

    /// Fetches a trust set for offline verification.
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge).
    pub fn trusted_keys(&self) -> Result<Vec<TrustedKey>> {
        Ok(trusted_keys_from(&self.public_keys()?))
    }

    /// Checks that the service is up.
    ///
    /// # Errors
    ///
    /// See [`request_challenge`](Self::request_challenge).
    pub fn health(&self) -> Result<HealthStatus> {
        self.transport.get_json(HEALTH_PATH)
    }
}
