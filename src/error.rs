//! Error types for signing, verification and service calls.

use serde::Deserialize;
use thiserror::Error;

/// Why a key container could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecodeKind {
    /// The bytes are not a well-formed SPKI / PKCS#8 DER container
    /// (or not valid base64 when decoding a transport string).
    InvalidKeyEncoding,
    /// The container is well formed but holds a key that is not Ed25519.
    UnsupportedKeyAlgorithm,
}

impl std::fmt::Display for KeyDecodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeyEncoding => f.write_str("invalid key encoding"),
            Self::UnsupportedKeyAlgorithm => f.write_str("unsupported key algorithm"),
        }
    }
}

/// Errors that can occur in the OpenLeash SDK.
///
/// Expected verification outcomes ("no matching key", "token expired") are
/// reported through [`VerifyResult`](crate::VerifyResult); the
/// [`VerificationFailure`](Error::VerificationFailure) and
/// [`TokenExpired`](Error::TokenExpired) variants exist for callers that
/// prefer `?` via [`VerifyResult::into_result`](crate::VerifyResult::into_result).
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A key container is malformed or holds the wrong key type.
    #[error("{kind}: {reason}; expected a base64 DER Ed25519 key (SPKI public, PKCS#8 private)")]
    KeyDecode {
        /// Structural or algorithm failure
        kind: KeyDecodeKind,
        /// Description of the decode failure
        reason: String,
    },
    /// The private key could not produce a signature.
    #[error("signing failed: {reason}")]
    Signing {
        /// Description of the signing failure
        reason: String,
    },
    /// The HTTP request failed or the service answered with a non-success status.
    #[error("{}", transport_message(.status, .body))]
    Transport {
        /// HTTP status, `None` when no response was received
        status: Option<u16>,
        /// Raw response body, or the connection error text
        body: String,
    },
    /// The service answered successfully but the body has an unexpected shape.
    #[error("unexpected response from service: {reason}")]
    Protocol {
        /// Description of the parse failure
        reason: String,
    },
    /// No trusted key validated the proof token.
    #[error("proof token did not verify against any trusted key")]
    VerificationFailure,
    /// The proof token is authentic but its `exp` claim is in the past.
    #[error("proof token expired at {expired_at}; request a new authorization")]
    TokenExpired {
        /// The `exp` claim of the token
        expired_at: String,
    },
    /// A value could not be encoded as canonical JSON.
    #[error("canonical encoding failed: {reason}")]
    Encoding {
        /// Description of the encoding failure
        reason: String,
    },
    /// Proof claims could not be built or parsed.
    #[error("invalid proof claims: {reason}")]
    InvalidClaims {
        /// Description of the claims error
        reason: String,
    },
    /// Client configuration is invalid.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Description of the configuration error
        reason: String,
    },
    /// Request timestamp is malformed or outside the accepted clock skew.
    #[error("request timestamp '{timestamp}' is outside the allowed clock skew window")]
    TimestampSkew {
        /// The offending `X-Timestamp` value
        timestamp: String,
    },
    /// The nonce was already used by this agent.
    #[error("nonce '{nonce}' has already been used by agent '{agent_id}'")]
    NonceReplay {
        /// The agent that sent the request
        agent_id: String,
        /// The replayed nonce
        nonce: String,
    },
    /// `X-Body-Sha256` does not match the received body.
    #[error("body hash does not match X-Body-Sha256")]
    BodyHashMismatch,
    /// The request signature does not verify under the agent's public key.
    #[error("request signature verification failed")]
    InvalidSignature,
}

#[allow(clippy::ref_option)]
fn transport_message(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(status) => format!("HTTP {status}: {body}"),
        None => format!("request failed before a response was received: {body}"),
    }
}

impl Error {
    pub(crate) fn key_encoding(reason: impl Into<String>) -> Self {
        Self::KeyDecode {
            kind: KeyDecodeKind::InvalidKeyEncoding,
            reason: reason.into(),
        }
    }

    pub(crate) fn key_algorithm(reason: impl Into<String>) -> Self {
        Self::KeyDecode {
            kind: KeyDecodeKind::UnsupportedKeyAlgorithm,
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status if this is a [`Transport`](Error::Transport)
    /// error that carried a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Parses the service's `{"error":{"code":..,"message":..}}` body out of
    /// a [`Transport`](Error::Transport) error.
    #[must_use]
    pub fn api_error(&self) -> Option<ApiError> {
        #[derive(Deserialize)]
        struct Envelope {
            error: ApiError,
        }

        match self {
            Self::Transport { body, .. } => serde_json::from_str::<Envelope>(body)
                .ok()
                .map(|envelope| envelope.error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding {
            reason: e.to_string(),
        }
    }
}

/// Error body returned by the OpenLeash service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    /// Machine-readable code, e.g. `CHALLENGE_EXPIRED`
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Result type for OpenLeash operations.
pub type Result<T> = std::result::Result<T, Error>;
