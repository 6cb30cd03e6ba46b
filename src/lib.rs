//! Request signing and offline proof verification for OpenLeash agents.
//!
//! An agent holds an Ed25519 keypair. It registers the public key with the
//! OpenLeash service through a challenge-response handshake, then signs
//! every privileged request it sends. When the service approves an action
//! it returns a PASETO v4.public proof token, which any relying party can
//! check offline against the service's published keys.
//!
//! This crate is the transport-free core: key codecs, canonical JSON, the
//! request signer, proof issuance and verification, and a receiver-side
//! replay guard. The blocking HTTP client lives in `openleash-client`.
//!
//! # Signing a request
//!
//! ```rust
//! use openleash::{AuthorizedRequest, SigningKey};
//!
//! let key = SigningKey::generate();
//! let action = serde_json::json!({
//!     "action_type": "purchase",
//!     "payload": {"amount_minor": 5000, "currency": "USD"},
//! });
//!
//! let request = AuthorizedRequest::build("agent-1", &key, &action).unwrap();
//! for (name, value) in request.header_pairs() {
//!     println!("{name}: {value}");
//! }
//! ```
//!
//! # Verifying a proof offline
//!
//! ```rust
//! use openleash::{ProofIssuer, ProofRequest, action_hash, verify_offline};
//!
//! let action = serde_json::json!({"action_type": "purchase"});
//! let issuer = ProofIssuer::generate("key-1");
//! let proof = issuer
//!     .issue(ProofRequest::new(
//!         "decision-1",
//!         "owner-1",
//!         "agent-1",
//!         "purchase",
//!         action_hash(&action).unwrap(),
//!     ))
//!     .unwrap();
//!
//! let result = verify_offline(&proof.token, &[issuer.trusted_key()]);
//! assert!(result.valid);
//! ```
//!
//! # Wire formats
//!
//! | Item | Format |
//! |------|--------|
//! | Public key | base64 SPKI DER (Ed25519) |
//! | Private key | base64 PKCS#8 DER (Ed25519) |
//! | Timestamp | `YYYY-MM-DDTHH:mm:ss.sssZ` |
//! | Nonce | UUID v4, lowercase |
//! | Body digest | lowercase hex SHA-256 |
//! | Signature | base64 Ed25519 |
//! | Proof token | PASETO v4.public, no footer |

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod canonical;
mod claims;
mod envelope;
mod error;
mod hashing;
mod issuer;
mod keys;
pub mod prelude;
mod registration;
mod replay;
mod signing;
mod timestamp;
mod trust;
mod verifier;

pub use canonical::{action_hash, canonicalize, to_canonical_json};
pub use claims::{DEFAULT_ISSUER, DEFAULT_PROOF_TTL, ProofClaims, ProofClaimsBuilder};
pub use envelope::{AUTHORIZE_PATH, AuthorizedRequest, new_nonce};
pub use error::{ApiError, Error, KeyDecodeKind, Result};
pub use hashing::{digest, sha256_hex};
pub use issuer::{IssuedProof, ProofIssuer, ProofRequest};
pub use keys::{AgentKeypair, SigningKey, VerifyingKey, decode_private_key, decode_public_key};
pub use registration::{
    AgentRegistration, AgentStatus, CHALLENGE_PATH, ChallengeRequest, REGISTER_PATH,
    RegisterRequest, RegistrationChallenge,
};
pub use replay::{ReplayConfig, ReplayGuard};
pub use signing::{
    HEADER_AGENT_ID, HEADER_BODY_SHA256, HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    SignedHeaders, build_signing_input, build_signing_input_from_digest, sign, sign_challenge,
    sign_request, verify, verify_request_signature,
};
pub use timestamp::{format_timestamp, now_timestamp, parse_timestamp};
pub use trust::{PublicKeyInfo, TrustedKey, trusted_keys_from};
pub use verifier::{
    ProofExpectations, REASON_ACTION_HASH_MISMATCH, REASON_AGENT_ID_MISMATCH, REASON_EXPIRED,
    REASON_NO_MATCHING_KEY, VerifyResult, verify_offline, verify_offline_at,
    verify_offline_expecting,
};

/// Re-exported so callers can name [`sign`]'s return type.
pub use ed25519_dalek::Signature;
