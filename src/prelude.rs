//! Convenient re-exports for glob imports.
//!
//! ```rust
//! use openleash::prelude::*;
//!
//! let key = SigningKey::generate();
//! let request = AuthorizedRequest::build("agent-1", &key, &serde_json::json!({})).unwrap();
//! assert_eq!(request.path, "/v1/authorize");
//! ```
//!
//! Header-name and reason constants are left out; import them by path.

pub use crate::{
    // Keys
    AgentKeypair, SigningKey, VerifyingKey,
    // Signing
    AuthorizedRequest, SignedHeaders, sign_challenge, sign_request, verify_request_signature,
    // Registration
    AgentRegistration, AgentStatus, ChallengeRequest, RegisterRequest, RegistrationChallenge,
    // Proofs
    IssuedProof, ProofClaims, ProofExpectations, ProofIssuer, ProofRequest, PublicKeyInfo,
    TrustedKey, VerifyResult, trusted_keys_from, verify_offline, verify_offline_expecting,
    // Receiving
    ReplayConfig, ReplayGuard,
    // Errors
    Error, KeyDecodeKind,
    // Encoding
    action_hash, to_canonical_json,
};
