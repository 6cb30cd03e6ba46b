//! Integration tests for issuing and verifying proof tokens.

use std::time::Duration;

use chrono::Utc;
use openleash::{
    Error, ProofClaims, ProofExpectations, ProofIssuer, ProofRequest, PublicKeyInfo, SigningKey,
    TrustedKey, action_hash, trusted_keys_from, verify_offline, verify_offline_at,
    verify_offline_expecting,
};

const NO_MATCH: &str = "No matching key found or invalid signature";

fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .try_init();
}

fn purchase() -> serde_json::Value {
    serde_json::json!({
        "action_type": "purchase",
        "payload": {"amount_minor": 5000, "currency": "USD"},
    })
}

fn request_for(action: &serde_json::Value) -> ProofRequest {
    ProofRequest::new(
        "decision-1",
        "owner-1",
        "agent-1",
        "purchase",
        action_hash(action).unwrap(),
    )
}

#[test]
fn round_trip_issue_and_verify() {
    // Arrange
    let issuer = ProofIssuer::generate("key-1");
    let action = purchase();

    // Act
    let proof = issuer.issue(request_for(&action)).unwrap();
    let result = verify_offline(&proof.token, &[issuer.trusted_key()]);

    // Assert
    assert!(result.valid);
    let claims = result.proof_claims().unwrap().unwrap();
    assert_eq!(claims, proof.claims.clone().with_millis());
    assert_eq!(claims.action_hash, action_hash(&action).unwrap());
    assert!(!claims.is_expired_at(Utc::now()));
}

#[test]
fn empty_trust_set_rejects_everything() {
    let issuer = ProofIssuer::generate("key-1");
    let proof = issuer.issue(request_for(&purchase())).unwrap();

    let result = verify_offline(&proof.token, &[]);

    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some(NO_MATCH));
    assert!(result.claims.is_none());
}

#[test]
fn wrong_key_is_indistinguishable_from_malformed_token() {
    let issuer = ProofIssuer::generate("key-1");
    let stranger = TrustedKey::new("key-2", SigningKey::generate().verifying_key());
    let proof = issuer.issue(request_for(&purchase())).unwrap();

    let wrong_key = verify_offline(&proof.token, std::slice::from_ref(&stranger));
    let malformed = verify_offline("v4.public.garbage", &[stranger]);

    assert_eq!(wrong_key, malformed);
}

#[test]
fn tampered_payload_fails() {
    let issuer = ProofIssuer::generate("key-1");
    let proof = issuer.issue(request_for(&purchase())).unwrap();

    let mut bytes = proof.token.into_bytes();
    let idx = "v4.public.".len() + 4;
    bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes).unwrap();

    let result = verify_offline(&tampered, &[issuer.trusted_key()]);
    assert_eq!(result.reason.as_deref(), Some(NO_MATCH));
}

#[test]
fn expired_token_keeps_claims_and_maps_to_error() {
    // Arrange
    let issuer = ProofIssuer::new("key-1", SigningKey::generate(), Duration::from_secs(60));
    let proof = issuer.issue(request_for(&purchase())).unwrap();
    let later = proof.expires_at + chrono::Duration::seconds(1);

    // Act
    let result = verify_offline_at(&proof.token, &[issuer.trusted_key()], later);

    // Assert
    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("Token expired"));
    assert_eq!(result.claims.as_ref().unwrap()["agent_id"], "agent-1");
    assert!(matches!(
        result.into_result(),
        Err(Error::TokenExpired { .. })
    ));
}

#[test]
fn token_is_valid_at_exact_expiry() {
    let issuer = ProofIssuer::generate("key-1");
    let proof = issuer.issue(request_for(&purchase())).unwrap();
    let exp_on_wire = proof.claims.clone().with_millis().exp;

    let result = verify_offline_at(&proof.token, &[issuer.trusted_key()], exp_on_wire);

    assert!(result.valid);
}

#[test]
fn first_validating_key_wins() {
    enable_tracing();
    // Two entries with the same public key but different ids.
    let signing_key = SigningKey::generate();
    let issuer = ProofIssuer::new("key-a", signing_key.clone(), Duration::from_secs(60));
    let proof = issuer.issue(request_for(&purchase())).unwrap();
    let keys = [
        TrustedKey::new("stranger", SigningKey::generate().verifying_key()),
        TrustedKey::new("key-a", signing_key.verifying_key()),
        TrustedKey::new("key-b", signing_key.verifying_key()),
    ];

    let result = verify_offline(&proof.token, &keys);

    assert!(result.valid);
    assert_eq!(result.claims.unwrap()["kid"], "key-a");
}

#[test]
fn rotated_keys_from_published_set() {
    enable_tracing();
    // Arrange: the service rotated from old to new and revoked old
    let old = ProofIssuer::generate("old");
    let new = ProofIssuer::generate("new");
    let published = vec![
        PublicKeyInfo {
            kid: "old".into(),
            kty: "OKP".into(),
            alg: "EdDSA".into(),
            public_key_b64: old.verifying_key().to_spki_base64().unwrap(),
            created_at: Utc::now(),
            revoked_at: Some(Utc::now()),
        },
        PublicKeyInfo {
            kid: "new".into(),
            kty: "OKP".into(),
            alg: "EdDSA".into(),
            public_key_b64: new.verifying_key().to_spki_base64().unwrap(),
            created_at: Utc::now(),
            revoked_at: None,
        },
    ];

    // Act
    let keys = trusted_keys_from(&published);
    let old_proof = old.issue(request_for(&purchase())).unwrap();
    let new_proof = new.issue(request_for(&purchase())).unwrap();

    // Assert
    assert!(!verify_offline(&old_proof.token, &keys).valid);
    assert!(verify_offline(&new_proof.token, &keys).valid);
}

#[test]
fn expectations_bind_token_to_action_and_agent() {
    let issuer = ProofIssuer::generate("key-1");
    let action = purchase();
    let proof = issuer.issue(request_for(&action)).unwrap();
    let keys = [issuer.trusted_key()];

    let matching = ProofExpectations::default()
        .action_hash(action_hash(&action).unwrap())
        .agent_id("agent-1");
    assert!(verify_offline_expecting(&proof.token, &keys, &matching).valid);

    let other_action = serde_json::json!({
        "action_type": "purchase",
        "payload": {"amount_minor": 9999},
    });
    let mismatched = ProofExpectations::default().action_hash(action_hash(&other_action).unwrap());
    let result = verify_offline_expecting(&proof.token, &keys, &mismatched);
    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("action_hash mismatch"));
}

trait WireMillis {
    fn with_millis(self) -> Self;
}

impl WireMillis for ProofClaims {
    // Timestamps travel with millisecond precision.
    fn with_millis(mut self) -> Self {
        use chrono::{DurationRound, TimeDelta};
        self.iat = self.iat.duration_trunc(TimeDelta::milliseconds(1)).unwrap();
        self.exp = self.exp.duration_trunc(TimeDelta::milliseconds(1)).unwrap();
        self
    }
}
