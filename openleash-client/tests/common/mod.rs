//! An in-process stand-in for the OpenLeash service.
//!
//! Implements the registration handshake, signed `/v1/authorize` with replay
//! protection, proof issuance and verification, and key publication, backed
//! by the `openleash` core. Requests are recorded for inspection.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use chrono::Utc;
use openleash::{
    Error, ProofExpectations, ProofIssuer, ProofRequest, ReplayGuard, Signature, SignedHeaders,
    VerifyingKey, sha256_hex, verify, verify_offline_expecting,
};
use serde_json::{Value, json};

pub const CHALLENGE: [u8; 32] = [7; 32];

pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .try_init();
}

/// One request as the stub received it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

struct Stub {
    halt: AtomicBool,
    garbage: AtomicBool,
    recorded: Mutex<Vec<Recorded>>,
    agents: Mutex<HashMap<String, VerifyingKey>>,
    replay: ReplayGuard,
    issuer: ProofIssuer,
}

/// A running stub service; shuts down on drop.
pub struct StubService {
    addr: String,
    state: Arc<Stub>,
    kill: Option<tokio::sync::oneshot::Sender<()>>,
}

impl Drop for StubService {
    fn drop(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

impl StubService {
    pub fn start() -> Self {
        let state = Arc::new(Stub {
            halt: AtomicBool::new(false),
            garbage: AtomicBool::new(false),
            recorded: Mutex::new(Vec::new()),
            agents: Mutex::new(HashMap::new()),
            replay: ReplayGuard::default(),
            issuer: ProofIssuer::generate("stub-key-1"),
        });

        let (kill, kill_r) = tokio::sync::oneshot::channel::<()>();
        let (addr_s, addr_r) = std::sync::mpsc::channel();
        let app_state = state.clone();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let l = tokio::net::TcpListener::bind(std::net::SocketAddr::from((
                    [127, 0, 0, 1],
                    0,
                )))
                .await
                .unwrap();
                addr_s.send(l.local_addr().unwrap()).unwrap();

                let app = Router::new().fallback(handle).with_state(app_state);
                axum::serve(l, app)
                    .with_graceful_shutdown(async move {
                        let _ = kill_r.await;
                    })
                    .await
                    .unwrap();
            });
        });

        let addr = format!("http://{}", addr_r.recv().unwrap());
        Self {
            addr,
            state,
            kill: Some(kill),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Makes every endpoint answer 503 with a plain-text body.
    pub fn set_halt(&self, halt: bool) {
        self.state.halt.store(halt, Ordering::SeqCst);
    }

    /// Makes every endpoint answer 200 with a body that is not JSON.
    pub fn set_garbage(&self, garbage: bool) {
        self.state.garbage.store(garbage, Ordering::SeqCst);
    }

    pub fn issuer(&self) -> &ProofIssuer {
        &self.state.issuer
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.state.recorded.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.recorded().pop().unwrap()
    }

    pub fn register_directly(&self, agent_id: &str, key: VerifyingKey) {
        self.state
            .agents
            .lock()
            .unwrap()
            .insert(agent_id.to_string(), key);
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn error(status: StatusCode, code: &str, message: &str) -> Response {
    reply(status, json!({"error": {"code": code, "message": message}}))
}

async fn handle(
    State(stub): State<Arc<Stub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect(),
        body: body.to_vec(),
    };
    stub.recorded.lock().unwrap().push(recorded.clone());

    if stub.halt.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    if stub.garbage.load(Ordering::SeqCst) {
        return (StatusCode::OK, "<html>welcome</html>").into_response();
    }

    match (method.as_str(), uri.path()) {
        ("GET", "/v1/health") => reply(
            StatusCode::OK,
            json!({"status": "ok", "time": Utc::now().to_rfc3339(), "version": "0.1.0"}),
        ),
        ("GET", "/v1/public-keys") => public_keys(&stub),
        ("POST", "/v1/agents/registration-challenge") => challenge(&recorded),
        ("POST", "/v1/agents/register") => register(&stub, &recorded),
        ("POST", "/v1/authorize") => authorize(&stub, &recorded),
        ("POST", "/v1/verify-proof") => verify_proof(&stub, &recorded),
        _ => error(StatusCode::NOT_FOUND, "NOT_FOUND", "no such route"),
    }
}

fn public_keys(stub: &Stub) -> Response {
    let retired = ProofIssuer::generate("stub-key-0");
    let key_json = |issuer: &ProofIssuer, revoked: bool| {
        json!({
            "kid": issuer.kid(),
            "kty": "OKP",
            "alg": "EdDSA",
            "public_key_b64": issuer.verifying_key().to_spki_base64().unwrap(),
            "created_at": "2024-01-01T00:00:00.000Z",
            "revoked_at": if revoked { json!("2024-01-10T00:00:00.000Z") } else { Value::Null },
        })
    };
    reply(
        StatusCode::OK,
        json!({"keys": [key_json(&retired, true), key_json(&stub.issuer, false)]}),
    )
}

fn challenge(request: &Recorded) -> Response {
    let body = request.json();
    if body.get("agent_id").and_then(Value::as_str).is_none() {
        return error(
            StatusCode::BAD_REQUEST,
            "INVALID_BODY",
            "agent_id is required",
        );
    }
    reply(
        StatusCode::OK,
        json!({
            "challenge_id": "challenge-1",
            "challenge_b64": BASE64_STANDARD.encode(CHALLENGE),
            "expires_at": (Utc::now() + chrono::Duration::minutes(5)).to_rfc3339(),
        }),
    )
}

fn register(stub: &Stub, request: &Recorded) -> Response {
    let body = request.json();
    let field = |name: &str| body.get(name).and_then(Value::as_str).unwrap_or("").to_string();

    if field("challenge_id") != "challenge-1" {
        return error(
            StatusCode::BAD_REQUEST,
            "INVALID_CHALLENGE",
            "Unknown challenge",
        );
    }
    let Ok(public_key) = VerifyingKey::from_spki_base64(&field("agent_pubkey_b64")) else {
        return error(
            StatusCode::BAD_REQUEST,
            "INVALID_PUBLIC_KEY",
            "Bad public key",
        );
    };
    let signature = BASE64_STANDARD
        .decode(field("signature_b64"))
        .ok()
        .and_then(|bytes| Signature::from_slice(&bytes).ok());
    if !signature.is_some_and(|sig| verify(&public_key, &CHALLENGE, &sig)) {
        return error(
            StatusCode::UNAUTHORIZED,
            "INVALID_SIGNATURE",
            "Challenge signature invalid",
        );
    }

    stub.agents
        .lock()
        .unwrap()
        .insert(field("agent_id"), public_key);
    reply(
        StatusCode::OK,
        json!({
            "agent_principal_id": format!("principal-{}", field("agent_id")),
            "agent_id": field("agent_id"),
            "owner_principal_id": field("owner_principal_id"),
            "status": "ACTIVE",
            "created_at": Utc::now().to_rfc3339(),
        }),
    )
}

fn authorize(stub: &Stub, request: &Recorded) -> Response {
    let header = |name: &str| request.header(name).unwrap_or("").to_string();
    let agent_id = header("x-agent-id");
    let Some(public_key) = stub.agents.lock().unwrap().get(&agent_id).cloned() else {
        return error(StatusCode::UNAUTHORIZED, "AGENT_NOT_FOUND", "Unknown agent");
    };
    let signed = SignedHeaders {
        timestamp: header("x-timestamp"),
        nonce: header("x-nonce"),
        body_sha256: header("x-body-sha256"),
        signature: header("x-signature"),
    };

    if let Err(e) = stub.replay.check(
        &agent_id,
        "POST",
        "/v1/authorize",
        &signed,
        &request.body,
        &public_key,
        Utc::now(),
    ) {
        let code = match e {
            Error::TimestampSkew { .. } => "TIMESTAMP_SKEW",
            Error::NonceReplay { .. } => "NONCE_REPLAY",
            Error::BodyHashMismatch => "BODY_HASH_MISMATCH",
            _ => "INVALID_SIGNATURE",
        };
        return error(StatusCode::UNAUTHORIZED, code, &e.to_string());
    }

    let action = request.json();
    let action_type = action
        .get("action_type")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let proof = stub
        .issuer
        .issue(ProofRequest::new(
            "decision-1",
            "owner-1",
            &agent_id,
            action_type,
            sha256_hex(&request.body),
        ))
        .unwrap();

    reply(
        StatusCode::OK,
        json!({
            "decision_id": "decision-1",
            "result": "ALLOW",
            "matched_rule_id": null,
            "proof_token": proof.token,
            "proof_expires_at": proof.expires_at.to_rfc3339(),
        }),
    )
}

fn verify_proof(stub: &Stub, request: &Recorded) -> Response {
    let body = request.json();
    let Some(token) = body
        .get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
    else {
        return reply(StatusCode::OK, json!({"valid": false, "reason": "Missing token"}));
    };
    let mut expected = ProofExpectations::default();
    if let Some(hash) = body.get("expected_action_hash").and_then(Value::as_str) {
        expected = expected.action_hash(hash);
    }
    if let Some(agent) = body.get("expected_agent_id").and_then(Value::as_str) {
        expected = expected.agent_id(agent);
    }

    let result = verify_offline_expecting(token, &[stub.issuer.trusted_key()], &expected);
    reply(StatusCode::OK, serde_json::to_value(result).unwrap())
}
