//! Blocking HTTP client for the OpenLeash service.
//!
//! Wraps the signed-request and handshake primitives of [`openleash`] in
//! calls against a running service:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`OpenLeashClient::request_challenge`] | `POST /v1/agents/registration-challenge` |
//! | [`OpenLeashClient::complete_registration`] | `POST /v1/agents/register` |
//! | [`OpenLeashClient::authorize`] | `POST /v1/authorize` |
//! | [`OpenLeashClient::verify_proof_online`] | `POST /v1/verify-proof` |
//! | [`OpenLeashClient::public_keys`] | `GET /v1/public-keys` |
//! | [`OpenLeashClient::health`] | `GET /v1/health` |
//!
//! Non-success statuses surface as [`openleash::Error::Transport`] with the
//! raw response body; [`openleash::Error::api_error`] extracts the service's
//! error code from it.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod transport;

pub use client::{HEALTH_PATH, HealthStatus, OpenLeashClient, PUBLIC_KEYS_PATH, VERIFY_PROOF_PATH};
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, ENV_BASE_URL, ENV_TIMEOUT_SECS};
