//! Receiver-side validation of signed requests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, DurationRound, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::hashing::sha256_hex;
use crate::keys::VerifyingKey;
use crate::signing::{SignedHeaders, verify_request_signature};
use crate::timestamp::parse_timestamp;

/// Replay window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Maximum distance between a request timestamp and the receiver clock.
    pub clock_skew: Duration,
    /// How long a seen nonce is remembered.
    pub nonce_ttl: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            clock_skew: Duration::from_secs(120),
            nonce_ttl: Duration::from_secs(600),
        }
    }
}

impl ReplayConfig {
    /// Sets the accepted clock skew.
    #[must_use]
    pub const fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Sets how long nonces are remembered.
    #[must_use]
    pub const fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }
}

/// Rejects stale, replayed, tampered or forged requests.
///
/// Seen nonces are kept per agent and dropped once older than
/// [`ReplayConfig::nonce_ttl`]. Purging happens during [`check`](Self::check).
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use openleash::{ReplayGuard, SigningKey, format_timestamp, sign_request};
///
/// let key = SigningKey::generate();
/// let now = Utc::now();
/// let body = br#"{"action_type":"purchase"}"#;
/// let headers = sign_request("POST", "/v1/authorize", &format_timestamp(now), "n-1", body, &key)
///     .unwrap();
///
/// let guard = ReplayGuard::default();
/// let public = key.verifying_key();
/// assert!(guard.check("agent-1", "POST", "/v1/authorize", &headers, body, &public, now).is_ok());
/// assert!(guard.check("agent-1", "POST", "/v1/authorize", &headers, body, &public, now).is_err());
/// ```
#[derive(Debug, Default)]
pub struct ReplayGuard {
    config: ReplayConfig,
    seen: Mutex<HashMap<String, HashMap<String, DateTime<Utc>>>>,
}

impl ReplayGuard {
    /// Creates a guard with the given settings.
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the guard's settings.
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Validates one request received at `now`.
    ///
    /// Checks run in order: timestamp window, nonce freshness, body digest,
    /// signature. The nonce is recorded only when every check passes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampSkew`], [`Error::NonceReplay`],
    /// [`Error::BodyHashMismatch`] or [`Error::InvalidSignature`].
    #[allow(clippy::too_many_arguments)]
    pub fn check(
        &self,
        agent_id: &str,
        method: &str,
        path: &str,
        headers: &SignedHeaders,
        body: &[u8],
        public_key: &VerifyingKey,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.check_timestamp(&headers.timestamp, now)?;

        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.purge(&mut seen, now);

        if seen
            .get(agent_id)
            .is_some_and(|nonces| nonces.contains_key(&headers.nonce))
        {
            debug!(agent_id, nonce = %headers.nonce, "rejecting replayed nonce");
            return Err(Error::NonceReplay {
                agent_id: agent_id.to_string(),
                nonce: headers.nonce.clone(),
            });
        }

        if sha256_hex(body) != headers.body_sha256 {
            return Err(Error::BodyHashMismatch);
        }

        if !verify_request_signature(
            method,
            path,
            &headers.timestamp,
            &headers.nonce,
            &headers.body_sha256,
            &headers.signature,
            public_key,
        ) {
            return Err(Error::InvalidSignature);
        }

        seen.entry(agent_id.to_string())
            .or_default()
            .insert(headers.nonce.clone(), now);
        Ok(())
    }

    /// Number of nonces currently remembered.
    #[must_use]
    pub fn tracked_nonces(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    fn check_timestamp(&self, timestamp: &str, now: DateTime<Utc>) -> Result<()> {
        let skew = chrono::Duration::from_std(self.config.clock_skew)
            .unwrap_or(chrono::Duration::MAX);
        // Wire timestamps carry milliseconds only.
        let now = now
            .duration_trunc(chrono::Duration::milliseconds(1))
            .unwrap_or(now);
        let within = parse_timestamp(timestamp)
            .and_then(|ts| ts.signed_duration_since(now).abs().le(&skew).then_some(()));

        within.ok_or_else(|| Error::TimestampSkew {
            timestamp: timestamp.to_string(),
        })
    }

    fn purge(
        &self,
        seen: &mut HashMap<String, HashMap<String, DateTime<Utc>>>,
        now: DateTime<Utc>,
    ) {
        let Ok(ttl) = chrono::Duration::from_std(self.config.nonce_ttl) else {
            return;
        };
        seen.retain(|_, nonces| {
            nonces.retain(|_, seen_at| now.signed_duration_since(*seen_at) <= ttl);
            !nonces.is_empty()
        });
    }
}
