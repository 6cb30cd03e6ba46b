//! Client configuration.

use std::time::Duration;

use openleash::{Error, Result};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

/// Overall timeout for one request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding the base URL.
pub const ENV_BASE_URL: &str = "OPENLEASH_URL";

/// Environment variable overriding the timeout, in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "OPENLEASH_TIMEOUT_SECS";

/// Configuration for [`OpenLeashClient`](crate::OpenLeashClient).
///
/// The base URL is validated when the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, e.g. `https://openleash.example.com`.
    ///
    /// Default: `http://127.0.0.1:8787`
    pub base_url: String,

    /// Overall timeout for one request, connection included.
    ///
    /// Default: 10 seconds
    pub timeout: Duration,

    /// `User-Agent` sent with every request.
    ///
    /// Default: `openleash-client/<version>`
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("openleash-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from defaults and applies `OPENLEASH_URL` and
    /// `OPENLEASH_TIMEOUT_SECS` when set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the timeout is not a whole number of
    /// seconds.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = secs.trim().parse::<u64>().map_err(|e| Error::Config {
                reason: format!("{ENV_TIMEOUT_SECS}='{secs}' is not a number of seconds: {e}"),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
