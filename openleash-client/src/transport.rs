//! JSON over blocking HTTP.

use openleash::{Error, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;

/// A configured HTTP agent bound to one service root.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    agent: ureq::Agent,
    base_url: Url,
}

impl Transport {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        Ok(Self { agent, base_url })
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an absolute API path (`/v1/...`) under the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config {
                reason: format!("cannot join '{path}' onto {}: {e}", self.base_url),
            })
    }

    pub(crate) fn post_json<R: DeserializeOwned>(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<R> {
        let url = self.endpoint(path)?;
        debug!(method = "POST", %url, bytes = body.len(), "sending request");

        let mut request = self.agent.post(url.as_str());
        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("content-type")) {
            request = request.set("Content-Type", "application/json");
        }
        for (name, value) in headers {
            request = request.set(name, value);
        }
        read_json(path, request.send_bytes(body))
    }

    pub(crate) fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = self.endpoint(path)?;
        debug!(method = "GET", %url, "sending request");
        read_json(path, self.agent.get(url.as_str()).call())
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| Error::Config {
        reason: format!("base URL '{raw}' is invalid: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(Error::Config {
            reason: format!("base URL '{raw}' must be an http:// or https:// URL"),
        });
    }
    // Keep a configured path prefix when joining endpoint paths.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn read_json<R: DeserializeOwned>(
    path: &str,
    response: std::result::Result<ureq::Response, ureq::Error>,
) -> Result<R> {
    match response {
        Ok(response) => {
            let text = response.into_string().map_err(|e| Error::Transport {
                status: None,
                body: format!("failed to read response body: {e}"),
            })?;
            serde_json::from_str(&text).map_err(|e| Error::Protocol {
                reason: format!("{path}: {e}"),
            })
        }
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_else(|e| {
                debug!(path, status, error = %e, "failed to read error body");
                String::new()
            });
            warn!(path, status, "service returned an error status");
            Err(Error::Transport {
                status: Some(status),
                body,
            })
        }
        Err(ureq::Error::Transport(e)) => {
            warn!(path, error = %e, "request failed");
            Err(Error::Transport {
                status: None,
                body: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> Transport {
        Transport::new(&ClientConfig::new().with_base_url(base)).unwrap()
    }

    #[test]
    fn joins_paths_at_root() {
        let t = transport("http://127.0.0.1:8787");
        assert_eq!(
            t.endpoint("/v1/authorize").unwrap().as_str(),
            "http://127.0.0.1:8787/v1/authorize"
        );
    }

    #[test]
    fn keeps_path_prefix() {
        let t = transport("https://gateway.example.com/openleash");
        assert_eq!(
            t.endpoint("/v1/public-keys").unwrap().as_str(),
            "https://gateway.example.com/openleash/v1/public-keys"
        );
        assert_eq!(t.base_url().path(), "/openleash/");
    }

    #[test]
    fn error_status_keeps_status_and_body() {
        let response = ureq::Response::new(503, "Service Unavailable", "maintenance").unwrap();

        let err =
            read_json::<serde_json::Value>("/v1/health", Err(ureq::Error::Status(503, response)))
                .unwrap_err();

        assert_eq!(
            err,
            Error::Transport {
                status: Some(503),
                body: "maintenance".into(),
            }
        );
    }

    #[test]
    fn error_status_with_empty_body() {
        let response = ureq::Response::new(500, "Internal Server Error", "").unwrap();

        let err =
            read_json::<serde_json::Value>("/v1/health", Err(ureq::Error::Status(500, response)))
                .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(err.api_error().is_none());
    }

    #[test]
    fn success_body_that_is_not_json_is_protocol_error() {
        let response = ureq::Response::new(200, "OK", "<html>").unwrap();

        let err = read_json::<serde_json::Value>("/v1/health", Ok(response)).unwrap_err();

        assert!(matches!(err, Error::Protocol { ref reason } if reason.starts_with("/v1/health")));
    }

    #[test]
    fn rejects_unusable_base_urls() {
        for base in ["not a url", "ftp://example.com", "mailto:ops@example.com"] {
            let err = Transport::new(&ClientConfig::new().with_base_url(base)).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{base}: {err}");
        }
    }
}
