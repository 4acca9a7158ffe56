//! HTTP backend over `ureq`.
//!
//! Every request carries the bearer token obtained at construction time.
//! Non-2xx responses are turned into [`Error::HttpError`] with the status
//! code and the response body, so the caller sees what the control plane
//! objected to.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{DEFAULT_TIMEOUT, Method};
use serde_json::Value;
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

/// HTTP backend for the control-plane REST API.
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Control-plane base URL.
    host: String,
    /// Bearer token.
    access_token: String,
}

impl HttpBackend {
    /// Create a backend for `host` authenticating with `access_token`.
    #[must_use]
    pub fn new(host: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_timeout(host, access_token, DEFAULT_TIMEOUT)
    }

    /// Create a backend with a custom per-request timeout.
    #[must_use]
    pub fn with_timeout(
        host: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            agent: agent(timeout),
            host: host.into(),
            access_token: access_token.into(),
        }
    }

    /// Get the control-plane base URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build the absolute URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl Backend for HttpBackend {
    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(path);
        log::debug!("{} {}", method, url);

        let empty = Value::Object(serde_json::Map::new());
        let response = match method {
            Method::Get => {
                let mut req = self
                    .agent
                    .get(&url)
                    .header("Authorization", self.bearer())
                    .header("Accept", "application/json");
                for (key, value) in query {
                    req = req.query(key, value);
                }
                req.call()?
            }
            Method::Delete => {
                let mut req = self
                    .agent
                    .delete(&url)
                    .header("Authorization", self.bearer())
                    .header("Accept", "application/json");
                for (key, value) in query {
                    req = req.query(key, value);
                }
                req.call()?
            }
            Method::Post => {
                let mut req = self
                    .agent
                    .post(&url)
                    .header("Authorization", self.bearer())
                    .header("Accept", "application/json");
                for (key, value) in query {
                    req = req.query(key, value);
                }
                req.send_json(body.unwrap_or(&empty))?
            }
            Method::Put => {
                let mut req = self
                    .agent
                    .put(&url)
                    .header("Authorization", self.bearer())
                    .header("Accept", "application/json");
                for (key, value) in query {
                    req = req.query(key, value);
                }
                req.send_json(body.unwrap_or(&empty))?
            }
        };

        read_json(response, method, &url)
    }
}

/// Agent that reports HTTP error statuses as responses, not errors.
pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Read a response body as JSON, mapping non-2xx statuses to errors.
pub(crate) fn read_json(mut response: Response<Body>, method: Method, url: &str) -> Result<Value> {
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::http(format!("{} {}: {}", method, url, e), Some(status)))?;

    log::trace!("{} {} -> {} {}", method, url, status, text);

    if !(200..300).contains(&status) {
        return Err(Error::http(
            format!("{} {} returned HTTP {}: {}", method, url, status, text.trim()),
            Some(status),
        ));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&text)?)
}
