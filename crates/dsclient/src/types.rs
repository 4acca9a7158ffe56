//! Core types shared by the client and its backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default OAuth2 token endpoint for the GreenLake platform.
pub const DEFAULT_TOKEN_URL: &str = "https://sso.common.cloud.hpe.com/as/token.oauth2";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP verbs used against the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read a resource or collection.
    Get,
    /// Create a resource or trigger an action.
    Post,
    /// Replace/edit a resource.
    Put,
    /// Remove a resource.
    Delete,
}

impl Method {
    /// Whether the verb mutates remote state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get)
    }

    /// Verb as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client credentials for the control plane.
///
/// `client_secret` is never printed by the `Debug` implementation.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Base URL of the control plane, e.g. `https://us1.data.cloud.hpe.com`.
    #[serde(default)]
    pub host: String,
    /// OAuth2 client id.
    #[serde(default)]
    pub client_id: String,
    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: String,
}

impl Credentials {
    /// Create a new set of credentials.
    pub fn new(
        host: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Fail with [`Error::MissingSetting`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::MissingSetting("host"));
        }
        if self.client_id.trim().is_empty() {
            return Err(Error::MissingSetting("client_id"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(Error::MissingSetting("client_secret"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Connection options beyond the credentials themselves.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ConnectOptions {
    /// Set the token endpoint.
    #[must_use]
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Access token returned by the token endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    /// Bearer token value.
    pub access_token: String,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Paged collection envelope returned by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    /// Items on this page.
    #[serde(default)]
    pub items: Vec<Value>,
    /// Number of items on this page.
    #[serde(default)]
    pub count: Option<u64>,
    /// Total number of matching items.
    #[serde(default)]
    pub total: Option<u64>,
    /// Offset of this page.
    #[serde(default)]
    pub offset: Option<u64>,
}

impl ListResponse {
    /// Decode a list envelope. A `null` body decodes as an empty list.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Build the `filter` expression selecting a resource by exact name.
///
/// Single quotes inside the name are doubled so they cannot terminate
/// the literal.
#[must_use]
pub fn name_filter(field: &str, name: &str) -> String {
    format!("{} eq '{}'", field, name.replace('\'', "''"))
}
