//! OAuth2 client-credentials token acquisition.

use crate::backend::http::agent;
use crate::error::{Error, Result};
use crate::types::{AccessToken, Credentials};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;

/// Build the `Authorization: Basic` value for the token endpoint.
#[must_use]
pub fn basic_auth(client_id: &str, client_secret: &str) -> String {
    let raw = format!("{}:{}", client_id, client_secret);
    format!("Basic {}", STANDARD.encode(raw))
}

/// Exchange client credentials for a bearer token.
///
/// Every failure, transport or status, is reported as [`Error::Auth`].
pub fn fetch_access_token(
    token_url: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<AccessToken> {
    credentials.validate()?;
    log::debug!("Requesting access token from {}", token_url);

    let mut response = agent(timeout)
        .post(token_url)
        .header(
            "Authorization",
            basic_auth(&credentials.client_id, &credentials.client_secret),
        )
        .header("Accept", "application/json")
        .send_form([("grant_type", "client_credentials")])
        .map_err(|e| Error::Auth {
            message: e.to_string(),
            status: None,
        })?;

    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::Auth {
            message: e.to_string(),
            status: Some(status),
        })?;

    if !(200..300).contains(&status) {
        return Err(Error::Auth {
            message: format!("HTTP {}: {}", status, text.trim()),
            status: Some(status),
        });
    }

    parse_token(&text)
}

/// Decode a token endpoint response.
pub(crate) fn parse_token(text: &str) -> Result<AccessToken> {
    let token: AccessToken = serde_json::from_str(text).map_err(|e| Error::Auth {
        message: format!("malformed token response: {}", e),
        status: None,
    })?;

    if token.access_token.is_empty() {
        return Err(Error::Auth {
            message: "token response carried an empty access_token".to_string(),
            status: None,
        });
    }

    Ok(token)
}
