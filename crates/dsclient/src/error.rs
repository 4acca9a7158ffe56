//! Error types for control-plane requests.
//!
//! Errors are categorized so callers can tell transient transport trouble
//! apart from problems that will not go away on a re-run (bad credentials,
//! missing resources, malformed payloads).

use std::fmt;

/// Result type alias for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, timeout or 5xx responses (transient, retryable).
    Network,
    /// Token acquisition failed or the token was rejected.
    Auth,
    /// The addressed resource does not exist.
    NotFound,
    /// The request was rejected as invalid (4xx other than 401/403/404).
    Rejected,
    /// The response body could not be decoded.
    Format,
    /// Credentials or endpoints are missing.
    Configuration,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Resource not found",
            Self::Rejected => "Request rejected",
            Self::Format => "Invalid response format",
            Self::Configuration => "Missing configuration",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check connectivity to the control plane and try again",
            Self::Auth => "Verify the client id and client secret",
            Self::NotFound => "Verify the resource id or name",
            Self::Rejected => "Check the request fields against the API schema",
            Self::Format => "The control plane returned an unexpected payload",
            Self::Configuration => {
                "Set GREENLAKE_HOST, GREENLAKE_CLIENT_ID and GREENLAKE_CLIENT_SECRET"
            }
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the control plane.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed or returned a non-2xx status.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message, including the response body when there is one.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The token endpoint refused the client credentials.
    #[error("token request failed: {message}")]
    Auth {
        /// Error message from the token endpoint.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// A mandatory credential or endpoint is missing.
    #[error("missing mandatory setting: {0}")]
    MissingSetting(&'static str),

    /// Response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// HTTP status attached to this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } | Self::Auth { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the error is a 404 from the control plane.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::HttpError { status, .. } => match status {
                None => ErrorCategory::Network,
                Some(401 | 403) => ErrorCategory::Auth,
                Some(404) => ErrorCategory::NotFound,
                Some(code) if *code >= 500 => ErrorCategory::Network,
                Some(_) => ErrorCategory::Rejected,
            },
            Error::Auth { .. } => ErrorCategory::Auth,
            Error::MissingSetting(_) => ErrorCategory::Configuration,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Rejected.is_retryable());
        assert!(!ErrorCategory::Format.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
        assert!(!ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_http_status_categories() {
        assert_eq!(
            Error::http("down", Some(503)).category(),
            ErrorCategory::Network
        );
        assert_eq!(
            Error::http("no route", None).category(),
            ErrorCategory::Network
        );
        assert_eq!(
            Error::http("denied", Some(401)).category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            Error::http("gone", Some(404)).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::http("bad field", Some(422)).category(),
            ErrorCategory::Rejected
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::http("gone", Some(404)).is_not_found());
        assert!(!Error::http("bad", Some(400)).is_not_found());
        assert!(!Error::Other("x".to_string()).is_not_found());
    }

    #[test]
    fn test_missing_setting_display() {
        let err = Error::MissingSetting("client_id");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_error_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse.into();
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[test]
    fn test_category_advice_not_empty() {
        assert!(!ErrorCategory::Network.advice().is_empty());
        assert!(!ErrorCategory::Configuration.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Auth).contains("Authentication"));
    }
}
