//! # dsclient
//!
//! Blocking REST client for the GreenLake data services control plane.
//!
//! This crate provides:
//! - OAuth2 client-credentials login against the platform token endpoint
//! - Thin JSON verbs (`get`, `post`, `put`, `delete`) over a pluggable [`Backend`]
//! - Paged list decoding and task lookup by locator
//!
//! ## Example
//!
//! ```no_run
//! use dsclient::{Client, ConnectOptions, Credentials};
//!
//! let creds = Credentials::new("https://us1.data.cloud.hpe.com", "id", "secret");
//! let client = Client::connect(&creds, &ConnectOptions::default()).unwrap();
//!
//! let volumes = client.list("/api/v1/volumes", &[]).unwrap();
//! println!("{} volumes", volumes.len());
//! ```
//!
//! Tests swap in [`MockBackend`]:
//!
//! ```
//! use dsclient::{Client, Method, MockBackend};
//! use serde_json::json;
//!
//! let mock = MockBackend::new();
//! mock.on(Method::Get, "/api/v1/tasks/t1", json!({"status": "SUCCEEDED"}));
//!
//! let client = Client::with_backend(Box::new(mock));
//! assert_eq!(client.task("t1").unwrap()["status"], "SUCCEEDED");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod backend;
pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{
    AccessToken, ConnectOptions, Credentials, DEFAULT_TOKEN_URL, ListResponse, Method, name_filter,
};

use backend::Backend;
pub use backend::MockBackend;
use backend::http::HttpBackend;
use serde_json::Value;

/// Path of the task collection.
pub const TASKS_PATH: &str = "/api/v1/tasks";

/// High-level client for control-plane requests.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Log in with client credentials and return an HTTP-backed client.
    pub fn connect(credentials: &Credentials, options: &ConnectOptions) -> Result<Self> {
        let token = auth::fetch_access_token(&options.token_url, credentials, options.timeout)?;
        log::debug!("Connected to {}", credentials.host);
        Ok(Self {
            backend: Box::new(HttpBackend::with_timeout(
                credentials.host.clone(),
                token.access_token,
                options.timeout,
            )),
        })
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// GET a path.
    pub fn get(&self, path: &str) -> Result<Value> {
        self.backend.request(Method::Get, path, &[], None)
    }

    /// GET a path with query parameters.
    pub fn get_with(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        self.backend.request(Method::Get, path, query, None)
    }

    /// GET a path, mapping 404 to `None`.
    pub fn get_optional(&self, path: &str) -> Result<Option<Value>> {
        match self.get(path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// POST a JSON body.
    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.backend.request(Method::Post, path, &[], Some(body))
    }

    /// PUT a JSON body.
    pub fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.backend.request(Method::Put, path, &[], Some(body))
    }

    /// DELETE a path.
    pub fn delete(&self, path: &str) -> Result<Value> {
        self.backend.request(Method::Delete, path, &[], None)
    }

    /// DELETE a path with query parameters.
    pub fn delete_with(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        self.backend.request(Method::Delete, path, query, None)
    }

    // =========================================================================
    // Collections and tasks
    // =========================================================================

    /// List a collection, returning its `items`.
    pub fn list(&self, path: &str, query: &[(String, String)]) -> Result<Vec<Value>> {
        let body = self.get_with(path, query)?;
        Ok(ListResponse::from_value(body)?.items)
    }

    /// Fetch a task by locator.
    ///
    /// A locator starting with `/` is used as the path; anything else is
    /// treated as a task id.
    pub fn task(&self, locator: &str) -> Result<Value> {
        self.get(&task_path(locator))
    }
}

/// Path for a task locator.
#[must_use]
pub fn task_path(locator: &str) -> String {
    if locator.starts_with('/') {
        locator.to_string()
    } else {
        format!("{}/{}", TASKS_PATH, locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_path() {
        assert_eq!(task_path("abc"), "/api/v1/tasks/abc");
        assert_eq!(task_path("/api/v1/tasks/abc"), "/api/v1/tasks/abc");
    }

    #[test]
    fn test_client_list_items() {
        let mock = MockBackend::new();
        mock.on(
            Method::Get,
            "/api/v1/volumes",
            json!({"items": [{"id": "v1"}], "count": 1, "total": 1}),
        );
        let client = Client::with_backend(Box::new(mock.clone()));

        let query = vec![("filter".to_string(), name_filter("name", "vol1"))];
        let items = client.list("/api/v1/volumes", &query).unwrap();

        assert_eq!(items, vec![json!({"id": "v1"})]);
        assert_eq!(
            mock.calls()[0].query_param("filter"),
            Some("name eq 'vol1'")
        );
    }

    #[test]
    fn test_client_get_optional_maps_not_found() {
        let mock = MockBackend::new();
        let client = Client::with_backend(Box::new(mock));
        assert_eq!(client.get_optional("/api/v1/volumes/x").unwrap(), None);
    }

    #[test]
    fn test_client_get_optional_propagates_other_errors() {
        let mock = MockBackend::new();
        mock.on_status(Method::Get, "/api/v1/volumes/x", 500, "boom");
        let client = Client::with_backend(Box::new(mock));
        assert!(client.get_optional("/api/v1/volumes/x").is_err());
    }

    #[test]
    fn test_client_post_sends_body() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/api/v1/host-initiators", json!({"taskUri": "/api/v1/tasks/t1"}));
        let client = Client::with_backend(Box::new(mock.clone()));

        let reply = client
            .post("/api/v1/host-initiators", &json!({"name": "h1"}))
            .unwrap();
        assert_eq!(reply["taskUri"], "/api/v1/tasks/t1");
        assert_eq!(mock.calls()[0].body, Some(json!({"name": "h1"})));
    }
}
