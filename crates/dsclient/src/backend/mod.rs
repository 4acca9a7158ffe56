//! Backend trait and implementations for executing control-plane requests.
//!
//! [`http::HttpBackend`] talks to the real REST API. [`MockBackend`] keeps
//! canned responses in memory and records every call, so reconciliation can
//! be tested without network access:
//!
//! ```
//! use dsclient::backend::{Backend, MockBackend};
//! use dsclient::Method;
//! use serde_json::json;
//!
//! let mock = MockBackend::new();
//! mock.on(Method::Get, "/api/v1/volumes", json!({"items": []}));
//!
//! let body = mock.request(Method::Get, "/api/v1/volumes", &[], None).unwrap();
//! assert_eq!(body["items"], json!([]));
//! assert_eq!(mock.calls().len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Backend trait for executing requests.
///
/// Paths are relative to the control-plane host (`/api/v1/...`). A response
/// without a body is returned as `Value::Null`.
pub trait Backend: Send + Sync {
    /// Execute a request and decode the JSON response.
    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value>;
}

/// A request recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// HTTP verb.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl Call {
    /// Value of a query parameter.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Status { status: u16, body: String },
}

type Routes = HashMap<(Method, String), VecDeque<Reply>>;

/// In-memory backend for tests.
///
/// Responses are queued per `(method, path)`. Each request consumes the
/// front of its queue; the last queued response is sticky and keeps being
/// returned. Requests without a route fail with HTTP 404.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    routes: Arc<Mutex<Routes>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response for a route.
    pub fn on(&self, method: Method, path: impl Into<String>, response: Value) -> &Self {
        self.push(method, path.into(), Reply::Json(response));
        self
    }

    /// Queue an error status for a route.
    pub fn on_status(
        &self,
        method: Method,
        path: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> &Self {
        self.push(
            method,
            path.into(),
            Reply::Status {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// All calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls made with the given verb.
    #[must_use]
    pub fn calls_with(&self, method: Method) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Number of mutating calls (POST/PUT/DELETE).
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method.is_mutation())
            .count()
    }

    fn push(&self, method: Method, path: String, reply: Reply) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.entry((method, path)).or_default().push_back(reply);
    }

    fn next_reply(&self, method: Method, path: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Backend for MockBackend {
    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                method,
                path: path.to_string(),
                query: query.to_vec(),
                body: body.cloned(),
            });

        match self.next_reply(method, path) {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Status { status, body }) => Err(Error::http(
                format!("{} {} returned HTTP {}: {}", method, path, status, body),
                Some(status),
            )),
            None => Err(Error::http(
                format!("mock route not configured: {} {}", method, path),
                Some(404),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_backend_unrouted_is_not_found() {
        let mock = MockBackend::new();
        let err = mock
            .request(Method::Get, "/api/v1/volumes/1", &[], None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mock_backend_sequence_then_sticky() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/t", json!({"status": "RUNNING"}))
            .on(Method::Get, "/t", json!({"status": "SUCCEEDED"}));

        let first = mock.request(Method::Get, "/t", &[], None).unwrap();
        let second = mock.request(Method::Get, "/t", &[], None).unwrap();
        let third = mock.request(Method::Get, "/t", &[], None).unwrap();

        assert_eq!(first["status"], "RUNNING");
        assert_eq!(second["status"], "SUCCEEDED");
        assert_eq!(third["status"], "SUCCEEDED");
    }

    #[test]
    fn test_mock_backend_records_calls() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/api/v1/host-initiators", json!({}));

        let body = json!({"name": "host1"});
        let query = vec![("force".to_string(), "true".to_string())];
        mock.request(Method::Post, "/api/v1/host-initiators", &query, Some(&body))
            .unwrap();

        let calls = mock.calls_with(Method::Post);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, Some(body));
        assert_eq!(calls[0].query_param("force"), Some("true"));
        assert_eq!(mock.mutation_count(), 1);
    }

    #[test]
    fn test_mock_backend_status_reply() {
        let mock = MockBackend::new();
        mock.on_status(Method::Delete, "/api/v1/volumes/1", 409, "in use");

        let err = mock
            .request(Method::Delete, "/api/v1/volumes/1", &[], None)
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("in use"));
    }

    #[test]
    fn test_mock_backend_clones_share_state() {
        let mock = MockBackend::new();
        let handle = mock.clone();
        mock.on(Method::Get, "/x", json!(1));

        handle.request(Method::Get, "/x", &[], None).unwrap();
        assert_eq!(mock.calls().len(), 1);
    }
}
