//! Provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific transport or UI.

use crate::task::{TaskResult, TaskStatus};
use anyhow::Result;
use serde_json::Value;

/// Source of task descriptors.
///
/// Implement this trait over the control-plane client. Closures work too:
///
/// ```
/// use declarative::TaskFetcher;
/// use serde_json::json;
///
/// let fetcher = |locator: &str| {
///     Ok::<_, anyhow::Error>(json!({"taskUri": locator, "status": "SUCCEEDED"}))
/// };
/// assert_eq!(fetcher.fetch_task("t1").unwrap()["status"], "SUCCEEDED");
/// ```
pub trait TaskFetcher {
    /// Fetch the task identified by `locator` (task id or task path).
    fn fetch_task(&self, locator: &str) -> Result<Value>;
}

impl<F> TaskFetcher for F
where
    F: Fn(&str) -> Result<Value>,
{
    fn fetch_task(&self, locator: &str) -> Result<Value> {
        self(locator)
    }
}

/// Progress callback for task polling
///
/// Implement this trait to receive progress updates while a task is awaited.
pub trait PollObserver {
    /// Called after each re-fetch of the task.
    fn on_poll(&self, attempt: u32, status: &TaskStatus);

    /// Called once the task has been resolved.
    fn on_complete(&self, result: &TaskResult);
}

/// No-op observer
pub struct NoProgress;

impl PollObserver for NoProgress {
    fn on_poll(&self, _attempt: u32, _status: &TaskStatus) {}
    fn on_complete(&self, _result: &TaskResult) {}
}
