//! Asynchronous task completion
//!
//! Mutations on the control plane return a task descriptor instead of the
//! finished resource. [`TaskPoller`] re-fetches the task until it reaches a
//! terminal status, follows one level of child-task delegation and returns a
//! [`TaskResult`]. A failed task is not an `Err`; it is a result with
//! `error = true`. Errors are reserved for the poll loop itself (timeout,
//! cancellation, missing locator, transport).

use crate::compare::is_truthy;
use crate::context::{NoProgress, PollObserver, TaskFetcher};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Default delay between task re-fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default maximum number of re-fetches (one hour at the default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 720;

const SUCCEEDED: &str = "SUCCEEDED";

/// Lifecycle status of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Initialized,
    Submitted,
    Running,
    Succeeded,
    Failed,
    Timedout,
    Paused,
    /// Any other value, or no status at all.
    Unknown(Option<String>),
}

impl TaskStatus {
    /// Parse the status string used by the API.
    #[must_use]
    pub fn from_api(status: Option<&str>) -> Self {
        let Some(raw) = status else {
            return Self::Unknown(None);
        };
        match raw.to_ascii_uppercase().as_str() {
            "INITIALIZED" => Self::Initialized,
            "SUBMITTED" => Self::Submitted,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "TIMEDOUT" => Self::Timedout,
            "PAUSED" => Self::Paused,
            _ => Self::Unknown(Some(raw.to_string())),
        }
    }

    /// Still in flight; keep polling.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Initialized | Self::Submitted | Self::Running)
    }

    /// Terminal failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Timedout | Self::Paused)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => f.write_str("INITIALIZED"),
            Self::Submitted => f.write_str("SUBMITTED"),
            Self::Running => f.write_str("RUNNING"),
            Self::Succeeded => f.write_str("SUCCEEDED"),
            Self::Failed => f.write_str("FAILED"),
            Self::Timedout => f.write_str("TIMEDOUT"),
            Self::Paused => f.write_str("PAUSED"),
            Self::Unknown(Some(raw)) => f.write_str(raw),
            Self::Unknown(None) => f.write_str("UNKNOWN"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChildTask {
    #[serde(default, alias = "resourceUri")]
    resource_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskFields {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    task_uri: Option<String>,
    #[serde(default, rename = "taskUri")]
    task_uri_camel: Option<String>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default, alias = "associatedResources")]
    associated_resources: Option<Value>,
    #[serde(default, alias = "childTasks")]
    child_tasks: Option<Vec<ChildTask>>,
}

/// A task descriptor.
///
/// The typed fields drive polling; `raw` keeps the descriptor as received so
/// it can be reported verbatim.
#[derive(Debug, Clone)]
pub struct Task {
    pub status: TaskStatus,
    /// Separate `state` field some endpoints use alongside `status`.
    pub state: Option<String>,
    /// `task_uri`, else `taskUri`.
    pub locator: Option<String>,
    pub message: Option<String>,
    pub associated_resources: Option<Value>,
    /// `resource_uri` of each child task.
    pub child_uris: Vec<String>,
    pub raw: Value,
}

impl Task {
    /// Decode a task descriptor fetched from the task endpoint.
    pub fn from_value(value: Value) -> Result<Self> {
        let value = if value.is_null() { json!({}) } else { value };
        if !value.is_object() {
            return Err(Error::MalformedTask(format!("expected an object, got {}", value)));
        }
        let fields: TaskFields = serde_json::from_value(value.clone())
            .map_err(|e| Error::MalformedTask(e.to_string()))?;

        let message = fields.message.and_then(|m| match m {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Ok(Self {
            status: TaskStatus::from_api(fields.status.as_deref()),
            state: fields.state,
            locator: fields.task_uri.or(fields.task_uri_camel),
            message,
            associated_resources: fields.associated_resources,
            child_uris: fields
                .child_tasks
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| c.resource_uri)
                .collect(),
            raw: value,
        })
    }

    /// Decode the descriptor returned by a mutation call.
    ///
    /// An accepted mutation often answers with only a locator; such a
    /// descriptor is treated as `SUBMITTED` so it gets polled.
    pub fn from_response(value: Value) -> Result<Self> {
        let mut task = Self::from_value(value)?;
        if task.locator.is_some() && task.status == TaskStatus::Unknown(None) {
            task.status = TaskStatus::Submitted;
        }
        Ok(task)
    }

    /// Fresh descriptor for a delegated child task.
    #[must_use]
    pub fn child(id: &str) -> Self {
        Self {
            status: TaskStatus::Initialized,
            state: None,
            locator: Some(id.to_string()),
            message: Some(String::new()),
            associated_resources: None,
            child_uris: Vec::new(),
            raw: json!({"status": "INITIALIZED", "taskUri": id, "message": ""}),
        }
    }

    /// Whether the separate `state` field reports success.
    #[must_use]
    pub fn state_succeeded(&self) -> bool {
        self.state.as_deref() == Some(SUCCEEDED)
    }

    /// Id of the first child task: last segment of its `resource_uri`.
    #[must_use]
    pub fn first_child_id(&self) -> Option<&str> {
        self.child_uris
            .first()
            .and_then(|uri| uri.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
    }
}

/// Outcome of an awaited task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub error: bool,
    pub message: String,
    pub response: Value,
}

/// Bounds for the poll loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay before each re-fetch.
    pub interval: Duration,
    /// Maximum number of re-fetches per task.
    pub max_attempts: u32,
    /// Overall time limit per task.
    pub deadline: Option<Duration>,
    /// Raised from elsewhere to abandon polling.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            deadline: None,
            cancel: None,
        }
    }
}

impl PollOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay between re-fetches.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the maximum number of re-fetches.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set an overall time limit.
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation flag.
    #[must_use]
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Drives task descriptors to a terminal outcome.
pub struct TaskPoller<'a> {
    fetcher: &'a dyn TaskFetcher,
    options: PollOptions,
    observer: &'a dyn PollObserver,
}

impl<'a> TaskPoller<'a> {
    /// Create a poller with default options and no observer.
    pub fn new(fetcher: &'a dyn TaskFetcher) -> Self {
        Self {
            fetcher,
            options: PollOptions::default(),
            observer: &NoProgress,
        }
    }

    /// Replace the poll bounds.
    #[must_use]
    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn PollObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Current poll bounds.
    #[must_use]
    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Await a task descriptor returned by a mutation call.
    pub fn await_task(&self, descriptor: Value) -> Result<TaskResult> {
        let task = Task::from_response(descriptor)?;
        let (resolved, mut error) = self.drive(task)?;

        let payload = if let Some(resources) = resolved
            .associated_resources
            .as_ref()
            .filter(|r| is_truthy(r))
        {
            resources.clone()
        } else if let Some(child_id) = resolved.first_child_id() {
            log::debug!("Following child task {}", child_id);
            let (child, child_error) = self.drive(Task::child(child_id))?;
            error = child_error;
            child.raw
        } else {
            resolved.raw.clone()
        };

        if payload
            .get("response")
            .and_then(|r| r.get("state"))
            .and_then(Value::as_str)
            == Some(SUCCEEDED)
        {
            error = false;
        }

        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| resolved.message.clone())
            .unwrap_or_default();

        let result = TaskResult {
            error,
            message,
            response: payload,
        };
        self.observer.on_complete(&result);
        Ok(result)
    }

    /// Poll until the task leaves the pending states.
    ///
    /// Returns the last descriptor seen and whether it ended in failure.
    fn drive(&self, mut task: Task) -> Result<(Task, bool)> {
        let started = Instant::now();
        let mut attempts = 0u32;

        while task.status.is_pending() {
            if self.options.cancelled() {
                return Err(Error::Cancelled);
            }
            if attempts >= self.options.max_attempts
                || self
                    .options
                    .deadline
                    .is_some_and(|limit| started.elapsed() >= limit)
            {
                return Err(Error::Timeout {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }
            let locator = task.locator.clone().ok_or(Error::MissingTaskLocator)?;

            self.pause()?;
            attempts += 1;

            let value = self
                .fetcher
                .fetch_task(&locator)
                .map_err(|e| Error::adapter(format!("fetch task {}", locator), e))?;
            let mut next = Task::from_value(value)?;
            if next.locator.is_none() {
                next.locator = Some(locator);
            }
            log::debug!("Task {:?} status {} (poll {})", next.locator, next.status, attempts);
            self.observer.on_poll(attempts, &next.status);
            task = next;

            if task.status.is_failure() {
                return Ok((task, true));
            }
            if task.state_succeeded() {
                break;
            }
        }

        Ok((task, false))
    }

    /// Sleep for one interval, waking early if cancelled.
    fn pause(&self) -> Result<()> {
        const SLICE: Duration = Duration::from_millis(100);
        let mut remaining = self.options.interval;
        while !remaining.is_zero() {
            if self.options.cancelled() {
                return Err(Error::Cancelled);
            }
            let step = remaining.min(SLICE);
            thread::sleep(step);
            remaining -= step;
        }
        if self.options.cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Await `descriptor` with the given bounds.
pub fn await_task(
    fetcher: &dyn TaskFetcher,
    descriptor: Value,
    options: PollOptions,
) -> Result<TaskResult> {
    TaskPoller::new(fetcher).with_options(options).await_task(descriptor)
}
