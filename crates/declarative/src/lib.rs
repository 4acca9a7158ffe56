//! # Declarative
//!
//! Declarative reconciliation of control-plane resources.
//!
//! An operator declares the desired configuration of a resource; this crate
//! decides whether the live resource already matches and, if not, issues the
//! mutation and waits for the asynchronous task it starts. Every operation is
//! safe to re-run.
//!
//! ## Core Concepts
//!
//! - **compare**: structural equivalence of JSON resources, ignoring key
//!   order, list order and number/string typing
//! - **TaskPoller**: drives a task descriptor to a terminal [`TaskResult`]
//! - **ResourceAdapter**: REST calls and [`ResourceSchema`] for one resource kind
//! - **Driver**: look up, plan, mutate, await, refresh, report
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{DesiredState, Driver, Operation, PollOptions, TaskPoller};
//!
//! let poller = TaskPoller::new(&session).with_options(PollOptions::default());
//! let driver = Driver::new(&host_adapter, poller);
//!
//! let desired = DesiredState::from_data(data, "name");
//! let report = driver.reconcile(&desired, Operation::Present)?;
//! println!("{}", serde_json::to_string(&report)?);
//! ```
//!
//! ## Provider Traits
//!
//! - [`TaskFetcher`]: fetches task descriptors by locator
//! - [`PollObserver`]: receives poll progress updates
//!
//! This allows the crate to be used without hard dependencies on a
//! specific HTTP client or UI.

pub mod compare;
pub mod context;
pub mod diff;
pub mod driver;
pub mod error;
pub mod resource;
pub mod task;
pub mod types;

// Re-export main types at crate root
pub use compare::{Difference, PathSegment, Reason};
pub use context::{NoProgress, PollObserver, TaskFetcher};
pub use diff::{CollectionDelta, UpdatePlan, plan_update};
pub use driver::Driver;
pub use error::{Error, Result};
pub use resource::{CollectionChange, CollectionRule, Messages, ResourceAdapter, ResourceSchema};
pub use task::{PollOptions, Task, TaskPoller, TaskResult, TaskStatus, await_task};
pub use types::{ApplyResult, DesiredState, DiffOutcome, Observed, Operation, Report};
