//! Resource adapters for the data services control plane
//!
//! Each adapter implements [`declarative::ResourceAdapter`] for one kind:
//! - [`host::HostAdapter`] - host initiators
//! - [`host_group::HostGroupAdapter`] - host initiator groups
//! - [`volume::VolumeAdapter`] - volumes of a device-type1 system
//! - [`volume_set::VolumeSetAdapter`] - application sets of a device-type1 system
//!
//! All of them share a [`Session`], which also serves as the task fetcher.

pub mod host;
pub mod host_group;
pub mod volume;
pub mod volume_set;

use anyhow::{Context, Result, bail};
use declarative::{Observed, TaskFetcher, TaskPoller};
use dsclient::{Client, name_filter};
use serde_json::Value;

/// Path prefix for device-type1 storage systems.
pub const DEVICE_TYPE1_PATH: &str = "/api/v1/storage-systems/device-type1";

/// An authenticated control-plane client shared by the adapters.
pub struct Session {
    client: Client,
}

impl Session {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Find a resource in `collection` by id, else by `name_field eq name`.
    ///
    /// A 404 on the id lookup means absent.
    pub fn find(
        &self,
        collection: &str,
        name_field: &str,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<Value>> {
        if let Some(id) = id {
            let path = format!("{}/{}", collection, id);
            let found = self
                .client
                .get_optional(&path)
                .with_context(|| format!("GET {}", path))?;
            return Ok(found.into_iter().collect());
        }

        let Some(name) = name else {
            return Ok(Vec::new());
        };
        let query = [("filter".to_string(), name_filter(name_field, name))];
        self.client
            .list(collection, &query)
            .with_context(|| format!("GET {}", collection))
    }

    /// Delete every snapshot under `snapshots_path`, waiting for each task.
    pub fn delete_snapshots(&self, snapshots_path: &str, poller: &TaskPoller<'_>) -> Result<usize> {
        let snapshots = self
            .client
            .list(snapshots_path, &[])
            .with_context(|| format!("GET {}", snapshots_path))?;

        let mut deleted = 0;
        for snapshot in &snapshots {
            let Some(id) = snapshot.get("id").and_then(Value::as_str) else {
                log::warn!("Skipping snapshot without id under {}", snapshots_path);
                continue;
            };
            let path = format!("{}/{}", snapshots_path, id);
            log::debug!("Deleting snapshot {}", path);
            let descriptor = self
                .client
                .delete(&path)
                .with_context(|| format!("DELETE {}", path))?;
            self.wait(poller, descriptor, &format!("delete snapshot {}", id))?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Await a preparatory task, failing if it does not succeed.
    pub fn wait(&self, poller: &TaskPoller<'_>, descriptor: Value, what: &str) -> Result<()> {
        let result = poller.await_task(descriptor)?;
        if result.error {
            bail!("{} failed: {}", what, result.message);
        }
        Ok(())
    }
}

impl TaskFetcher for Session {
    fn fetch_task(&self, locator: &str) -> Result<Value> {
        Ok(self.client.task(locator)?)
    }
}

/// Id of an observed resource.
pub fn require_id(observed: &Observed) -> Result<String> {
    observed.id().context("observed resource has no id")
}

/// Ids of the objects in `observed[field]`.
pub fn ids_of(observed: &Observed, field: &str) -> Vec<String> {
    observed
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}
