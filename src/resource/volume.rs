//! Volumes on device-type1 storage systems
//!
//! Volumes are looked up through the global `/api/v1/volumes` collection but
//! mutated under their storage system. Deleting a volume first removes its
//! snapshots and unexports it from the host groups it is exported to.

use super::{DEVICE_TYPE1_PATH, Session, ids_of, require_id};
use anyhow::{Context, Result};
use declarative::{Messages, Observed, ResourceAdapter, ResourceSchema, TaskPoller};
use serde_json::{Map, Value, json};

pub const VOLUMES_PATH: &str = "/api/v1/volumes";

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "volume",
    facts_key: "volumes",
    name_field: "name",
    update_fields: &[
        "conversion_type",
        "name",
        "size_mib",
        "snapshot_alloc_warning",
        "user_alloc_warning",
        "user_cpg_name",
    ],
    collections: &[],
    aliases: &[("size_mib", "size_mi_b")],
    write_only: &[
        "snapshot_alloc_warning",
        "user_alloc_warning",
        "conversion_type",
        "user_cpg_name",
    ],
    overrides: &[],
    messages: Messages {
        created: "Volume resource created successfully",
        updated: "Volume resource updated",
        deleted: "Volume resource deleted successfully",
        already_present: "Volume resource exists with the same details",
        already_absent: "Resource already deleted",
        exported: "",
        unexported: "",
    },
};

pub struct VolumeAdapter<'a> {
    session: &'a Session,
    system_id: String,
}

impl<'a> VolumeAdapter<'a> {
    pub fn new(session: &'a Session, system_id: impl Into<String>) -> Self {
        Self {
            session,
            system_id: system_id.into(),
        }
    }

    /// Volumes collection of the storage system holding `observed`.
    fn system_volumes(&self, observed: &Observed) -> String {
        let system = observed.get_str("system_id").unwrap_or(&self.system_id);
        format!("{}/{}/volumes", DEVICE_TYPE1_PATH, system)
    }

    fn item_path(&self, observed: &Observed) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.system_volumes(observed),
            require_id(observed)?
        ))
    }
}

impl ResourceAdapter for VolumeAdapter<'_> {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn lookup(&self, id: Option<&str>, name: Option<&str>) -> Result<Vec<Value>> {
        self.session.find(VOLUMES_PATH, "name", id, name)
    }

    fn create(&self, payload: &Map<String, Value>) -> Result<Value> {
        let path = format!("{}/{}/volumes", DEVICE_TYPE1_PATH, self.system_id);
        self.session
            .client()
            .post(&path, &Value::Object(payload.clone()))
            .with_context(|| format!("POST {}", path))
    }

    fn update(&self, observed: &Observed, payload: &Map<String, Value>) -> Result<Value> {
        let path = self.item_path(observed)?;
        self.session
            .client()
            .put(&path, &Value::Object(payload.clone()))
            .with_context(|| format!("PUT {}", path))
    }

    fn prepare_delete(&self, observed: &Observed, poller: &TaskPoller<'_>) -> Result<()> {
        let id = require_id(observed)?;

        // the list representation may omit system_id and initiators
        let path = format!("{}/{}", VOLUMES_PATH, id);
        let full = self
            .session
            .client()
            .get(&path)
            .with_context(|| format!("GET {}", path))?;
        let full = Observed::from_value(SCHEMA.kind, full)?;

        let item = self.item_path(&full)?;
        let removed = self
            .session
            .delete_snapshots(&format!("{}/snapshots", item), poller)?;
        if removed > 0 {
            log::info!("Deleted {} snapshot(s) of volume {}", removed, id);
        }

        let host_group_ids = ids_of(&full, "initiators");
        if !host_group_ids.is_empty() {
            log::info!("Unexporting volume {} from {:?}", id, host_group_ids);
            let unexport = format!("{}/un-export", item);
            let descriptor = self
                .session
                .client()
                .post(&unexport, &json!({ "host_group_ids": host_group_ids }))
                .with_context(|| format!("POST {}", unexport))?;
            self.session
                .wait(poller, descriptor, &format!("unexport volume {}", id))?;
        }
        Ok(())
    }

    fn delete(&self, observed: &Observed) -> Result<Value> {
        let path = self.item_path(observed)?;
        self.session
            .client()
            .delete(&path)
            .with_context(|| format!("DELETE {}", path))
    }
}
