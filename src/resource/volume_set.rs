//! Volume sets (application sets) on device-type1 storage systems
//!
//! Membership is edited with `add_members` / `remove_members`, which are
//! reduced to the members that actually change. `app_set_type` is reported
//! in a different case than it is accepted, so the declared value wins
//! when comparing.

use super::{DEVICE_TYPE1_PATH, Session, require_id};
use crate::cli::DeviceType;
use anyhow::{Context, Result};
use declarative::{
    CollectionChange, CollectionRule, DesiredState, Messages, Observed, Operation,
    ResourceAdapter, ResourceSchema, TaskPoller,
};
use serde_json::{Map, Value, json};

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "volume set",
    facts_key: "volume_sets",
    name_field: "app_set_name",
    update_fields: &[
        "add_members",
        "app_set_business_unit",
        "app_set_comments",
        "app_set_importance",
        "app_set_name",
        "app_set_type",
        "remove_members",
    ],
    collections: &[
        CollectionRule {
            request_field: "add_members",
            observed_field: "members",
            change: CollectionChange::Add,
            match_on: None,
        },
        CollectionRule {
            request_field: "remove_members",
            observed_field: "members",
            change: CollectionChange::Remove,
            match_on: None,
        },
    ],
    aliases: &[],
    write_only: &[],
    overrides: &["app_set_type"],
    messages: Messages {
        created: "Volume Set resource created successfully",
        updated: "Volume Set resource updated",
        deleted: "Volume Set deleted successfully",
        already_present: "Volume Set resource exists with the same details",
        already_absent: "Resource already deleted",
        exported: "Volume Set exported successfully",
        unexported: "Volume Set unexported successfully",
    },
};

pub struct VolumeSetAdapter<'a> {
    session: &'a Session,
    system_id: String,
}

/// Only device type 1 systems host volume sets.
pub fn check_device_type(device_type: DeviceType) -> declarative::Result<()> {
    if device_type != DeviceType::One {
        return Err(declarative::Error::Configuration(format!(
            "Volume sets are not supported on device type {}",
            device_type.as_str()
        )));
    }
    Ok(())
}

impl<'a> VolumeSetAdapter<'a> {
    pub fn new(
        session: &'a Session,
        system_id: impl Into<String>,
        device_type: DeviceType,
    ) -> declarative::Result<Self> {
        check_device_type(device_type)?;
        Ok(Self {
            session,
            system_id: system_id.into(),
        })
    }

    fn collection(&self) -> String {
        format!("{}/{}/applicationsets", DEVICE_TYPE1_PATH, self.system_id)
    }

    fn item_path(&self, observed: &Observed) -> Result<String> {
        let system = observed.get_str("system_id").unwrap_or(&self.system_id);
        Ok(format!(
            "{}/{}/applicationsets/{}",
            DEVICE_TYPE1_PATH,
            system,
            require_id(observed)?
        ))
    }

    fn post_hosts(&self, observed: &Observed, desired: &DesiredState, action: &str) -> Result<Value> {
        let path = format!("{}/{}", self.item_path(observed)?, action);
        let host_group_ids = desired
            .data
            .get("host_group_ids")
            .cloned()
            .unwrap_or_else(|| json!([]));
        self.session
            .client()
            .post(&path, &json!({ "host_group_ids": host_group_ids }))
            .with_context(|| format!("POST {}", path))
    }
}

impl ResourceAdapter for VolumeSetAdapter<'_> {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn lookup(&self, id: Option<&str>, name: Option<&str>) -> Result<Vec<Value>> {
        self.session.find(&self.collection(), "name", id, name)
    }

    fn create(&self, payload: &Map<String, Value>) -> Result<Value> {
        let path = self.collection();
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
        let snapshots = format!("{}/snapshots", self.item_path(observed)?);
        let removed = self.session.delete_snapshots(&snapshots, poller)?;
        if removed > 0 {
            log::info!("Deleted {} snapshot(s) of volume set", removed);
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

    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    fn export(&self, observed: &Observed, desired: &DesiredState) -> Result<Value> {
        self.post_hosts(observed, desired, "export")
    }

    fn unexport(&self, observed: &Observed, desired: &DesiredState) -> Result<Value> {
        self.post_hosts(observed, desired, "un-export")
    }
}
