//! Host initiator groups

use super::{Session, require_id};
use anyhow::{Context, Result};
use declarative::{
    CollectionChange, CollectionRule, Messages, Observed, ResourceAdapter, ResourceSchema,
};
use serde_json::{Map, Value};

pub const HOST_GROUPS_PATH: &str = "/api/v1/host-initiator-groups";

/// `hosts_to_create` is accepted on create only.
pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "host group",
    facts_key: "host_groups",
    name_field: "name",
    update_fields: &["name", "updated_hosts"],
    collections: &[CollectionRule {
        request_field: "updated_hosts",
        observed_field: "hosts",
        change: CollectionChange::Add,
        match_on: None,
    }],
    aliases: &[],
    write_only: &[],
    overrides: &[],
    messages: Messages {
        created: "Host Group resource created successfully",
        updated: "Host Group resource updated successfully",
        deleted: "Host Group resource deleted successfully",
        already_present: "Host Group resource exists with the same configuration",
        already_absent: "Resource already deleted",
        exported: "",
        unexported: "",
    },
};

pub struct HostGroupAdapter<'a> {
    session: &'a Session,
}

impl<'a> HostGroupAdapter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    fn item_path(observed: &Observed) -> Result<String> {
        Ok(format!("{}/{}", HOST_GROUPS_PATH, require_id(observed)?))
    }
}

impl ResourceAdapter for HostGroupAdapter<'_> {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn lookup(&self, id: Option<&str>, name: Option<&str>) -> Result<Vec<Value>> {
        self.session.find(HOST_GROUPS_PATH, "name", id, name)
    }

    fn create(&self, payload: &Map<String, Value>) -> Result<Value> {
        self.session
            .client()
            .post(HOST_GROUPS_PATH, &Value::Object(payload.clone()))
            .with_context(|| format!("POST {}", HOST_GROUPS_PATH))
    }

    fn update(&self, observed: &Observed, payload: &Map<String, Value>) -> Result<Value> {
        let path = Self::item_path(observed)?;
        self.session
            .client()
            .put(&path, &Value::Object(payload.clone()))
            .with_context(|| format!("PUT {}", path))
    }

    fn delete(&self, observed: &Observed) -> Result<Value> {
        let path = Self::item_path(observed)?;
        self.session
            .client()
            .delete_with(&path, &[("force".to_string(), "true".to_string())])
            .with_context(|| format!("DELETE {}", path))
    }
}
