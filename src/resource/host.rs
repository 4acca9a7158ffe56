//! Host initiators

use super::{Session, require_id};
use anyhow::{Context, Result};
use declarative::{
    CollectionChange, CollectionRule, Messages, Observed, ResourceAdapter, ResourceSchema,
};
use serde_json::{Map, Value};

pub const HOSTS_PATH: &str = "/api/v1/host-initiators";

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "host",
    facts_key: "hosts",
    name_field: "name",
    update_fields: &["initiators_to_create", "name", "updated_initiators"],
    collections: &[
        CollectionRule {
            request_field: "initiators_to_create",
            observed_field: "initiators",
            change: CollectionChange::Add,
            match_on: Some("address"),
        },
        CollectionRule {
            request_field: "updated_initiators",
            observed_field: "initiators",
            change: CollectionChange::Add,
            match_on: None,
        },
    ],
    aliases: &[],
    write_only: &[],
    overrides: &[],
    messages: Messages {
        created: "Host resource created successfully",
        updated: "Host resource updated",
        deleted: "Host resource deleted successfully",
        already_present: "Host resource exists with the same details",
        already_absent: "Resource already deleted",
        exported: "",
        unexported: "",
    },
};

pub struct HostAdapter<'a> {
    session: &'a Session,
}

impl<'a> HostAdapter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }
}

impl ResourceAdapter for HostAdapter<'_> {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn lookup(&self, id: Option<&str>, name: Option<&str>) -> Result<Vec<Value>> {
        self.session.find(HOSTS_PATH, "name", id, name)
    }

    fn create(&self, payload: &Map<String, Value>) -> Result<Value> {
        self.session
            .client()
            .post(HOSTS_PATH, &Value::Object(payload.clone()))
            .with_context(|| format!("POST {}", HOSTS_PATH))
    }

    fn update(&self, observed: &Observed, payload: &Map<String, Value>) -> Result<Value> {
        let path = format!("{}/{}", HOSTS_PATH, require_id(observed)?);
        self.session
            .client()
            .put(&path, &Value::Object(payload.clone()))
            .with_context(|| format!("PUT {}", path))
    }

    fn delete(&self, observed: &Observed) -> Result<Value> {
        let path = format!("{}/{}", HOSTS_PATH, require_id(observed)?);
        self.session
            .client()
            .delete_with(&path, &[("force".to_string(), "true".to_string())])
            .with_context(|| format!("DELETE {}", path))
    }
}
