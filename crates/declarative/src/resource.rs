//! Resource adapter trait
//!
//! A [`ResourceAdapter`] knows how one kind of control-plane resource is
//! looked up and mutated. Everything else (deciding whether to act, waiting
//! for tasks, re-reading state and reporting) lives in the driver, so an
//! adapter is mostly a list of REST calls plus a [`ResourceSchema`].

use crate::task::TaskPoller;
use crate::types::{DesiredState, Observed, Operation};
use anyhow::Result;
use serde_json::{Map, Value};

/// How a collection request field changes the observed collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionChange {
    /// Keep desired elements not yet present.
    Add,
    /// Keep desired elements that are present.
    Remove,
}

/// A request field that edits a nested collection of the resource.
///
/// For example hosts take `initiators_to_create` and report `initiators`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionRule {
    /// Field in the request payload.
    pub request_field: &'static str,
    /// Field in the observed resource.
    pub observed_field: &'static str,
    pub change: CollectionChange,
    /// For object elements, the key identifying them. `None` compares whole values.
    pub match_on: Option<&'static str>,
}

/// Report messages for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Messages {
    pub created: &'static str,
    pub updated: &'static str,
    pub deleted: &'static str,
    pub already_present: &'static str,
    pub already_absent: &'static str,
    pub exported: &'static str,
    pub unexported: &'static str,
}

/// Static description of a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSchema {
    /// Kind used in messages and errors, e.g. `"host"`.
    pub kind: &'static str,
    /// Key under which the resource is reported in facts, e.g. `"hosts"`.
    pub facts_key: &'static str,
    /// Field holding the resource name.
    pub name_field: &'static str,
    /// Fields an update may carry. Everything else is dropped.
    pub update_fields: &'static [&'static str],
    pub collections: &'static [CollectionRule],
    /// Request field → observed field renames, e.g. `size_mib` → `size_mi_b`.
    pub aliases: &'static [(&'static str, &'static str)],
    /// Fields the control plane accepts but does not report back.
    pub write_only: &'static [&'static str],
    /// Fields whose desired value replaces the observed one before comparing.
    pub overrides: &'static [&'static str],
    pub messages: Messages,
}

impl ResourceSchema {
    /// Observed field name for a request field.
    #[must_use]
    pub fn observed_name<'a>(&self, field: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(from, _)| *from == field)
            .map_or(field, |(_, to)| *to)
    }
}

/// Control-plane operations for one resource kind.
///
/// Mutations return the task descriptor produced by the call; the driver
/// awaits it.
pub trait ResourceAdapter {
    /// Static description of the resource kind.
    fn schema(&self) -> &ResourceSchema;

    /// Find candidates by id, else by name. Zero results means absent.
    fn lookup(&self, id: Option<&str>, name: Option<&str>) -> Result<Vec<Value>>;

    /// Create the resource.
    fn create(&self, payload: &Map<String, Value>) -> Result<Value>;

    /// Update an existing resource.
    fn update(&self, observed: &Observed, payload: &Map<String, Value>) -> Result<Value>;

    /// Delete an existing resource.
    fn delete(&self, observed: &Observed) -> Result<Value>;

    /// Remove dependents before delete (snapshots, exports).
    fn prepare_delete(&self, _observed: &Observed, _poller: &TaskPoller<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether the kind offers `operation`.
    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Present | Operation::Absent)
    }

    /// Export to host groups.
    fn export(&self, _observed: &Observed, _desired: &DesiredState) -> Result<Value> {
        anyhow::bail!("{} cannot be exported", self.schema().kind)
    }

    /// Unexport from host groups.
    fn unexport(&self, _observed: &Observed, _desired: &DesiredState) -> Result<Value> {
        anyhow::bail!("{} cannot be unexported", self.schema().kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: ResourceSchema = ResourceSchema {
        kind: "volume",
        facts_key: "volumes",
        name_field: "name",
        update_fields: &["name", "size_mib"],
        collections: &[],
        aliases: &[("size_mib", "size_mi_b")],
        write_only: &[],
        overrides: &[],
        messages: Messages {
            created: "created",
            updated: "updated",
            deleted: "deleted",
            already_present: "present",
            already_absent: "absent",
            exported: "exported",
            unexported: "unexported",
        },
    };

    #[test]
    fn test_observed_name() {
        assert_eq!(SCHEMA.observed_name("size_mib"), "size_mi_b");
        assert_eq!(SCHEMA.observed_name("name"), "name");
    }
}
