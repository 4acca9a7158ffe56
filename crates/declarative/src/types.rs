//! Core types for declarative resource management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field carrying a requested rename. Never used for lookup.
pub const NEW_NAME_FIELD: &str = "new_name";

/// Desired configuration of one resource, as declared by the operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    /// Resource id, if the operator addressed it by id.
    pub id: Option<String>,
    /// Current name used for lookup.
    pub name: Option<String>,
    /// Declared fields, including `new_name` when a rename is requested.
    pub data: Map<String, Value>,
}

impl DesiredState {
    /// Build desired state for a resource whose name lives in `name_field`.
    ///
    /// A plain `name` key moves to `name_field` when the two differ. The id
    /// comes from `data["id"]`, the name from `data[name_field]`.
    pub fn from_data(mut data: Map<String, Value>, name_field: &str) -> Self {
        if name_field != "name"
            && let Some(name) = data.remove("name")
            && !name.is_null()
        {
            data.insert(name_field.to_string(), name);
        }

        let id = data.get("id").and_then(scalar_string);
        let name = data.get(name_field).and_then(scalar_string);
        Self { id, name, data }
    }

    /// Override the id (takes precedence over `data["id"]`).
    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        if id.is_some() {
            self.id = id;
        }
        self
    }

    /// Override the lookup name (takes precedence over the data's name).
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        if name.is_some() {
            self.name = name;
        }
        self
    }

    /// Requested new name, if any.
    #[must_use]
    pub fn new_name(&self) -> Option<&str> {
        self.data
            .get(NEW_NAME_FIELD)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Whether neither id nor name identify the resource.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }

    /// Key used in messages: id if given, else name.
    #[must_use]
    pub fn key(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }

    /// Data without `new_name`, as sent on create.
    #[must_use]
    pub fn create_payload(&self) -> Map<String, Value> {
        let mut data = self.data.clone();
        data.remove(NEW_NAME_FIELD);
        data
    }

    /// Whether a rename must be sent, given the observed resource.
    #[must_use]
    pub fn rename_for(&self, observed: &Observed, name_field: &str) -> Option<String> {
        let new_name = self.new_name()?;
        let by_name = self.name.as_deref().is_some_and(|name| name != new_name);
        let by_id = self.id.is_some() && observed.get_str(name_field) != Some(new_name);
        (by_name || by_id).then(|| new_name.to_string())
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A resource as held by the control plane.
///
/// Empty means "does not exist".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observed {
    fields: Map<String, Value>,
}

impl Observed {
    /// The absent resource.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// Validate a lookup result: an object carrying an `id`.
    pub fn from_value(kind: &'static str, value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(Error::Malformed {
                kind,
                reason: format!("expected an object, got {}", value),
            });
        };
        if fields.is_empty() {
            return Ok(Self::absent());
        }
        match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => {}
            Some(Value::Number(_)) => {}
            _ => {
                return Err(Error::Malformed {
                    kind,
                    reason: "missing 'id'".to_string(),
                });
            }
        }
        Ok(Self { fields })
    }

    /// Whether the resource exists.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Resource id.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.fields.get("id").and_then(scalar_string)
    }

    /// Field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// All fields.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The resource as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Whether an existing resource needs a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Observed already matches desired.
    Unchanged,
    /// An update is required.
    Changed,
    /// The resource does not exist; a create is required.
    Absent,
}

/// Requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Present,
    Absent,
    Export,
    Unexport,
}

impl Operation {
    /// Name as used on the command line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Export => "export",
            Self::Unexport => "unexport",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Resource was exported to host groups
    Exported,
    /// Resource was unexported from host groups
    Unexported,
}

impl ApplyResult {
    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

/// Outward result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub changed: bool,
    pub msg: String,
    pub facts: Value,
    #[serde(skip)]
    pub result: ApplyResult,
}

impl Report {
    /// Build a report; `changed` follows the result.
    pub fn new(result: ApplyResult, msg: impl Into<String>, facts: Value) -> Self {
        Self {
            changed: result.is_change(),
            msg: msg.into(),
            facts,
            result,
        }
    }
}
