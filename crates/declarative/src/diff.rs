//! Update planning for existing resources
//!
//! Given what the control plane holds and what the operator declared,
//! [`plan_update`] decides whether an update is needed and builds its
//! payload. Only allow-listed fields take part; collection edits are turned
//! into deltas against the observed collection.

use crate::compare::{self, Difference, canonical};
use crate::resource::{CollectionChange, CollectionRule, ResourceSchema};
use crate::types::{DesiredState, DiffOutcome, Observed};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Elements to send for one collection request field.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDelta {
    pub request_field: &'static str,
    pub elements: Vec<Value>,
}

/// Outcome of planning an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub outcome: DiffOutcome,
    /// Body for the update call. Meaningful when `outcome` is `Changed`.
    pub payload: Map<String, Value>,
    /// Non-empty collection deltas.
    pub deltas: Vec<CollectionDelta>,
    /// New name to apply.
    pub rename: Option<String>,
    /// First field difference, if any.
    pub difference: Option<Difference>,
}

impl UpdatePlan {
    /// Whether an update call is needed.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.outcome == DiffOutcome::Changed
    }
}

/// Plan the update of a resource.
///
/// An absent resource yields [`DiffOutcome::Absent`] with an empty payload.
#[must_use]
pub fn plan_update(
    schema: &ResourceSchema,
    observed: &Observed,
    desired: &DesiredState,
) -> UpdatePlan {
    if !observed.is_present() {
        return UpdatePlan {
            outcome: DiffOutcome::Absent,
            payload: Map::new(),
            deltas: Vec::new(),
            rename: None,
            difference: None,
        };
    }

    let mut filtered: Map<String, Value> = desired
        .data
        .iter()
        .filter(|(key, _)| schema.update_fields.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let deltas: Vec<CollectionDelta> = schema
        .collections
        .iter()
        .filter_map(|rule| {
            let requested = filtered.remove(rule.request_field)?;
            let elements = collection_delta(rule, &requested, observed);
            (!elements.is_empty()).then_some(CollectionDelta {
                request_field: rule.request_field,
                elements,
            })
        })
        .collect();

    let (observed_view, merged) = comparison_views(schema, observed, &filtered);
    let difference = compare::diff(&Value::Object(observed_view), &Value::Object(merged));
    let rename = desired.rename_for(observed, schema.name_field);

    let outcome = if difference.is_some() || !deltas.is_empty() || rename.is_some() {
        DiffOutcome::Changed
    } else {
        DiffOutcome::Unchanged
    };

    let mut payload = filtered;
    for delta in &deltas {
        payload.insert(
            delta.request_field.to_string(),
            Value::Array(delta.elements.clone()),
        );
    }
    if let Some(new_name) = &rename {
        payload.insert(schema.name_field.to_string(), Value::String(new_name.clone()));
    }

    UpdatePlan {
        outcome,
        payload,
        deltas,
        rename,
        difference,
    }
}

/// Build the observed and merged views that get compared.
fn comparison_views(
    schema: &ResourceSchema,
    observed: &Observed,
    filtered: &Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut observed_view = observed.fields().clone();

    for field in schema.overrides {
        if let Some(value) = filtered.get(*field).filter(|v| compare::is_truthy(v)) {
            observed_view.insert(schema.observed_name(field).to_string(), value.clone());
        }
    }

    let mut merged = observed_view.clone();
    for (key, value) in filtered {
        merged.insert(schema.observed_name(key).to_string(), value.clone());
    }

    for field in schema.write_only {
        let key = schema.observed_name(field);
        match observed_view.get(key) {
            Some(value) => {
                merged.insert(key.to_string(), value.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }

    (observed_view, merged)
}

/// Elements of `requested` that actually change the observed collection.
fn collection_delta(rule: &CollectionRule, requested: &Value, observed: &Observed) -> Vec<Value> {
    let elements: Vec<Value> = match requested {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    };
    let known = observed_keys(observed.get(rule.observed_field));

    elements
        .into_iter()
        .filter(|element| {
            let present = known.contains(&element_key(rule, element));
            match rule.change {
                CollectionChange::Add => !present,
                CollectionChange::Remove => present,
            }
        })
        .collect()
}

/// Canonical forms of an observed collection.
///
/// Object elements contribute every one of their values, so a desired
/// element matches by id, name or address alike.
fn observed_keys(collection: Option<&Value>) -> HashSet<String> {
    let mut keys = HashSet::new();
    let Some(Value::Array(items)) = collection else {
        return keys;
    };
    for item in items {
        match item {
            Value::Object(fields) => {
                keys.extend(fields.values().map(canonical));
            }
            other => {
                keys.insert(canonical(other));
            }
        }
    }
    keys
}

fn element_key(rule: &CollectionRule, element: &Value) -> String {
    match (rule.match_on, element) {
        (Some(field), Value::Object(fields)) => {
            fields.get(field).map(canonical).unwrap_or_default()
        }
        _ => canonical(element),
    }
}
