//! Reconciliation driver
//!
//! [`Driver`] brings one resource to the requested [`Operation`]:
//!
//! 1. look the resource up by id, else by current name
//! 2. decide between no-op, create, update, delete, export or unexport
//! 3. issue the mutation through the adapter and await its task
//! 4. re-read the resource and report it under the schema's facts key
//!
//! Running the same declaration twice changes nothing the second time.

use crate::diff::plan_update;
use crate::error::{Error, Result};
use crate::resource::ResourceAdapter;
use crate::task::{TaskPoller, TaskResult};
use crate::types::{ApplyResult, DesiredState, DiffOutcome, Observed, Operation, Report};
use serde_json::{Map, Value, json};

/// Reconciles resources of one kind.
pub struct Driver<'a, A: ResourceAdapter + ?Sized> {
    adapter: &'a A,
    poller: TaskPoller<'a>,
}

impl<'a, A: ResourceAdapter + ?Sized> Driver<'a, A> {
    /// Create a driver over `adapter`, awaiting tasks with `poller`.
    pub fn new(adapter: &'a A, poller: TaskPoller<'a>) -> Self {
        Self { adapter, poller }
    }

    /// Bring the resource described by `desired` to `operation`.
    pub fn reconcile(&self, desired: &DesiredState, operation: Operation) -> Result<Report> {
        let schema = self.adapter.schema();

        if !self.adapter.supports(operation) {
            return Err(Error::Unsupported {
                kind: schema.kind,
                operation: operation.to_string(),
            });
        }
        if desired.is_anonymous() {
            return Err(Error::Configuration(format!(
                "Missing mandatory field: {}",
                schema.name_field
            )));
        }

        let observed = self.observe(desired.id.as_deref(), desired.name.as_deref())?;
        log::debug!(
            "{} '{}' is {}",
            schema.kind,
            desired.key(),
            if observed.is_present() { "present" } else { "absent" }
        );

        match operation {
            Operation::Present => self.present(desired, &observed),
            Operation::Absent => self.absent(&observed),
            Operation::Export | Operation::Unexport => {
                self.associate(desired, &observed, operation)
            }
        }
    }

    /// Look a resource up. Zero candidates means absent.
    pub fn observe(&self, id: Option<&str>, name: Option<&str>) -> Result<Observed> {
        let kind = self.adapter.schema().kind;
        let mut candidates = self
            .adapter
            .lookup(id, name)
            .map_err(|e| Error::adapter(format!("look up {}", kind), e))?;

        match candidates.len() {
            0 => Ok(Observed::absent()),
            1 => Observed::from_value(kind, candidates.remove(0)),
            count => Err(Error::Ambiguous {
                kind,
                key: id.or(name).unwrap_or_default().to_string(),
                count,
            }),
        }
    }

    fn present(&self, desired: &DesiredState, observed: &Observed) -> Result<Report> {
        let schema = self.adapter.schema();
        let plan = plan_update(schema, observed, desired);
        if let Some(difference) = &plan.difference {
            log::debug!("Difference found at {}", difference);
        }

        match plan.outcome {
            DiffOutcome::Absent => {
                log::info!("Creating {} '{}'", schema.kind, desired.key());
                let operation = format!("create {}", schema.kind);
                let descriptor = self
                    .adapter
                    .create(&desired.create_payload())
                    .map_err(|e| Error::adapter(operation.clone(), e))?;
                self.await_mutation(&operation, descriptor)?;

                let refreshed = self.observe(desired.id.as_deref(), desired.name.as_deref())?;
                return Ok(Report::new(
                    ApplyResult::Created,
                    schema.messages.created,
                    self.facts(&refreshed),
                ));
            }
            DiffOutcome::Unchanged => {
                return Ok(Report::new(
                    ApplyResult::NoChange,
                    schema.messages.already_present,
                    self.facts(observed),
                ));
            }
            DiffOutcome::Changed => {}
        }

        log::info!("Updating {} '{}'", schema.kind, desired.key());
        let operation = format!("update {}", schema.kind);
        let descriptor = self
            .adapter
            .update(observed, &plan.payload)
            .map_err(|e| Error::adapter(operation.clone(), e))?;
        self.await_mutation(&operation, descriptor)?;

        let refreshed = self.refresh(observed)?;
        Ok(Report::new(
            ApplyResult::Modified,
            schema.messages.updated,
            self.facts(&refreshed),
        ))
    }

    fn absent(&self, observed: &Observed) -> Result<Report> {
        let schema = self.adapter.schema();

        if !observed.is_present() {
            return Ok(Report::new(
                ApplyResult::NoChange,
                schema.messages.already_absent,
                json!({}),
            ));
        }

        log::info!(
            "Deleting {} '{}'",
            schema.kind,
            observed.id().unwrap_or_default()
        );
        self.adapter
            .prepare_delete(observed, &self.poller)
            .map_err(|e| Error::adapter(format!("prepare {} for deletion", schema.kind), e))?;

        let operation = format!("delete {}", schema.kind);
        let descriptor = self
            .adapter
            .delete(observed)
            .map_err(|e| Error::adapter(operation.clone(), e))?;
        self.await_mutation(&operation, descriptor)?;

        Ok(Report::new(
            ApplyResult::Removed,
            schema.messages.deleted,
            json!({}),
        ))
    }

    fn associate(
        &self,
        desired: &DesiredState,
        observed: &Observed,
        operation: Operation,
    ) -> Result<Report> {
        let schema = self.adapter.schema();

        if !observed.is_present() {
            return Err(Error::NotFound {
                kind: schema.kind,
                key: desired.key(),
            });
        }

        let label = format!("{} {}", operation, schema.kind);
        log::info!("{} '{}'", label, desired.key());
        let descriptor = match operation {
            Operation::Export => self.adapter.export(observed, desired),
            _ => self.adapter.unexport(observed, desired),
        }
        .map_err(|e| Error::adapter(label.clone(), e))?;
        self.await_mutation(&label, descriptor)?;

        let refreshed = self.refresh(observed)?;
        let (result, msg) = match operation {
            Operation::Export => (ApplyResult::Exported, schema.messages.exported),
            _ => (ApplyResult::Unexported, schema.messages.unexported),
        };
        Ok(Report::new(result, msg, self.facts(&refreshed)))
    }

    /// Re-read a resource by id so a rename does not lose it.
    fn refresh(&self, observed: &Observed) -> Result<Observed> {
        let id = observed.id();
        self.observe(id.as_deref(), None)
    }

    fn await_mutation(&self, operation: &str, descriptor: Value) -> Result<TaskResult> {
        let result = self.poller.await_task(descriptor)?;
        if result.error {
            return Err(Error::TaskFailed {
                operation: operation.to_string(),
                message: result.message,
                response: result.response,
            });
        }
        Ok(result)
    }

    fn facts(&self, observed: &Observed) -> Value {
        let mut facts = Map::new();
        facts.insert(
            self.adapter.schema().facts_key.to_string(),
            json!([observed.to_value()]),
        );
        Value::Object(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CollectionChange, CollectionRule, Messages, ResourceSchema};
    use crate::task::PollOptions;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use std::time::Duration;

    const SCHEMA: ResourceSchema = ResourceSchema {
        kind: "volume",
        facts_key: "volumes",
        name_field: "name",
        update_fields: &["name", "size_mib", "members_to_add"],
        collections: &[CollectionRule {
            request_field: "members_to_add",
            observed_field: "members",
            change: CollectionChange::Add,
            match_on: None,
        }],
        aliases: &[("size_mib", "size_mi_b")],
        write_only: &[],
        overrides: &[],
        messages: Messages {
            created: "Volume resource created successfully",
            updated: "Volume resource updated",
            deleted: "Volume resource deleted successfully",
            already_present: "Volume resource exists with the same details",
            already_absent: "Resource already deleted",
            exported: "exported",
            unexported: "unexported",
        },
    };

    /// In-memory control plane for one resource kind.
    #[derive(Default)]
    struct SimulatedAdapter {
        store: RefCell<BTreeMap<String, Map<String, Value>>>,
        next_id: Cell<u32>,
        mutations: Cell<u32>,
        prepared: Cell<u32>,
        fail_tasks: Cell<bool>,
        duplicate_lookups: Cell<bool>,
    }

    impl SimulatedAdapter {
        fn descriptor(&self) -> Value {
            self.mutations.set(self.mutations.get() + 1);
            if self.fail_tasks.get() {
                json!({"status": "FAILED", "message": "backend refused"})
            } else {
                json!({"status": "SUCCEEDED"})
            }
        }

        fn apply(fields: &mut Map<String, Value>, payload: &Map<String, Value>) {
            for (key, value) in payload {
                if key == "members_to_add" {
                    let members = fields
                        .entry("members")
                        .or_insert_with(|| json!([]));
                    if let (Value::Array(list), Value::Array(new)) = (members, value) {
                        list.extend(new.iter().cloned());
                    }
                } else {
                    fields.insert(SCHEMA.observed_name(key).to_string(), value.clone());
                }
            }
        }
    }

    impl ResourceAdapter for SimulatedAdapter {
        fn schema(&self) -> &ResourceSchema {
            &SCHEMA
        }

        fn lookup(&self, id: Option<&str>, name: Option<&str>) -> anyhow::Result<Vec<Value>> {
            let store = self.store.borrow();
            let mut found: Vec<Value> = match (id, name) {
                (Some(id), _) => store.get(id).cloned().map(Value::Object).into_iter().collect(),
                (None, Some(name)) => store
                    .values()
                    .filter(|r| r.get("name").and_then(Value::as_str) == Some(name))
                    .cloned()
                    .map(Value::Object)
                    .collect(),
                (None, None) => Vec::new(),
            };
            if self.duplicate_lookups.get()
                && let Some(first) = found.first().cloned()
            {
                found.push(first);
            }
            Ok(found)
        }

        fn create(&self, payload: &Map<String, Value>) -> anyhow::Result<Value> {
            let id = format!("v{}", self.next_id.get());
            self.next_id.set(self.next_id.get() + 1);
            let mut fields = Map::new();
            fields.insert("id".to_string(), json!(id));
            Self::apply(&mut fields, payload);
            if !self.fail_tasks.get() {
                self.store.borrow_mut().insert(id, fields);
            }
            Ok(self.descriptor())
        }

        fn update(&self, observed: &Observed, payload: &Map<String, Value>) -> anyhow::Result<Value> {
            let id = observed.id().unwrap_or_default();
            if let Some(fields) = self.store.borrow_mut().get_mut(&id) {
                Self::apply(fields, payload);
            }
            Ok(self.descriptor())
        }

        fn delete(&self, observed: &Observed) -> anyhow::Result<Value> {
            self.store
                .borrow_mut()
                .remove(&observed.id().unwrap_or_default());
            Ok(self.descriptor())
        }

        fn prepare_delete(&self, _observed: &Observed, _poller: &TaskPoller<'_>) -> anyhow::Result<()> {
            self.prepared.set(self.prepared.get() + 1);
            Ok(())
        }

        fn supports(&self, operation: Operation) -> bool {
            operation != Operation::Unexport
        }

        fn export(&self, _observed: &Observed, _desired: &DesiredState) -> anyhow::Result<Value> {
            Ok(self.descriptor())
        }
    }

    fn fetch_succeeded(_locator: &str) -> anyhow::Result<Value> {
        Ok(json!({"status": "SUCCEEDED"}))
    }

    fn poller() -> TaskPoller<'static> {
        TaskPoller::new(&fetch_succeeded).with_options(PollOptions::new().interval(Duration::ZERO))
    }

    fn desired(value: Value) -> DesiredState {
        match value {
            Value::Object(map) => DesiredState::from_data(map, "name"),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_present_is_idempotent() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());
        let want = desired(json!({"name": "vol1", "size_mib": 1024}));

        let first = driver.reconcile(&want, Operation::Present).unwrap();
        assert!(first.changed);
        assert_eq!(first.result, ApplyResult::Created);
        assert_eq!(first.msg, "Volume resource created successfully");
        assert_eq!(first.facts["volumes"][0]["size_mi_b"], json!(1024));

        let second = driver.reconcile(&want, Operation::Present).unwrap();
        assert!(!second.changed);
        assert_eq!(second.msg, "Volume resource exists with the same details");
        assert_eq!(adapter.mutations.get(), 1);
    }

    #[test]
    fn test_present_against_matching_resource_makes_no_calls() {
        let adapter = SimulatedAdapter::default();
        adapter.store.borrow_mut().insert(
            "v9".to_string(),
            match json!({"id": "v9", "name": "vol1", "size_mi_b": 2048.0}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            },
        );
        let driver = Driver::new(&adapter, poller());

        let report = driver
            .reconcile(&desired(json!({"name": "vol1", "size_mib": 2048})), Operation::Present)
            .unwrap();
        assert!(!report.changed);
        assert_eq!(adapter.mutations.get(), 0);
        assert_eq!(report.facts["volumes"][0]["id"], json!("v9"));
    }

    #[test]
    fn test_present_updates_changed_field() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());
        driver
            .reconcile(&desired(json!({"name": "vol1", "size_mib": 1024})), Operation::Present)
            .unwrap();

        let report = driver
            .reconcile(&desired(json!({"name": "vol1", "size_mib": 4096})), Operation::Present)
            .unwrap();
        assert_eq!(report.result, ApplyResult::Modified);
        assert_eq!(report.facts["volumes"][0]["size_mi_b"], json!(4096));
        assert_eq!(adapter.mutations.get(), 2);
    }

    #[test]
    fn test_collection_delta_then_idempotent() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());
        driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap();

        let want = desired(json!({"name": "vol1", "members_to_add": ["a", "b"]}));
        let first = driver.reconcile(&want, Operation::Present).unwrap();
        assert!(first.changed);
        assert_eq!(first.facts["volumes"][0]["members"], json!(["a", "b"]));

        let second = driver.reconcile(&want, Operation::Present).unwrap();
        assert!(!second.changed);
    }

    #[test]
    fn test_rename_refreshes_by_id() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());
        driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap();

        let report = driver
            .reconcile(&desired(json!({"name": "vol1", "new_name": "vol2"})), Operation::Present)
            .unwrap();
        assert_eq!(report.result, ApplyResult::Modified);
        assert_eq!(report.facts["volumes"][0]["name"], json!("vol2"));

        let again = driver
            .reconcile(&desired(json!({"name": "vol2", "new_name": "vol2"})), Operation::Present)
            .unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_new_name_is_not_used_for_lookup() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());

        let report = driver
            .reconcile(&desired(json!({"name": "vol1", "new_name": "vol2"})), Operation::Present)
            .unwrap();
        assert_eq!(report.result, ApplyResult::Created);
        assert_eq!(report.facts["volumes"][0]["name"], json!("vol1"));
    }

    #[test]
    fn test_absent_against_missing_resource() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());

        let report = driver
            .reconcile(&desired(json!({"name": "ghost"})), Operation::Absent)
            .unwrap();
        assert!(!report.changed);
        assert_eq!(report.msg, "Resource already deleted");
        assert_eq!(adapter.mutations.get(), 0);
        assert_eq!(adapter.prepared.get(), 0);
    }

    #[test]
    fn test_absent_deletes_after_cleanup() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());
        driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap();

        let report = driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Absent)
            .unwrap();
        assert_eq!(report.result, ApplyResult::Removed);
        assert_eq!(report.facts, json!({}));
        assert_eq!(adapter.prepared.get(), 1);
        assert!(adapter.store.borrow().is_empty());
    }

    #[test]
    fn test_missing_identity_is_configuration_error() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());

        let err = driver
            .reconcile(&desired(json!({"size_mib": 1})), Operation::Present)
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing mandatory field: name");
        assert_eq!(adapter.mutations.get(), 0);
    }

    #[test]
    fn test_failed_task_is_reported() {
        let adapter = SimulatedAdapter::default();
        adapter.fail_tasks.set(true);
        let driver = Driver::new(&adapter, poller());

        let err = driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap_err();
        match err {
            Error::TaskFailed {
                operation, message, ..
            } => {
                assert_eq!(operation, "create volume");
                assert_eq!(message, "backend refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ambiguous_lookup() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());
        driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap();
        adapter.duplicate_lookups.set(true);

        let err = driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap_err();
        assert!(matches!(err, Error::Ambiguous { count: 2, .. }));
    }

    #[test]
    fn test_export_requires_existing_resource() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());

        let err = driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Export)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "volume", .. }));
        assert_eq!(adapter.mutations.get(), 0);
    }

    #[test]
    fn test_export_existing_resource() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());
        driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap();

        let report = driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Export)
            .unwrap();
        assert_eq!(report.result, ApplyResult::Exported);
        assert!(report.changed);
    }

    #[test]
    fn test_unsupported_operation() {
        let adapter = SimulatedAdapter::default();
        let driver = Driver::new(&adapter, poller());

        let err = driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Unexport)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn test_pending_task_is_polled() {
        let adapter = SimulatedAdapter::default();
        let polled = Cell::new(0u32);
        let fetch = |_: &str| {
            polled.set(polled.get() + 1);
            Ok::<_, anyhow::Error>(json!({"status": "SUCCEEDED"}))
        };

        struct Pending<'a>(&'a SimulatedAdapter);
        impl ResourceAdapter for Pending<'_> {
            fn schema(&self) -> &ResourceSchema {
                self.0.schema()
            }
            fn lookup(&self, id: Option<&str>, name: Option<&str>) -> anyhow::Result<Vec<Value>> {
                self.0.lookup(id, name)
            }
            fn create(&self, payload: &Map<String, Value>) -> anyhow::Result<Value> {
                self.0.create(payload)?;
                Ok(json!({"taskUri": "/api/v1/tasks/t1"}))
            }
            fn update(&self, observed: &Observed, payload: &Map<String, Value>) -> anyhow::Result<Value> {
                self.0.update(observed, payload)
            }
            fn delete(&self, observed: &Observed) -> anyhow::Result<Value> {
                self.0.delete(observed)
            }
        }

        let pending = Pending(&adapter);
        let driver = Driver::new(
            &pending,
            TaskPoller::new(&fetch).with_options(PollOptions::new().interval(Duration::ZERO)),
        );
        let report = driver
            .reconcile(&desired(json!({"name": "vol1"})), Operation::Present)
            .unwrap();
        assert!(report.changed);
        assert_eq!(polled.get(), 1);
    }
}
