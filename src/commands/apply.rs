//! Reconcile one resource to the requested state

use crate::Context;
use crate::cli::TargetArgs;
use crate::config;
use crate::progress::TaskSpinner;
use crate::resource::Session;
use anyhow::Result;
use declarative::{
    DesiredState, Driver, Operation, Report, ResourceAdapter, ResourceSchema, TaskPoller,
};
use serde_json::Value;

/// Build the desired state from `--id`, `--name`, `--data` and `--set`.
///
/// `--id` and `--name` take precedence over the data; `--name` also
/// supplies the name field when the data has none. Fails without an id or
/// a name, so nothing is sent to the control plane.
pub fn desired_state(target: &TargetArgs, schema: &ResourceSchema) -> Result<DesiredState> {
    let name_field = schema.name_field;
    let data = config::desired_data(target)?;
    let mut desired = DesiredState::from_data(data, name_field)
        .with_id(target.id.clone())
        .with_name(target.name.clone());

    if let Some(name) = &target.name {
        desired
            .data
            .entry(name_field.to_string())
            .or_insert_with(|| Value::String(name.clone()));
    }

    if desired.is_anonymous() {
        return Err(declarative::Error::Configuration(format!(
            "Missing mandatory field: {}",
            name_field
        ))
        .into());
    }
    Ok(desired)
}

/// Bring the resource handled by `adapter` to `operation`.
pub fn run(
    ctx: &Context,
    session: &Session,
    adapter: &dyn ResourceAdapter,
    desired: &DesiredState,
    operation: Operation,
) -> Result<Report> {
    let schema = adapter.schema();
    log::debug!("{} {} '{}'", operation, schema.kind, desired.key());

    let spinner = TaskSpinner::new(format!("{} {}", operation, schema.kind), ctx.quiet);
    let poller = TaskPoller::new(session)
        .with_options(ctx.poll.clone())
        .with_observer(&spinner);

    Ok(Driver::new(adapter, poller).reconcile(desired, operation)?)
}
