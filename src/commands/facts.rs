//! Read-only facts about existing resources
//!
//! A lookup by id or name reports a one-element list (empty when nothing
//! matches) and may gather extra facts through `--option`. Without an
//! identity the collection is listed with the given query parameters.

use crate::cli::{DeviceType, FactsArgs, FactsKind};
use crate::config;
use crate::resource::host::HOSTS_PATH;
use crate::resource::host_group::HOST_GROUPS_PATH;
use crate::resource::volume::VOLUMES_PATH;
use crate::resource::{DEVICE_TYPE1_PATH, Session};
use anyhow::{Context, Result, bail};
use declarative::{ApplyResult, Report};
use serde_json::{Map, Value};

const INITIATORS_PATH: &str = "/api/v1/initiators";
const STORAGE_SYSTEMS_PATH: &str = "/api/v1/storage-systems";
const VOLUME_SETS_PATH: &str = "/api/v1/volume-sets";
const AUDIT_EVENTS_PATH: &str = "/api/v1/audit-events";

const GET_VOLUMES: &str = "getVolumes";
const GET_SNAPSHOTS: &str = "getSnapshots";

/// Query parameters and options shared by every facts kind.
struct Query<'a> {
    id: Option<&'a str>,
    name: Option<&'a str>,
    params: Vec<(String, String)>,
    options: &'a [String],
}

impl Query<'_> {
    fn identified(&self) -> bool {
        self.id.is_some() || self.name.is_some()
    }

    fn option(&self, name: &str) -> bool {
        self.options.iter().any(|o| o.eq_ignore_ascii_case(name))
    }
}

/// Gather facts for `args`. Never changes anything.
pub fn run(session: &Session, args: &FactsArgs) -> Result<Report> {
    let query = Query {
        id: args.id.as_deref(),
        name: args.name.as_deref(),
        params: config::parse_params(&args.params)?,
        options: &args.options,
    };
    for option in query.options {
        if !option.eq_ignore_ascii_case(GET_VOLUMES) && !option.eq_ignore_ascii_case(GET_SNAPSHOTS) {
            log::warn!("Ignoring unknown option '{}'", option);
        }
    }

    let facts = match args.kind {
        FactsKind::Hosts => with_volumes(session, HOSTS_PATH, "hosts", &query)?,
        FactsKind::HostGroups => with_volumes(session, HOST_GROUPS_PATH, "host_groups", &query)?,
        FactsKind::HostInitiators => host_initiators(session, &query)?,
        FactsKind::Volumes => volumes(session, &query)?,
        FactsKind::VolumeSets => volume_sets(session, args.system_id.as_deref(), &query)?,
        FactsKind::StorageSystems => storage_systems(session, args.device_type, &query)?,
        FactsKind::AuditEvents => {
            let events = session.client().list(AUDIT_EVENTS_PATH, &query.params)?;
            facts_of("events", events)
        }
    };

    Ok(Report::new(ApplyResult::NoChange, "", Value::Object(facts)))
}

fn facts_of(key: &str, items: Vec<Value>) -> Map<String, Value> {
    let mut facts = Map::new();
    facts.insert(key.to_string(), Value::Array(items));
    facts
}

/// `[resource]` or `[]` for an id/name lookup in `collection`.
fn lookup(session: &Session, collection: &str, query: &Query<'_>) -> Result<Vec<Value>> {
    let mut found = session.find(collection, "name", query.id, query.name)?;
    found.truncate(1);
    Ok(found)
}

fn id_of(resource: Option<&Value>) -> Option<&str> {
    resource.and_then(|r| r.get("id")).and_then(Value::as_str)
}

/// Hosts and host groups: lookup with optional `getVolumes`, else list.
fn with_volumes(
    session: &Session,
    collection: &str,
    key: &str,
    query: &Query<'_>,
) -> Result<Map<String, Value>> {
    if !query.identified() {
        return Ok(facts_of(key, session.client().list(collection, &query.params)?));
    }

    let found = lookup(session, collection, query)?;
    let mut facts = Map::new();
    if query.option(GET_VOLUMES)
        && let Some(id) = id_of(found.first())
    {
        let volumes = volume_set_volumes(session, id)?;
        if !volumes.is_empty() {
            facts.insert("volumes".to_string(), Value::Array(volumes));
        }
    }
    facts.insert(key.to_string(), Value::Array(found));
    Ok(facts)
}

fn volume_set_volumes(session: &Session, id: &str) -> Result<Vec<Value>> {
    let path = format!("{}/{}/volumes", VOLUME_SETS_PATH, id);
    session
        .client()
        .list(&path, &[])
        .with_context(|| format!("GET {}", path))
}

fn host_initiators(session: &Session, query: &Query<'_>) -> Result<Map<String, Value>> {
    let items = match query.id {
        Some(id) => session
            .client()
            .get_optional(&format!("{}/{}", INITIATORS_PATH, id))?
            .into_iter()
            .collect(),
        None => session.client().list(INITIATORS_PATH, &query.params)?,
    };
    Ok(facts_of("host_initiators", items))
}

fn volumes(session: &Session, query: &Query<'_>) -> Result<Map<String, Value>> {
    if !query.identified() {
        return Ok(facts_of("volumes", session.client().list(VOLUMES_PATH, &query.params)?));
    }

    let found = lookup(session, VOLUMES_PATH, query)?;
    let mut facts = Map::new();
    if query.option(GET_SNAPSHOTS) {
        let mut snapshots = Vec::new();
        if let Some(volume) = found.first() {
            let system = volume
                .get("system_id")
                .and_then(Value::as_str)
                .context("volume has no system_id")?;
            let id = id_of(Some(volume)).context("volume has no id")?;
            let path = format!("{}/{}/volumes/{}/snapshots", DEVICE_TYPE1_PATH, system, id);
            snapshots = session.client().list(&path, &[])?;
        }
        facts.insert("snapshots".to_string(), Value::Array(snapshots));
    }
    facts.insert("volumes".to_string(), Value::Array(found));
    Ok(facts)
}

fn volume_sets(
    session: &Session,
    system_id: Option<&str>,
    query: &Query<'_>,
) -> Result<Map<String, Value>> {
    if !query.identified() {
        let path = match system_id {
            Some(system) => format!("{}/{}/applicationsets", DEVICE_TYPE1_PATH, system),
            None => VOLUME_SETS_PATH.to_string(),
        };
        return Ok(facts_of("volume_sets", session.client().list(&path, &query.params)?));
    }

    let Some(system) = system_id else {
        bail!("--system-id is required to look up a volume set by id or name");
    };
    let collection = format!("{}/{}/applicationsets", DEVICE_TYPE1_PATH, system);
    let found = lookup(session, &collection, query)?;

    let mut facts = Map::new();
    if !query.options.is_empty() {
        let mut volumes = Vec::new();
        let mut snapshots = Vec::new();
        if let Some(id) = id_of(found.first()) {
            if query.option(GET_VOLUMES) {
                volumes = volume_set_volumes(session, id)?;
            }
            if query.option(GET_SNAPSHOTS) {
                let path = format!("{}/{}/snapshots", collection, id);
                snapshots = session.client().list(&path, &[])?;
            }
        }
        facts.insert("volumes".to_string(), Value::Array(volumes));
        facts.insert("snapshots".to_string(), Value::Array(snapshots));
    }
    facts.insert("volume_sets".to_string(), Value::Array(found));
    Ok(facts)
}

fn storage_systems(
    session: &Session,
    device_type: Option<DeviceType>,
    query: &Query<'_>,
) -> Result<Map<String, Value>> {
    let collection = match device_type {
        Some(DeviceType::One) => DEVICE_TYPE1_PATH.to_string(),
        Some(DeviceType::Two) => format!("{}/device-type2", STORAGE_SYSTEMS_PATH),
        None => STORAGE_SYSTEMS_PATH.to_string(),
    };

    let items = match query.id {
        Some(id) => {
            let path = format!("{}/{}", collection, id);
            let system = session
                .client()
                .get(&path)
                .with_context(|| format!("GET {}", path))?;
            vec![system]
        }
        None => session.client().list(&collection, &query.params)?,
    };
    Ok(facts_of("storage_systems", items))
}
