//! Connection settings and desired-state input
//!
//! Credentials resolve in this order:
//! 1. `--host`, `--client-id`, `--client-secret` (or their `GREENLAKE_*` env vars)
//! 2. the file given with `--config`
//! 3. `<config dir>/config.json`, when it exists

use crate::cli::{ConnectionArgs, TargetArgs};
use crate::paths;
use anyhow::{Context, Result, bail};
use dsclient::{ConnectOptions, Credentials};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

// ============================================================================
// Connection settings
// ============================================================================

/// Contents of a credentials file. Every field is optional so a file can
/// be combined with flags.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
}

impl Settings {
    /// Load settings from a JSON or TOML file (chosen by extension).
    pub fn load(path: &Path) -> Result<Self> {
        let value = read_document(path)?;
        serde_json::from_value(value)
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Fill unset fields from `fallback`.
    fn or(self, fallback: Self) -> Self {
        Self {
            host: self.host.or(fallback.host),
            client_id: self.client_id.or(fallback.client_id),
            client_secret: self.client_secret.or(fallback.client_secret),
            token_url: self.token_url.or(fallback.token_url),
        }
    }
}

impl From<&ConnectionArgs> for Settings {
    fn from(args: &ConnectionArgs) -> Self {
        Self {
            host: non_empty(args.host.as_deref()),
            client_id: non_empty(args.client_id.as_deref()),
            client_secret: non_empty(args.client_secret.as_deref()),
            token_url: non_empty(args.token_url.as_deref()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Resolved credentials plus connection options.
#[derive(Debug, Clone)]
pub struct Connection {
    pub credentials: Credentials,
    pub options: ConnectOptions,
}

/// Resolve credentials from flags, then the `--config` file, then the default file.
pub fn resolve_connection(args: &ConnectionArgs) -> Result<Connection> {
    let default_file = paths::default_config_file().ok();
    resolve_with_default(args, default_file.as_deref())
}

fn resolve_with_default(args: &ConnectionArgs, default_file: Option<&Path>) -> Result<Connection> {
    let mut settings = Settings::from(args);

    if let Some(path) = &args.config {
        let path = paths::expand(path);
        log::debug!("Loading settings from {}", path.display());
        settings = settings.or(Settings::load(&path)?);
    }

    if let Some(path) = default_file.filter(|p| p.exists()) {
        log::debug!("Loading settings from {}", path.display());
        settings = settings.or(Settings::load(path)?);
    }

    let credentials = Credentials::new(
        settings.host.unwrap_or_default(),
        settings.client_id.unwrap_or_default(),
        settings.client_secret.unwrap_or_default(),
    );
    credentials
        .validate()
        .context("Provide it with a flag, a GREENLAKE_* variable or a config file")?;

    let mut options = ConnectOptions::default();
    if let Some(url) = settings.token_url {
        options = options.token_url(url);
    }

    Ok(Connection {
        credentials,
        options,
    })
}

// ============================================================================
// Desired-state input
// ============================================================================

/// Build the desired field map from `--data` and `--set` arguments.
///
/// `--set` pairs are applied after the file and override its keys.
pub fn desired_data(target: &TargetArgs) -> Result<Map<String, Value>> {
    let mut data = match &target.data {
        Some(path) => load_data(path)?,
        None => Map::new(),
    };

    for assignment in &target.set {
        let (key, value) = parse_assignment(assignment)?;
        data.insert(key, value);
    }

    Ok(data)
}

/// Load a JSON or TOML object from a file.
pub fn load_data(path: &Path) -> Result<Map<String, Value>> {
    match read_document(path)? {
        Value::Object(map) => Ok(map),
        other => bail!(
            "Expected an object in {}, found {}",
            path.display(),
            kind_name(&other)
        ),
    }
}

/// Parse `key=value`. The value is taken as JSON when it parses, else as a string.
pub fn parse_assignment(input: &str) -> Result<(String, Value)> {
    let (key, raw) = split_pair(input)?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Parse `key=value` query parameters. Values stay strings.
pub fn parse_params(inputs: &[String]) -> Result<Vec<(String, String)>> {
    inputs
        .iter()
        .map(|input| {
            let (key, value) = split_pair(input)?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

fn split_pair(input: &str) -> Result<(&str, &str)> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => bail!("Expected KEY=VALUE, got '{}'", input),
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;

    if is_toml(path) {
        toml::from_str(&content).with_context(|| format!("Invalid TOML format in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON format in {}", path.display()))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn args() -> ConnectionArgs {
        ConnectionArgs::default()
    }

    #[test]
    fn test_flags_win_over_config_file() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "creds.json",
            r#"{"host": "https://file", "client_id": "file-id", "client_secret": "file-secret"}"#,
        );

        let args = ConnectionArgs {
            config: Some(file.display().to_string()),
            host: Some("https://flag".into()),
            ..args()
        };
        let conn = resolve_with_default(&args, None).unwrap();

        assert_eq!(conn.credentials.host, "https://flag");
        assert_eq!(conn.credentials.client_id, "file-id");
        assert_eq!(conn.credentials.client_secret, "file-secret");
        assert_eq!(conn.options.token_url, dsclient::DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_config_file_wins_over_default_file() {
        let dir = TempDir::new().unwrap();
        let explicit = write(
            &dir,
            "explicit.toml",
            "host = \"https://explicit\"\ntoken_url = \"https://sso/token\"\n",
        );
        let default = write(
            &dir,
            "config.json",
            r#"{"host": "https://default", "client_id": "d-id", "client_secret": "d-secret"}"#,
        );

        let args = ConnectionArgs {
            config: Some(explicit.display().to_string()),
            ..args()
        };
        let conn = resolve_with_default(&args, Some(&default)).unwrap();

        assert_eq!(conn.credentials.host, "https://explicit");
        assert_eq!(conn.credentials.client_id, "d-id");
        assert_eq!(conn.options.token_url, "https://sso/token");
    }

    #[test]
    fn test_missing_default_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let args = ConnectionArgs {
            host: Some("h".into()),
            client_id: Some("i".into()),
            client_secret: Some("s".into()),
            ..args()
        };
        let missing = dir.path().join("config.json");

        assert!(resolve_with_default(&args, Some(&missing)).is_ok());
    }

    #[test]
    fn test_missing_credentials_is_error() {
        let args = ConnectionArgs {
            host: Some("https://h".into()),
            client_secret: Some("   ".into()),
            ..args()
        };
        let err = resolve_with_default(&args, None).unwrap_err();
        let chain = format!("{:#}", err);

        assert!(chain.contains("client_id"), "{}", chain);
    }

    #[test]
    fn test_unreadable_config_file_is_error() {
        let args = ConnectionArgs {
            config: Some("/nonexistent/greenlake.json".into()),
            ..args()
        };
        assert!(resolve_with_default(&args, None).is_err());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("size_mib=1024").unwrap(),
            ("size_mib".to_string(), json!(1024))
        );
        assert_eq!(
            parse_assignment("name=vol one").unwrap(),
            ("name".to_string(), json!("vol one"))
        );
        assert_eq!(
            parse_assignment("host_group_ids=[\"a\",\"b\"]").unwrap(),
            ("host_group_ids".to_string(), json!(["a", "b"]))
        );
        assert_eq!(
            parse_assignment("comment=a=b").unwrap(),
            ("comment".to_string(), json!("a=b"))
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_desired_data_set_overrides_file() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "volume.toml",
            "name = \"vol1\"\nsize_mib = 1024\ncomment = \"from file\"\n",
        );

        let target = TargetArgs {
            data: Some(file),
            set: vec!["size_mib=2048".into()],
            ..TargetArgs::default()
        };
        let data = desired_data(&target).unwrap();

        assert_eq!(data["name"], json!("vol1"));
        assert_eq!(data["size_mib"], json!(2048));
        assert_eq!(data["comment"], json!("from file"));
    }

    #[test]
    fn test_load_data_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "list.json", "[1, 2]");

        let err = load_data(&file).unwrap_err();
        assert!(err.to_string().contains("a list"));
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["limit=10".into(), "filter=name eq 'x'".into()]).unwrap();
        assert_eq!(
            params,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("filter".to_string(), "name eq 'x'".to_string())
            ]
        );
    }
}
