//! Path resolution for greenlake
//!
//! # Environment Variables
//!
//! - `GREENLAKE_CONFIG_DIR` - Override config directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `GREENLAKE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/greenlake` (if set)
//! 3. Platform config dir joined with `greenlake`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "GREENLAKE_CONFIG_DIR";

/// Name of the default config file inside the config directory
pub const CONFIG_FILE: &str = "config.json";

/// Get the greenlake config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("greenlake");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let base = dirs::config_dir().context("Could not determine config directory")?;
    let path = base.join("greenlake");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Default credentials file, `<config dir>/config.json`
pub fn default_config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand `~` and environment variables in a path.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
