use std::env::current_exe;
use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use log::{info, warn};
use serde_json;

use crate::config::types::Config;
use crate::error::ConfigError;

/// `<exe>.json` next to the binary, so a config can travel with a copied executable.
fn get_portable_config_path() -> Option<PathBuf> {
    let mut path = current_exe()
        .map_err(|err| warn!("Unable to locate the running executable: {}", err))
        .ok()?;

    // cadence-bridge(.exe) => cadence-bridge.json
    if !path.set_extension("json") {
        warn!("Executable path has no file name: {}", path.to_string_lossy());
        return None;
    }

    Some(path)
}

/// `cadence-bridge.json` in the per-user config directory of the platform.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("nl", "cadence-bridge", "cadence-bridge").map(|dirs| {
        dirs.config_dir().join("cadence-bridge.json")
    })
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = get_portable_config_path() {
        if path.is_file() {
            return Ok(path);
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

pub async fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = tokio::fs::read(path).await?;

    if content.is_empty() {
        return Ok(Config::default());
    }

    let content = str::from_utf8(&content)?;
    Ok(serde_json::from_str(content)?)
}

/// Load the config from `explicit` if given, it must exist. Otherwise look for a portable or
/// per-user config file, falling back to defaults when there is none.
pub async fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        info!("Using config file {}", path.to_string_lossy());
        return read_config_file(path).await;
    }

    let path = match get_config_path() {
        Ok(path) => path,
        Err(err) => {
            warn!("{}; using defaults", err);
            return Ok(Config::default());
        },
    };

    match read_config_file(&path).await {
        Ok(config) => {
            info!("Using config file {}", path.to_string_lossy());
            Ok(config)
        },
        Err(err) if err.is_file_not_found_error() => {
            info!("Config file not found, using defaults");
            Ok(Config::default())
        },
        Err(err) => Err(err),
    }
}
