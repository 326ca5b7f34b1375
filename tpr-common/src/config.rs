//! Configuration file discovery and recording directory resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "TPR_CONFIG";

/// Environment variable naming the recording directory
pub const RECORDING_DIR_ENV_VAR: &str = "TPR_RECORDING_DIR";

/// Configuration file resolution following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Per-user config file, if it exists
///
/// Returns `None` when no configuration file applies; callers fall back to
/// built-in defaults in that case.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: ~/.config/tpr/config.toml (or platform equivalent)
    default_config_path().filter(|path| path.exists())
}

/// Platform config location (`<config_dir>/tpr/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tpr").join("config.toml"))
}

/// Recording directory resolution following priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `recording_dir` value from the config file
///
/// Unlike the config file there is no compiled default: a replay without a
/// recording is an error.
pub fn resolve_recording_dir(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    if let Some(path) = config_value {
        return Ok(path.to_path_buf());
    }

    Err(Error::NotFound(format!(
        "no recording directory given (argument, {} or config file)",
        env_var_name
    )))
}

/// Read and deserialize a TOML file
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading TOML from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(toml::from_str(&content)?)
}
