//! Configuration file discovery and loading
//!
//! The bootstrap file is optional. Location priority:
//! 1. Command-line argument (highest priority)
//! 2. `SPEAKER_CONFIG` environment variable
//! 3. Per-user config directory (`<config_dir>/speaker/config.toml`)
//! 4. System-wide `/etc/speaker/config.toml` (Linux only)
//!
//! An explicitly requested file (1 or 2) must exist. A discovered file (3 or 4)
//! that is absent simply means built-in defaults are used.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SPEAKER_CONFIG";

/// Directory name used under the platform config directory
const APP_DIR: &str = "speaker";

/// Logging configuration, shared by every binary in the workspace
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No file found; built-in defaults
    Defaults,
}

/// Resolve which config file to read, if any.
///
/// Returns `Ok(None)` when nothing was requested and no default file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_arg {
        debug!("Config file requested on command line: {}", path.display());
        return require_exists(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            debug!("Config file requested by {}: {}", CONFIG_ENV_VAR, path);
            return require_exists(PathBuf::from(path));
        }
    }

    for candidate in default_config_candidates() {
        if candidate.is_file() {
            debug!("Found default config file: {}", candidate.display());
            return Ok(Some(candidate));
        }
        trace!("No config file at {}", candidate.display());
    }

    debug!("No config file found, using built-in defaults");
    Ok(None)
}

fn require_exists(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.is_file() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )))
    }
}

/// Default config file locations for the current platform, highest priority first
pub fn default_config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR).join("config.toml"));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(APP_DIR).join("config.toml"));
    }

    candidates
}

/// Parse a TOML file into `T`.
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading config from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve and load the bootstrap configuration, falling back to `T::default()`.
pub fn load_config<T>(cli_arg: Option<&Path>) -> Result<(T, ConfigSource)>
where
    T: DeserializeOwned + Default,
{
    match resolve_config_path(cli_arg)? {
        Some(path) => {
            let config = load_toml_file(&path)?;
            Ok((config, ConfigSource::File(path)))
        }
        None => Ok((T::default(), ConfigSource::Defaults)),
    }
}
