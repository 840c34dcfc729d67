//! Dump tool configuration
//!
//! Optional TOML file; command-line flags override whatever it sets.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Where the battery record comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// I/O registry on macOS, sysfs elsewhere
    #[default]
    Auto,
    Ioreg,
    Sysfs,
    File,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub source: Source,
    /// Registry class queried by the ioreg source
    pub device_class: String,
    pub sysfs_root: PathBuf,
    /// JSON record replayed by the file source
    pub record_file: Option<PathBuf>,
    pub mock_profile: Option<String>,
    pub pretty: bool,
    /// Print the raw record instead of the snapshot
    pub raw: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            source: Source::Auto,
            device_class: powertelemetry::BATTERY_SERVICE_CLASS.to_string(),
            sysfs_root: PathBuf::from(powertelemetry::sysfs::DEFAULT_POWER_SUPPLY_ROOT),
            record_file: None,
            mock_profile: None,
            pretty: true,
            raw: false,
        }
    }
}

impl DumpConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// `$XDG_CONFIG_HOME/powertelemetry/config.toml`, or under `~/.config`
pub fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("powertelemetry").join("config.toml"))
}
