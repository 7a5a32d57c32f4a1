// Process-start configuration
// Threshold policy, rule table, frame source, and API/playback settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::chords::{builtin_specs, RuleError, RuleSpec, RuleTable, ThresholdPolicy};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "FRETSENSE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid chord rules: {0}")]
    Rules(#[from] RuleError),
}

/// Application configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Contact threshold applied to every sensor cell
    pub threshold: ThresholdPolicy,

    /// Ordered chord rules; the built-in table when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleSpec>>,

    /// Device node or capture file speaking the frame line protocol
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Serial line speed of the sensor board
    pub baud_rate: u32,

    /// Serial read timeout; a quiet device yields "no frame" after this
    pub read_timeout_ms: u64,

    /// Pause between frame reads
    pub poll_interval_ms: u64,

    /// HTTP listen address
    pub bind: String,

    /// Frontend origin allowed by CORS
    pub allowed_origin: String,

    /// Folder holding chord audio files
    pub audio_folder: PathBuf,

    /// Play the chord sound when the detected chord changes
    pub playback: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            threshold: ThresholdPolicy::default(),
            rules: None,
            source: None,
            baud_rate: 250_000,
            read_timeout_ms: 50,
            poll_interval_ms: 100,
            bind: "127.0.0.1:8000".to_string(),
            allowed_origin: "http://localhost:5173".to_string(),
            audio_folder: PathBuf::from("audio"),
            playback: true,
        }
    }
}

impl AppConfig {
    /// Parse a config from JSON bytes
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_bytes(&data)
    }

    /// Locate and load the config for this process
    ///
    /// Lookup order: explicit path, `$FRETSENSE_CONFIG`, the user config
    /// directory, then built-in defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.exists()));

        match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                log::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate and build the rule table
    pub fn rule_table(&self) -> Result<RuleTable, ConfigError> {
        let specs = self.rules.clone().unwrap_or_else(builtin_specs);
        Ok(RuleTable::from_specs(specs)?)
    }
}

/// `<config_dir>/fretsense/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fretsense").join("config.json"))
}
