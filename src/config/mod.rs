//! Configuration for beatlog.
//!
//! Two layers:
//! - [`Config`]: where logs, the store and the analysis config live (JSON,
//!   in the platform config directory).
//! - [`AnalysisConfig`]: code lists, units, ceilings and gap thresholds
//!   (YAML), compiled into an immutable [`EngineConfig`] before any file is
//!   processed.

pub mod analysis;

pub use analysis::{
    AnalysisConfig, CodeBook, DeviceFamily, DeviceTable, EngineConfig, UnitTable,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for `<DEVICE_TYPE>_<DEVICE_ID>_<DATE>.csv` logs
    pub data_path: PathBuf,

    /// Root of the JSON sample store
    pub store_path: PathBuf,

    /// Analysis YAML; built-in defaults are used when unset
    pub analysis_config: Option<PathBuf>,

    /// Number of files processed in parallel
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("beatlog");

        Self {
            data_path: data_dir.join("logs"),
            store_path: data_dir.join("store"),
            analysis_config: None,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("beatlog")
            .join("config.json")
    }

    /// Path of the persisted cumulative import statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.store_path.join("import_stats.json")
    }

    /// Ensure the store directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.store_path).map_err(|source| ConfigError::Io {
            path: self.store_path.clone(),
            source,
        })
    }

    /// Load the analysis configuration this config points at, or the defaults.
    pub fn analysis(&self) -> Result<AnalysisConfig, ConfigError> {
        match &self.analysis_config {
            Some(path) => AnalysisConfig::load(path),
            None => Ok(AnalysisConfig::default()),
        }
    }
}

/// Configuration errors.
///
/// `Invalid` is the configuration error that stops a run before any file is
/// touched: missing code lists, bad thresholds, mismatched ceilings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("invalid analysis configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.workers >= 1);
        assert!(config.analysis_config.is_none());
        assert!(config.stats_path().ends_with("import_stats.json"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.workers, Config::default().workers);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"workers": 3}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.store_path, Config::default().store_path);
    }
}
