//! Configuration
//!
//! Typed settings persisted as indented JSON under the per-user config
//! directory, `${CONFIG_DIR}/MegaCustom/`. Unknown fields are ignored on
//! load; missing fields fall back to the documented defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the application directory under the platform config dir
pub const APP_DIR_NAME: &str = "MegaCustom";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub transfers: TransferConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Transfer scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferConfig {
    /// Maximum simultaneously active transfers, clamped to `[1, 10]`
    pub max_concurrent: usize,
    /// Seconds of zero throughput before a transfer is reported stalled
    pub stall_timeout_secs: u64,
}

/// Smart sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Seconds of mtime difference still considered "equal"
    pub mtime_tolerance_secs: i64,
}

/// Task scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Seconds between due-task checks, minimum 10
    pub check_interval_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`
    pub level: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            stall_timeout_secs: 300,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mtime_tolerance_secs: 2,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Platform config directory for the application
///
/// Typically `~/.config/MegaCustom` on Linux.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join(APP_DIR_NAME)
}

impl Config {
    /// Default path of the settings file
    pub fn default_path() -> PathBuf {
        config_dir().join("settings.json")
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as indented JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Validate the configuration, returning problems as field/message pairs
    pub fn validate(&self) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        if self.transfers.max_concurrent == 0 {
            errors.push((
                "transfers.maxConcurrent".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.check_interval_secs < 10 {
            errors.push((
                "scheduler.checkIntervalSecs".to_string(),
                "must be at least 10".to_string(),
            ));
        }
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            errors.push((
                "logging.level".to_string(),
                format!("unknown level '{}'", self.logging.level),
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.transfers.max_concurrent, 3);
        assert_eq!(config.transfers.stall_timeout_secs, 300);
        assert_eq!(config.scheduler.check_interval_secs, 60);
        assert_eq!(config.sync.mtime_tolerance_secs, 2);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut config = Config::default();
        config.transfers.max_concurrent = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.transfers.max_concurrent, 7);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"transfers": {"maxConcurrent": 5, "futureKnob": true}, "unknownSection": 1}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.transfers.max_concurrent, 5);
        // Missing fields fall back to defaults
        assert_eq!(config.transfers.stall_timeout_secs, 300);
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let mut config = Config::default();
        config.transfers.max_concurrent = 0;
        config.scheduler.check_interval_secs = 5;
        config.logging.level = "shout".to_string();

        let errors = config.validate();
        assert_eq!(errors.len(), 3);
    }
}
