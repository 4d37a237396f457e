//! Configuration settings for the chime calendar engine.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub reminders: ReminderConfig,
    pub backup: BackupConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            reminders: ReminderConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        // Try standard config locations
        let config_paths = [
            // Current directory
            PathBuf::from("config.toml"),
            PathBuf::from("chime.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("chime/config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".chime/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.reminders.scan_interval_secs == 0 {
            return Err(
                ConfigError::Invalid("reminders.scan_interval_secs must be > 0".to_string())
                    .into(),
            );
        }
        if self.reminders.missed_lookback_hours < 0 {
            return Err(ConfigError::Invalid(
                "reminders.missed_lookback_hours must not be negative".to_string(),
            )
            .into());
        }
        if self.reminders.retention_days < 0 {
            return Err(ConfigError::Invalid(
                "reminders.retention_days must not be negative".to_string(),
            )
            .into());
        }
        if self.backup.enabled && self.backup.interval_secs == 0 {
            return Err(
                ConfigError::Invalid("backup.interval_secs must be > 0".to_string()).into(),
            );
        }
        Ok(())
    }

    /// Expand the data directory path.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let expanded = shellexpand::tilde(&self.storage.data_dir);
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory for the flat-file backend
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/chime".to_string(),
        }
    }
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Scan period in seconds
    pub scan_interval_secs: u64,
    /// How far back the startup missed-reminder recovery looks, in hours
    pub missed_lookback_hours: i64,
    /// How long delivered entries are retained after an event ends, in days
    pub retention_days: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            missed_lookback_hours: 24,
            retention_days: 7,
        }
    }
}

impl ReminderConfig {
    /// Scan period as a std `Duration`.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Missed-reminder look-back window.
    pub fn missed_lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(self.missed_lookback_hours)
    }

    /// Retention window for delivered entries.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }
}

/// Periodic backup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Enable the periodic backup timer
    pub enabled: bool,
    /// Backup period in seconds
    pub interval_secs: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 3600,
        }
    }
}

impl BackupConfig {
    /// Backup period as a std `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
