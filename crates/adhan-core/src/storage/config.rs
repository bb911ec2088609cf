//! TOML-based engine configuration.
//!
//! Stores the operational knobs of the engine:
//! - Horizon lengths per subscription tier
//! - Cache capacity and location-bucket invalidation threshold
//! - Debounce window, alarm limit and retry policy for reprogramming
//! - Background job deadline and minimum spacing
//! - Diagnostics history length
//!
//! Configuration is stored at `~/.config/adhan/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{data_dir, dotpath};
use crate::error::ConfigError;
use crate::reprogram::RetryPolicy;
use crate::settings::SubscriptionTier;

/// Days of alerts kept installed ahead of now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonConfig {
    #[serde(default = "default_free_days")]
    pub free_days: u32,
    #[serde(default = "default_premium_days")]
    pub premium_days: u32,
}

/// Prayer-time cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached days; 0 means twice the largest horizon.
    #[serde(default)]
    pub capacity: usize,
    /// Entries more than this many 0.01 degree buckets away are dropped on a
    /// location change.
    #[serde(default = "default_bucket_threshold")]
    pub bucket_threshold: u32,
}

/// Reprogram cycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprogramConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Ceiling on alarms handed to the boundary in one cycle.
    #[serde(default = "default_max_alarms")]
    pub max_alarms: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// Background refresh job tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_min_interval_minutes")]
    pub min_interval_minutes: u64,
}

/// Run history tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/adhan/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub horizon: HorizonConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub reprogram: ReprogramConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

// Default functions
fn default_free_days() -> u32 {
    2
}
fn default_premium_days() -> u32 {
    7
}
fn default_bucket_threshold() -> u32 {
    5
}
fn default_debounce_ms() -> u64 {
    750
}
fn default_max_alarms() -> usize {
    64
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_retry_max_delay_ms() -> u64 {
    2_000
}
fn default_deadline_secs() -> u64 {
    25
}
fn default_min_interval_minutes() -> u64 {
    15
}
fn default_history_limit() -> usize {
    50
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            free_days: default_free_days(),
            premium_days: default_premium_days(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            bucket_threshold: default_bucket_threshold(),
        }
    }
}

impl Default for ReprogramConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_alarms: default_max_alarms(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            min_interval_minutes: default_min_interval_minutes(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

impl HorizonConfig {
    pub fn days_for(&self, tier: SubscriptionTier) -> u32 {
        match tier {
            SubscriptionTier::Free => self.free_days,
            SubscriptionTier::Premium => self.premium_days,
        }
    }
}

impl Config {
    /// Cache capacity, defaulting to twice the largest horizon.
    pub fn cache_capacity(&self) -> usize {
        if self.cache.capacity > 0 {
            return self.cache.capacity;
        }
        let max_days = self.horizon.free_days.max(self.horizon.premium_days) as usize;
        (max_days * 2).max(2)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.reprogram.debounce_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reprogram.retry_attempts,
            Duration::from_millis(self.reprogram.retry_base_delay_ms),
            Duration::from_millis(self.reprogram.retry_max_delay_ms),
        )
    }

    pub fn background_deadline(&self) -> Duration {
        Duration::from_secs(self.background.deadline_secs)
    }

    pub fn background_min_interval(&self) -> Duration {
        Duration::from_secs(self.background.min_interval_minutes * 60)
    }

    /// Location of `config.toml` inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/adhan"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = dotpath::get_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        dotpath::set_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}
