//! Engine settings schema
//!
//! These settings configure the engine itself (cache, timeouts, logging), not the
//! configuration graph it resolves.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root settings structure mapped from the TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigraphSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ConfigraphSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            resolution: ResolutionConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ConfigraphSettings {
    /// Validates the settings
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value found
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        self.resolution.validate()?;
        self.cache.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Resolution pass settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Stop waiting for unsettled nodes after this many milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Give every top-level node an implicit environment override named after its key
    #[serde(default)]
    pub env_overrides: bool,

    /// Prefix for implicit environment overrides (e.g. `APP_` reads `APP_PORT`)
    #[serde(default)]
    pub env_prefix: Option<String>,

    /// `.env` files layered under the process environment, lowest precedence first
    #[serde(default)]
    pub dotenv_files: Vec<String>,
}

impl ResolutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == Some(0) {
            return Err("resolution.timeout_ms must be > 0".to_string());
        }
        if let Some(prefix) = &self.env_prefix {
            if prefix.is_empty()
                || !prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(format!(
                    "resolution.env_prefix '{prefix}' must be non-empty and contain only letters, digits and '_'"
                ));
            }
        }
        Ok(())
    }
}

/// Which caching provider backs `get_or_set_cache_item`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheProviderKind {
    #[default]
    Memory,
    File,
    None,
}

/// How a pass uses cached items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Read cached items and store computed ones
    #[default]
    Default,
    /// Never read or write items; compute functions always run
    Skip,
    /// Ignore existing items and overwrite them with fresh values
    Clear,
}

impl CacheMode {
    pub fn reads(self) -> bool {
        matches!(self, CacheMode::Default)
    }

    pub fn writes(self) -> bool {
        !matches!(self, CacheMode::Skip)
    }
}

/// Cache settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub provider: CacheProviderKind,

    /// Cache file location (file provider only)
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub mode: CacheMode,
}

impl CacheConfig {
    fn validate(&self) -> Result<(), String> {
        if self.provider == CacheProviderKind::File
            && self.path.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err("cache.path is required when cache.provider = 'file'".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable JSON file logging next to console output
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
