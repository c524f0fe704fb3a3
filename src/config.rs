//! Configuration management for the `Beachcast` collector
//!
//! Handles loading configuration from files and environment variables,
//! and provides validation for all configuration settings. A missing
//! config file is not an error: every setting has a default.

use crate::BeachcastError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `Beachcast` application
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BeachcastConfig {
    /// Village forecast (primary source) configuration
    #[serde(default)]
    pub kma: KmaConfig,
    /// Marine forecast (secondary source) configuration
    #[serde(default)]
    pub marine: MarineConfig,
    /// Collection schedule configuration
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Forecast store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Read API server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Primary-source (village forecast service) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmaConfig {
    /// Service key issued by the data portal. May be URL-encoded; it is
    /// decoded before use. Usually supplied via `BEACHCAST_KMA__SERVICE_KEY`.
    pub service_key: Option<String>,
    /// Base URL for the village forecast endpoint
    #[serde(default = "default_kma_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_kma_timeout")]
    pub timeout_seconds: u32,
    /// How many publication slots to walk back through before giving up
    #[serde(default = "default_kma_retry_count")]
    pub retry_count: u32,
    /// Delay between fallback attempts in milliseconds
    #[serde(default = "default_kma_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Secondary-source (marine API) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarineConfig {
    /// Base URL for the marine forecast endpoint
    #[serde(default = "default_marine_base_url")]
    pub base_url: String,
    /// Timezone the hourly series is requested in
    #[serde(default = "default_marine_timezone")]
    pub timezone: String,
    /// How many days of hourly marine data to request (max 8)
    #[serde(default = "default_marine_forecast_days")]
    pub forecast_days: u32,
    /// Request timeout in seconds
    #[serde(default = "default_kma_timeout")]
    pub timeout_seconds: u32,
}

/// Collection schedule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Forecast horizon: items beyond now + this many days are dropped
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
}

/// Forecast store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Hours of day (local time) that merged forecasts are kept for
    #[serde(default = "default_allowed_hours")]
    pub allowed_hours: Vec<u32>,
    /// Store directory location
    #[serde(default = "default_store_location")]
    pub location: String,
    /// Path to the locations registry file
    #[serde(default = "default_locations_path")]
    pub locations_path: String,
}

/// Read API server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the read API listens on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_kma_base_url() -> String {
    "http://apis.data.go.kr/1360000/VilageFcstInfoService_2.0/getVilageFcst".to_string()
}

fn default_kma_timeout() -> u32 {
    20
}

fn default_kma_retry_count() -> u32 {
    5
}

fn default_kma_retry_delay_ms() -> u64 {
    400
}

fn default_marine_base_url() -> String {
    "https://marine-api.open-meteo.com/v1/marine".to_string()
}

fn default_marine_timezone() -> String {
    "Asia/Seoul".to_string()
}

fn default_marine_forecast_days() -> u32 {
    5
}

fn default_forecast_days() -> u32 {
    3
}

fn default_allowed_hours() -> Vec<u32> {
    vec![0, 3, 6, 9, 12, 15, 18, 21]
}

fn default_store_location() -> String {
    "beachcast_db".to_string()
}

fn default_locations_path() -> String {
    "locations.json".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KmaConfig {
    fn default() -> Self {
        Self {
            service_key: None,
            base_url: default_kma_base_url(),
            timeout_seconds: default_kma_timeout(),
            retry_count: default_kma_retry_count(),
            retry_delay_ms: default_kma_retry_delay_ms(),
        }
    }
}

impl Default for MarineConfig {
    fn default() -> Self {
        Self {
            base_url: default_marine_base_url(),
            timezone: default_marine_timezone(),
            forecast_days: default_marine_forecast_days(),
            timeout_seconds: default_kma_timeout(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            forecast_days: default_forecast_days(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            allowed_hours: default_allowed_hours(),
            location: default_store_location(),
            locations_path: default_locations_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl BeachcastConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment variable overrides with BEACHCAST_ prefix,
        // e.g. BEACHCAST_KMA__SERVICE_KEY
        builder = builder.add_source(
            Environment::with_prefix("BEACHCAST")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: BeachcastConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("beachcast").join("config.toml"))
    }

    /// Decoded service key, if configured. Portal keys come URL-encoded.
    #[must_use]
    pub fn service_key(&self) -> Option<String> {
        self.kma
            .service_key
            .as_deref()
            .map(|raw| urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |k| k.into_owned()))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.kma.retry_count > 20 {
            return Err(
                BeachcastError::config("Primary-source retry count cannot exceed 20").into(),
            );
        }

        if self.kma.timeout_seconds == 0 || self.kma.timeout_seconds > 300 {
            return Err(BeachcastError::config(
                "Primary-source timeout must be between 1 and 300 seconds",
            )
            .into());
        }

        if self.marine.forecast_days == 0 || self.marine.forecast_days > 8 {
            return Err(
                BeachcastError::config("Marine forecast days must be between 1 and 8").into(),
            );
        }

        if self.schedule.forecast_days == 0 || self.schedule.forecast_days > 10 {
            return Err(
                BeachcastError::config("Forecast horizon must be between 1 and 10 days").into(),
            );
        }

        if self.storage.allowed_hours.iter().any(|h| *h > 23) {
            return Err(BeachcastError::config("Allowed storage hours must be 0-23").into());
        }

        if !self.kma.base_url.starts_with("http://") && !self.kma.base_url.starts_with("https://") {
            return Err(BeachcastError::config(
                "Primary-source base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(BeachcastError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BeachcastConfig::default();
        assert_eq!(config.kma.retry_count, 5);
        assert_eq!(config.kma.retry_delay_ms, 400);
        assert_eq!(config.kma.timeout_seconds, 20);
        assert_eq!(config.schedule.forecast_days, 3);
        assert_eq!(config.storage.allowed_hours, vec![0, 3, 6, 9, 12, 15, 18, 21]);
        assert!(config.kma.service_key.is_none());
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let config =
            BeachcastConfig::load_from_path(Some(PathBuf::from("/nonexistent/config.toml")))
                .expect("defaults should apply without a config file");
        assert_eq!(config.kma.retry_count, 5);
        assert_eq!(config.marine.forecast_days, 5);
    }

    #[test]
    fn test_service_key_is_url_decoded() {
        let mut config = BeachcastConfig::default();
        config.kma.service_key = Some("abc%2Bdef%3D%3D".to_string());
        assert_eq!(config.service_key().as_deref(), Some("abc+def=="));
    }

    #[test]
    fn test_validation_rejects_bad_hours() {
        let mut config = BeachcastConfig::default();
        config.storage.allowed_hours = vec![0, 24];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = BeachcastConfig::default();
        config.kma.timeout_seconds = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout"));
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let mut config = BeachcastConfig::default();
        config.logging.level = "loud".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }
}
