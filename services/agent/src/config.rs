//! Configuration management for the telemetry agent.
//!
//! This module handles loading and validating configuration from environment
//! variables and configuration files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    /// Which producer loop to run
    #[serde(default)]
    pub mode: AgentMode,

    /// Telemetry server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Sensor polling configuration
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Face reporting configuration
    #[serde(default)]
    pub face: FaceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Producer loop selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Poll the sensor board and post readings
    #[default]
    Sensors,
    /// Read detections from stdin and post throttled face snapshots
    Faces,
}

/// Telemetry server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the telemetry service (e.g., "http://localhost:8000")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Sensor polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// Interval between readings in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Face reporting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FaceConfig {
    /// Minimum seconds between snapshots sent to the server
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: u64,

    /// Faces below this detector confidence are dropped before reporting
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_request_timeout_ms() -> u64 {
    2000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_throttle_secs() -> u64 {
    10
}
fn default_min_confidence() -> f64 {
    0.5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            throttle_secs: default_throttle_secs(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Config file (config/agent.toml)
    /// 2. Environment variables (e.g., AGENT__SERVER__BASE_URL)
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/agent").required(false))
            .add_source(
                Environment::with_prefix("AGENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.base_url.is_empty() {
            return Err(ConfigValidationError::MissingField(
                "server.base_url".to_string(),
            ));
        }
        if !self.server.base_url.starts_with("http://")
            && !self.server.base_url.starts_with("https://")
        {
            return Err(ConfigValidationError::InvalidValue {
                field: "server.base_url".to_string(),
                message: "URL must start with http:// or https://".to_string(),
            });
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "server.request_timeout_ms".to_string(),
                message: "Timeout must be greater than 0".to_string(),
            });
        }

        if self.sensor.poll_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "sensor.poll_interval_ms".to_string(),
                message: "Interval must be greater than 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.face.min_confidence) {
            return Err(ConfigValidationError::InvalidValue {
                field: "face.min_confidence".to_string(),
                message: "Confidence must be within 0.0..=1.0".to_string(),
            });
        }

        Ok(())
    }
}

impl ServerConfig {
    /// Get request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SensorConfig {
    /// Get poll interval as Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl FaceConfig {
    /// Get throttle interval as Duration.
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, AgentMode::Sensors);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.sensor.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.face.throttle_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_missing_base_url() {
        let mut config = AgentConfig::default();
        config.server.base_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = AgentConfig::default();
        config.server.base_url = "ftp://52.38.44.83".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_poll_interval() {
        let mut config = AgentConfig::default();
        config.sensor.poll_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_mode_from_source() {
        let config: AgentConfig = Config::builder()
            .set_override("mode", "faces")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.mode, AgentMode::Faces);
        assert_eq!(config.face.throttle_secs, 10);
    }
}
