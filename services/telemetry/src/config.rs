use serde::Deserialize;

use crate::store::RetentionMode;

/// Records kept per stream in bounded mode unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 50;

/// Main configuration for the telemetry service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Stream storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Intrusion assessment thresholds
    #[serde(default)]
    pub assessment: AssessmentConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Expose Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Stream storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Keep a bounded history per stream, or only the latest record
    #[serde(default)]
    pub mode: RetentionMode,
    /// Maximum records per stream in bounded mode
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum accepted request body (face snapshots carry a base64 JPEG)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Thresholds for the intrusion status view
#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentConfig {
    /// Distance (cm) below which something is considered too close
    #[serde(default = "default_ultrasonic_threshold")]
    pub ultrasonic_threshold: f64,
    /// Light level above which the room is considered disturbed
    #[serde(default = "default_light_threshold")]
    pub light_threshold: f64,
    /// Minimum face confidence that counts as a sighting
    #[serde(default = "default_face_confidence_threshold")]
    pub face_confidence_threshold: f64,
}

// Default value functions
fn default_service_name() -> String {
    "telemetry".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_ultrasonic_threshold() -> f64 {
    50.0
}

fn default_light_threshold() -> f64 {
    700.0
}

fn default_face_confidence_threshold() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
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

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: RetentionMode::default(),
            capacity: default_capacity(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            ultrasonic_threshold: default_ultrasonic_threshold(),
            light_threshold: default_light_threshold(),
            face_confidence_threshold: default_face_confidence_threshold(),
        }
    }
}

impl Config {
    /// Load configuration from config files and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/telemetry").required(false))
            .add_source(config::File::with_name("/etc/perimeter/telemetry").required(false))
            // TELEMETRY__STORAGE__CAPACITY -> storage.capacity
            .add_source(
                config::Environment::with_prefix("TELEMETRY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("api.cors_origins"),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.storage.capacity == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "storage.capacity".to_string(),
                message: "Capacity must be greater than 0".to_string(),
            });
        }

        if self.api.max_body_bytes == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "api.max_body_bytes".to_string(),
                message: "Body limit must be greater than 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.assessment.face_confidence_threshold) {
            return Err(ConfigValidationError::InvalidValue {
                field: "assessment.face_confidence_threshold".to_string(),
                message: "Confidence must be within 0.0..=1.0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
