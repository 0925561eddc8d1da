//! Stream identifiers, the stored record type and per-stream schema validation.
//!
//! Producers send loosely shaped JSON objects. Before anything is stored the
//! object is checked for the stream's required keys, the known keys are type
//! checked through a typed view, and a `timestamp` is stamped when absent.
//! Unknown keys are kept as sent.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Key every stored record carries
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Named category of ingested data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// Ultrasonic distance and light level readings
    Sensors,
    /// Face-detection snapshots
    Faces,
}

impl Stream {
    pub const ALL: [Stream; 2] = [Stream::Sensors, Stream::Faces];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Sensors => "sensors",
            Stream::Faces => "faces",
        }
    }

    /// Keys a record must carry for this stream, in reporting order
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Stream::Sensors => &["ultrasonic_reading", "light_level"],
            Stream::Faces => &["faces", "image"],
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a record is refused
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Record must be a JSON object")]
    NotAnObject,
}

impl ValidationError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingFields(_) => "missing_fields",
            ValidationError::InvalidField { .. } => "invalid_field",
            ValidationError::NotAnObject => "not_an_object",
        }
    }
}

/// A validated observation. Always carries a `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn timestamp(&self) -> &str {
        self.0
            .get(TIMESTAMP_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Numeric field as `f64`, if present and numeric
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Typed view of a sensor record
#[derive(Debug, Clone, Deserialize)]
pub struct SensorReading {
    pub ultrasonic_reading: f64,
    pub light_level: f64,
}

/// Typed view of a face-detection record
#[derive(Debug, Clone, Deserialize)]
pub struct FaceEvent {
    pub faces: Vec<FaceObservation>,
    pub image: String,
}

/// One detected face
#[derive(Debug, Clone, Deserialize)]
pub struct FaceObservation {
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl SensorReading {
    fn from_fields(fields: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            ultrasonic_reading: typed_field(fields, "ultrasonic_reading")?,
            light_level: typed_field(fields, "light_level")?,
        })
    }
}

impl FaceEvent {
    fn from_fields(fields: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            faces: typed_field(fields, "faces")?,
            image: typed_field(fields, "image")?,
        })
    }
}

/// Face bounding box in absolute pixel coordinates
#[derive(Debug, Clone, Deserialize)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Validate a raw payload against the stream's schema.
///
/// Stamps the current UTC time when `timestamp` is absent.
pub fn validate(stream: Stream, raw: Value) -> Result<Record, ValidationError> {
    validate_at(stream, raw, Utc::now())
}

/// Same as [`validate`] with an explicit clock reading.
pub fn validate_at(stream: Stream, raw: Value, now: DateTime<Utc>) -> Result<Record, ValidationError> {
    let Value::Object(mut fields) = raw else {
        return Err(ValidationError::NotAnObject);
    };

    let missing: Vec<String> = stream
        .required_keys()
        .iter()
        .filter(|key| !fields.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    match stream {
        Stream::Sensors => {
            SensorReading::from_fields(&fields)?;
        }
        Stream::Faces => {
            let event = FaceEvent::from_fields(&fields)?;
            check_base64(&event.image)?;
        }
    }

    match fields.get(TIMESTAMP_KEY) {
        Some(value) => check_timestamp(value)?,
        None => {
            fields.insert(TIMESTAMP_KEY.to_string(), Value::String(format_timestamp(now)));
        }
    }

    Ok(Record(fields))
}

/// ISO-8601 form used for server-assigned timestamps
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a producer timestamp: RFC 3339, or a naive ISO-8601 date-time
/// which is taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn typed_field<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str) -> Result<T, ValidationError> {
    let value = fields.get(key).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| ValidationError::InvalidField {
        field: key.to_string(),
        reason: e.to_string(),
    })
}

fn check_base64(image: &str) -> Result<(), ValidationError> {
    STANDARD
        .decode(image)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidField {
            field: "image".to_string(),
            reason: format!("not valid base64: {e}"),
        })
}

fn check_timestamp(value: &Value) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidField {
        field: TIMESTAMP_KEY.to_string(),
        reason: reason.to_string(),
    };

    let text = value.as_str().ok_or_else(|| invalid("expected an ISO-8601 string"))?;
    parse_timestamp(text)
        .map(|_| ())
        .ok_or_else(|| invalid("not an ISO-8601 date-time"))
}
