use crate::config::AssessmentConfig;
use crate::record::Record;
use serde::Serialize;
use serde_json::Value;

/// Current intrusion verdict derived from the latest record of each stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    /// Sensor readings indicate something close by or a change in lighting
    pub intruder_detected: bool,
    /// Latest face snapshot holds a face above the confidence threshold
    pub face_detected: bool,
    /// Latest sensor record
    pub sensor: Option<Record>,
    /// Latest face record, only when `face_detected`
    pub face: Option<Record>,
}

/// Thresholds that turn raw readings into an intrusion verdict
///
/// Evaluates:
/// - Ultrasonic distance below `ultrasonic_threshold`
/// - Light level above `light_threshold`
/// - Any face confidence above `face_confidence_threshold`
#[derive(Debug, Clone)]
pub struct IntrusionPolicy {
    ultrasonic_threshold: f64,
    light_threshold: f64,
    face_confidence_threshold: f64,
}

impl IntrusionPolicy {
    pub fn new(config: &AssessmentConfig) -> Self {
        Self {
            ultrasonic_threshold: config.ultrasonic_threshold,
            light_threshold: config.light_threshold,
            face_confidence_threshold: config.face_confidence_threshold,
        }
    }

    pub fn assess(&self, sensor: Option<&Record>, face: Option<&Record>) -> Assessment {
        let intruder_detected = sensor.is_some_and(|r| self.sensor_alarm(r));
        let face_detected = face.is_some_and(|r| self.confident_face(r));

        Assessment {
            intruder_detected,
            face_detected,
            sensor: sensor.cloned(),
            face: face.filter(|_| face_detected).cloned(),
        }
    }

    fn sensor_alarm(&self, record: &Record) -> bool {
        let too_close = record
            .number("ultrasonic_reading")
            .is_some_and(|distance| distance < self.ultrasonic_threshold);
        let too_bright = record
            .number("light_level")
            .is_some_and(|light| light > self.light_threshold);

        too_close || too_bright
    }

    fn confident_face(&self, record: &Record) -> bool {
        record
            .get("faces")
            .and_then(Value::as_array)
            .is_some_and(|faces| {
                faces.iter().any(|face| {
                    face.get("confidence")
                        .and_then(Value::as_f64)
                        .is_some_and(|c| c > self.face_confidence_threshold)
                })
            })
    }
}

impl Default for IntrusionPolicy {
    fn default() -> Self {
        Self::new(&AssessmentConfig::default())
    }
}

/// Builder for IntrusionPolicy
pub struct IntrusionPolicyBuilder {
    config: AssessmentConfig,
}

impl IntrusionPolicyBuilder {
    pub fn new() -> Self {
        Self {
            config: AssessmentConfig::default(),
        }
    }

    pub fn ultrasonic_threshold(mut self, threshold: f64) -> Self {
        self.config.ultrasonic_threshold = threshold;
        self
    }

    pub fn light_threshold(mut self, threshold: f64) -> Self {
        self.config.light_threshold = threshold;
        self
    }

    pub fn face_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.face_confidence_threshold = threshold;
        self
    }

    pub fn build(self) -> IntrusionPolicy {
        IntrusionPolicy::new(&self.config)
    }
}

impl Default for IntrusionPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
