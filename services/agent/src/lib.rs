//! Perimeter Agent
//!
//! Producer side of the Perimeter telemetry pipeline. One binary, two loops:
//!
//! - **Sensor poller**: reads ultrasonic distance and light level on a fixed
//!   interval and posts every reading to `/api/sensors`
//! - **Face reporter**: consumes face detections (JSON lines on stdin) and
//!   posts a snapshot to `/api/faces` at most once per throttle interval
//!
//! Delivery is best effort. A failed post is logged and the payload dropped.

pub mod client;
pub mod config;
pub mod faces;
pub mod sensor;
pub mod throttle;

pub use client::{PublishError, Publisher, TelemetryClient};
pub use config::{AgentConfig, AgentMode};
pub use faces::{Detection, DetectionLines, FaceReport, FaceReporter, ReportOutcome};
pub use sensor::{SensorPoller, SensorReading, SensorSource, SimulatedSensor};
pub use throttle::Throttle;
