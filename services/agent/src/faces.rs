//! Face-detection reporting.
//!
//! Detections are produced elsewhere (camera capture plus model inference)
//! and arrive here as JSON lines. The reporter forwards frames that contain
//! faces to the telemetry service, no more often than the throttle allows.

use crate::client::{PublishError, Publisher};
use crate::throttle::Throttle;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info, warn};

/// Face bounding box in absolute pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// One detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// A processed frame with its detections
#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    /// Encoded frame (JPEG)
    #[serde(with = "base64_serde")]
    pub image: Vec<u8>,
    #[serde(default)]
    pub faces: Vec<FaceObservation>,
}

/// Payload posted to `/api/faces`
#[derive(Debug, Clone, Serialize)]
pub struct FaceReport {
    pub timestamp: String,
    #[serde(with = "base64_serde")]
    pub image: Vec<u8>,
    pub faces: Vec<FaceObservation>,
}

/// Base64 serialization helper
mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// What happened to a detection handed to the reporter
#[derive(Debug)]
pub enum ReportOutcome {
    /// No face at or above the confidence floor
    NoFaces,
    /// Throttle still closed
    Throttled { remaining: Duration },
    /// Posted to the server
    Sent { faces: usize },
    /// Post failed; dropped
    Failed(PublishError),
}

/// Errors reading the detection feed.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Failed to read detection feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid detection line: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reads newline-delimited JSON detections from an async reader
pub struct DetectionLines<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> DetectionLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next detection; `None` at end of input. Blank lines are skipped.
    pub async fn next_detection(&mut self) -> Option<Result<Detection, DetectionError>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(serde_json::from_str(&line).map_err(Into::into)),
                Ok(None) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Forwards face detections to the telemetry service, throttled.
pub struct FaceReporter<P> {
    publisher: P,
    throttle: Throttle,
    min_confidence: f64,
}

impl<P: Publisher> FaceReporter<P> {
    pub fn new(publisher: P, throttle: Throttle, min_confidence: f64) -> Self {
        Self {
            publisher,
            throttle,
            min_confidence,
        }
    }

    /// Report one detection if it has faces and the throttle is open.
    pub async fn handle(&mut self, detection: Detection, now: Instant) -> ReportOutcome {
        let faces: Vec<FaceObservation> = detection
            .faces
            .into_iter()
            .filter(|face| face.confidence >= self.min_confidence)
            .collect();

        if faces.is_empty() {
            return ReportOutcome::NoFaces;
        }

        if !self.throttle.ready(now) {
            return ReportOutcome::Throttled {
                remaining: self.throttle.remaining(now),
            };
        }

        let report = FaceReport {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            image: detection.image,
            faces,
        };

        match self.publisher.publish_faces(&report).await {
            Ok(()) => {
                self.throttle.mark_sent(now);
                ReportOutcome::Sent {
                    faces: report.faces.len(),
                }
            }
            Err(e) => ReportOutcome::Failed(e),
        }
    }

    /// Consume detections until the feed ends or `shutdown` resolves.
    pub async fn run<R, F>(mut self, mut feed: DetectionLines<R>, shutdown: F)
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        info!(
            throttle_secs = self.throttle.interval().as_secs(),
            min_confidence = self.min_confidence,
            "Starting face reporter"
        );
        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                _ = &mut shutdown => break,
                next = feed.next_detection() => next,
            };

            let detection = match next {
                None => {
                    info!("Detection feed closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Skipping detection");
                    continue;
                }
                Some(Ok(detection)) => detection,
            };

            match self.handle(detection, Instant::now()).await {
                ReportOutcome::Sent { faces } => info!(faces, "Sent to server"),
                ReportOutcome::Failed(e) => warn!(error = %e, "Failed to send"),
                ReportOutcome::Throttled { remaining } => {
                    debug!(remaining_secs = remaining.as_secs_f64(), "Next send pending")
                }
                ReportOutcome::NoFaces => {}
            }
        }

        info!("Face reporter stopped");
    }
}
