//! HTTP client for the telemetry service.
//!
//! Sends are fire-and-forget from the caller's point of view: every failure
//! is classified and returned once, nothing is retried or queued.

use crate::config::ServerConfig;
use crate::faces::FaceReport;
use crate::sensor::SensorReading;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

/// Errors that can occur while publishing to the telemetry service.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Server request timed out")]
    Timeout,

    #[error("Connection error - server might be down: {0}")]
    Connection(String),

    #[error("Server returned status code: {0}")]
    Status(u16),

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PublishError::Timeout
        } else if e.is_connect() {
            PublishError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            PublishError::Status(status.as_u16())
        } else {
            PublishError::Request(e.to_string())
        }
    }
}

/// Destination for producer payloads.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_sensor(&self, reading: &SensorReading) -> Result<(), PublishError>;

    async fn publish_faces(&self, report: &FaceReport) -> Result<(), PublishError>;
}

/// reqwest-backed publisher posting JSON to `/api/sensors` and `/api/faces`.
pub struct TelemetryClient {
    http: reqwest::Client,
    sensors_url: String,
    faces_url: String,
}

impl TelemetryClient {
    pub fn new(config: &ServerConfig) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PublishError::Request(e.to_string()))?;

        let base = config.base_url.trim_end_matches('/');

        Ok(Self {
            http,
            sensors_url: format!("{base}/api/sensors"),
            faces_url: format!("{base}/api/faces"),
        })
    }

    pub fn sensors_url(&self) -> &str {
        &self.sensors_url
    }

    pub fn faces_url(&self) -> &str {
        &self.faces_url
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), PublishError> {
        let response = self.http.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Status(status.as_u16()));
        }

        debug!(status = status.as_u16(), "Server accepted payload");
        Ok(())
    }
}

#[async_trait]
impl Publisher for TelemetryClient {
    #[instrument(skip_all, fields(url = %self.sensors_url))]
    async fn publish_sensor(&self, reading: &SensorReading) -> Result<(), PublishError> {
        self.post_json(&self.sensors_url, reading).await
    }

    #[instrument(skip_all, fields(url = %self.faces_url, faces = report.faces.len()))]
    async fn publish_faces(&self, report: &FaceReport) -> Result<(), PublishError> {
        self.post_json(&self.faces_url, report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let client = TelemetryClient::new(&ServerConfig {
            base_url: "http://52.38.44.83:8000/".to_string(),
            request_timeout_ms: 2000,
        })
        .unwrap();

        assert_eq!(client.sensors_url(), "http://52.38.44.83:8000/api/sensors");
        assert_eq!(client.faces_url(), "http://52.38.44.83:8000/api/faces");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let client = TelemetryClient::new(&ServerConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_ms: 500,
        })
        .unwrap();

        let reading = SensorReading {
            ultrasonic_reading: 10.0,
            light_level: 20.0,
        };

        assert!(client.publish_sensor(&reading).await.is_err());
    }
}
