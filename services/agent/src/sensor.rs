//! Sensor board polling.
//!
//! The board driver sits behind [`SensorSource`]; the poller reads both
//! channels on a fixed interval and posts each reading once. Read and publish
//! failures are logged and the loop moves on to the next tick.

use crate::client::{PublishError, Publisher};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

/// One reading from the sensor board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Distance to the nearest object in cm
    pub ultrasonic_reading: f64,
    /// Raw analog light level
    pub light_level: f64,
}

/// Errors reported by a sensor driver.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor read failed on {channel}: {message}")]
    ReadFailed { channel: String, message: String },

    #[error("Sensor board unavailable")]
    Unavailable,
}

/// Hardware boundary for the ultrasonic and light channels.
#[cfg_attr(test, automock)]
pub trait SensorSource: Send {
    fn read_distance(&mut self) -> Result<f64, SensorError>;

    fn read_light(&mut self) -> Result<f64, SensorError>;
}

/// Deterministic stand-in for the sensor board.
///
/// Distance sweeps down from 150cm to 31cm and back, light drifts between 300
/// and 799, so both alarm thresholds are crossed periodically.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    tick: u64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SensorSource for SimulatedSensor {
    fn read_distance(&mut self) -> Result<f64, SensorError> {
        self.tick = self.tick.wrapping_add(1);
        let phase = self.tick % 240;
        let offset = if phase < 120 { phase } else { 239 - phase };
        Ok(150.0 - offset as f64)
    }

    fn read_light(&mut self) -> Result<f64, SensorError> {
        Ok(300.0 + ((self.tick * 7) % 500) as f64)
    }
}

/// Failure of a single poll.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Reads the sensor board on a fixed interval and posts every reading.
pub struct SensorPoller<S, P> {
    source: S,
    publisher: P,
    interval: Duration,
}

impl<S: SensorSource, P: Publisher> SensorPoller<S, P> {
    pub fn new(source: S, publisher: P, interval: Duration) -> Self {
        Self {
            source,
            publisher,
            interval,
        }
    }

    /// Take one reading and post it.
    pub async fn poll_once(&mut self) -> Result<SensorReading, PollError> {
        let reading = SensorReading {
            ultrasonic_reading: self.source.read_distance()?,
            light_level: self.source.read_light()?,
        };

        self.publisher.publish_sensor(&reading).await?;

        Ok(reading)
    }

    /// Poll until `shutdown` resolves.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) {
        info!(interval_ms = self.interval.as_millis() as u64, "Starting sensor poller");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(reading) => debug!(
                            distance = reading.ultrasonic_reading,
                            light = reading.light_level,
                            "Reading sent"
                        ),
                        Err(e) => warn!(error = %e, "Reading dropped"),
                    }
                }
            }
        }

        info!("Sensor poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockPublisher;

    #[tokio::test]
    async fn test_poll_posts_both_channels() {
        let mut source = MockSensorSource::new();
        source.expect_read_distance().returning(|| Ok(42.0));
        source.expect_read_light().returning(|| Ok(300.0));

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish_sensor()
            .withf(|r| r.ultrasonic_reading == 42.0 && r.light_level == 300.0)
            .times(1)
            .returning(|_| Ok(()));

        let mut poller = SensorPoller::new(source, publisher, Duration::from_millis(100));
        let reading = poller.poll_once().await.unwrap();

        assert_eq!(
            reading,
            SensorReading {
                ultrasonic_reading: 42.0,
                light_level: 300.0
            }
        );
    }

    #[tokio::test]
    async fn test_read_failure_skips_publish() {
        let mut source = MockSensorSource::new();
        source.expect_read_distance().returning(|| {
            Err(SensorError::ReadFailed {
                channel: "ultrasonic".to_string(),
                message: "no echo".to_string(),
            })
        });

        let mut publisher = MockPublisher::new();
        publisher.expect_publish_sensor().times(0);

        let mut poller = SensorPoller::new(source, publisher, Duration::from_millis(100));
        assert!(matches!(poller.poll_once().await, Err(PollError::Sensor(_))));
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported_not_retried() {
        let mut source = MockSensorSource::new();
        source.expect_read_distance().returning(|| Ok(80.0));
        source.expect_read_light().returning(|| Ok(410.0));

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish_sensor()
            .times(1)
            .returning(|_| Err(PublishError::Timeout));

        let mut poller = SensorPoller::new(source, publisher, Duration::from_millis(100));
        assert!(matches!(
            poller.poll_once().await,
            Err(PollError::Publish(PublishError::Timeout))
        ));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish_sensor().returning(|_| Ok(()));

        let poller = SensorPoller::new(SimulatedSensor::new(), publisher, Duration::from_millis(5));
        poller.run(tokio::time::sleep(Duration::from_millis(30))).await;
    }

    #[test]
    fn test_simulated_sensor_stays_in_range() {
        let mut sensor = SimulatedSensor::new();
        for _ in 0..1000 {
            let distance = sensor.read_distance().unwrap();
            let light = sensor.read_light().unwrap();
            assert!((31.0..=150.0).contains(&distance));
            assert!((300.0..800.0).contains(&light));
        }
    }
}
