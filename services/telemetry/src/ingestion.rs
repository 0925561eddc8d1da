use crate::record::{validate, Stream, ValidationError};
use crate::store::{RetentionMode, StreamStores};
use metrics::{counter, gauge};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Acknowledgement of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Validates incoming records and writes them into their stream's store.
///
/// All-or-nothing: a record that fails validation leaves storage untouched.
#[derive(Clone)]
pub struct IngestionService {
    stores: StreamStores,
}

impl IngestionService {
    pub fn new(stores: StreamStores) -> Self {
        Self { stores }
    }

    #[instrument(skip_all, fields(stream = %stream))]
    pub fn ingest(&self, stream: Stream, raw: Value) -> Result<Ack, ValidationError> {
        let record = match validate(stream, raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Rejected record");
                counter!(
                    "telemetry_records_rejected_total",
                    "stream" => stream.as_str(),
                    "reason" => e.kind()
                )
                .increment(1);
                return Err(e);
            }
        };

        let timestamp = record.timestamp().to_string();
        let store = self.stores.get(stream);

        let displaced = store.insert(record);
        if displaced.is_some() && self.stores.mode() == RetentionMode::Bounded {
            counter!("telemetry_records_evicted_total", "stream" => stream.as_str()).increment(1);
        }

        let stored = store.len();
        counter!("telemetry_records_ingested_total", "stream" => stream.as_str()).increment(1);
        gauge!("telemetry_records_stored", "stream" => stream.as_str()).set(stored as f64);

        debug!(timestamp = %timestamp, stored, "Stored record");

        Ok(Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Snapshot;
    use serde_json::json;

    fn service(mode: RetentionMode, capacity: usize) -> (IngestionService, StreamStores) {
        let stores = StreamStores::new(mode, capacity);
        (IngestionService::new(stores.clone()), stores)
    }

    #[test]
    fn test_valid_record_is_stored_with_timestamp() {
        let (ingestion, stores) = service(RetentionMode::Bounded, 50);

        let ack = ingestion
            .ingest(Stream::Sensors, json!({"ultrasonic_reading": 42, "light_level": 300}))
            .unwrap();
        assert_eq!(ack, Ack);

        let stored = stores.get(Stream::Sensors).latest().unwrap();
        assert_eq!(stored.number("light_level"), Some(300.0));
        assert!(crate::record::parse_timestamp(stored.timestamp()).is_some());
    }

    #[test]
    fn test_rejected_record_leaves_storage_unchanged() {
        let (ingestion, stores) = service(RetentionMode::Bounded, 50);
        ingestion
            .ingest(Stream::Sensors, json!({"ultrasonic_reading": 1, "light_level": 2}))
            .unwrap();
        let before = stores.get(Stream::Sensors).snapshot();

        let err = ingestion
            .ingest(Stream::Sensors, json!({"ultrasonic_reading": 1}))
            .unwrap_err();

        assert_eq!(err, ValidationError::MissingFields(vec!["light_level".to_string()]));
        assert_eq!(stores.get(Stream::Sensors).snapshot(), before);
    }

    #[test]
    fn test_streams_do_not_share_storage() {
        let (ingestion, stores) = service(RetentionMode::Latest, 50);
        ingestion
            .ingest(Stream::Sensors, json!({"ultrasonic_reading": 1, "light_level": 2}))
            .unwrap();

        assert_eq!(stores.get(Stream::Faces).snapshot(), Snapshot::Latest(None));
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let (ingestion, stores) = service(RetentionMode::Bounded, 3);
        for n in 0..5 {
            ingestion
                .ingest(Stream::Sensors, json!({"ultrasonic_reading": n, "light_level": 0}))
                .unwrap();
        }

        assert_eq!(stores.get(Stream::Sensors).len(), 3);
        let oldest = match stores.get(Stream::Sensors).snapshot() {
            Snapshot::Log(records) => records[0].number("ultrasonic_reading"),
            other => panic!("Expected log snapshot, got {:?}", other),
        };
        assert_eq!(oldest, Some(2.0));
    }
}
