use crate::config::StorageConfig;
use crate::record::{Record, Stream};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// How much of each stream is retained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMode {
    /// Most recent `capacity` records, oldest first
    #[default]
    Bounded,
    /// Only the most recent record
    Latest,
}

/// Point-in-time copy of a stream's contents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    /// Bounded history, oldest first
    Log(Vec<Record>),
    /// Latest record, or none if nothing was ingested yet
    Latest(Option<Record>),
}

impl Snapshot {
    pub fn len(&self) -> usize {
        match self {
            Snapshot::Log(records) => records.len(),
            Snapshot::Latest(record) => usize::from(record.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent record in the snapshot
    pub fn last(&self) -> Option<&Record> {
        match self {
            Snapshot::Log(records) => records.last(),
            Snapshot::Latest(record) => record.as_ref(),
        }
    }
}

/// Storage strategy backing one stream.
///
/// Implementations lock internally; `insert` and `snapshot` never observe
/// each other half-done.
pub trait StreamStore: Send + Sync {
    /// Store a record, returning the record it displaced (evicted or replaced)
    fn insert(&self, record: Record) -> Option<Record>;

    fn snapshot(&self) -> Snapshot;

    fn latest(&self) -> Option<Record>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-capacity FIFO of records
pub struct BoundedEventLog {
    capacity: usize,
    records: Mutex<VecDeque<Record>>,
}

impl BoundedEventLog {
    /// # Panics
    ///
    /// Panics if `capacity` is zero; configuration validation rejects it first.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedEventLog capacity must be greater than 0");

        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl StreamStore for BoundedEventLog {
    fn insert(&self, record: Record) -> Option<Record> {
        let mut records = self.records.lock();
        records.push_back(record);

        if records.len() > self.capacity {
            records.pop_front()
        } else {
            None
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Log(self.records.lock().iter().cloned().collect())
    }

    fn latest(&self) -> Option<Record> {
        self.records.lock().back().cloned()
    }

    fn len(&self) -> usize {
        self.records.lock().len()
    }
}

/// Single slot holding the most recent record
#[derive(Default)]
pub struct LatestStateCell {
    current: Mutex<Option<Record>>,
}

impl LatestStateCell {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamStore for LatestStateCell {
    fn insert(&self, record: Record) -> Option<Record> {
        self.current.lock().replace(record)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Latest(self.current.lock().clone())
    }

    fn latest(&self) -> Option<Record> {
        self.current.lock().clone()
    }

    fn len(&self) -> usize {
        usize::from(self.current.lock().is_some())
    }
}

/// One store per stream, created at startup and shared for the process lifetime
#[derive(Clone)]
pub struct StreamStores {
    mode: RetentionMode,
    sensors: Arc<dyn StreamStore>,
    faces: Arc<dyn StreamStore>,
}

impl StreamStores {
    pub fn new(mode: RetentionMode, capacity: usize) -> Self {
        Self {
            mode,
            sensors: build_store(mode, capacity),
            faces: build_store(mode, capacity),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.mode, config.capacity)
    }

    pub fn mode(&self) -> RetentionMode {
        self.mode
    }

    pub fn get(&self, stream: Stream) -> &dyn StreamStore {
        match stream {
            Stream::Sensors => self.sensors.as_ref(),
            Stream::Faces => self.faces.as_ref(),
        }
    }
}

fn build_store(mode: RetentionMode, capacity: usize) -> Arc<dyn StreamStore> {
    match mode {
        RetentionMode::Bounded => Arc::new(BoundedEventLog::new(capacity)),
        RetentionMode::Latest => Arc::new(LatestStateCell::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::validate;
    use serde_json::json;

    fn reading(n: i64) -> Record {
        validate(
            Stream::Sensors,
            json!({"ultrasonic_reading": n, "light_level": n * 10}),
        )
        .unwrap()
    }

    fn readings_in(snapshot: &Snapshot) -> Vec<f64> {
        match snapshot {
            Snapshot::Log(records) => records
                .iter()
                .map(|r| r.number("ultrasonic_reading").unwrap())
                .collect(),
            Snapshot::Latest(record) => record
                .iter()
                .map(|r| r.number("ultrasonic_reading").unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_bounded_log_keeps_most_recent_in_order() {
        let log = BoundedEventLog::new(5);
        for n in 0..8 {
            log.insert(reading(n));
        }

        assert_eq!(log.len(), 5);
        assert_eq!(readings_in(&log.snapshot()), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_bounded_log_evicts_exactly_one_oldest() {
        let log = BoundedEventLog::new(2);
        assert!(log.insert(reading(1)).is_none());
        assert!(log.insert(reading(2)).is_none());

        let evicted = log.insert(reading(3)).unwrap();
        assert_eq!(evicted.number("ultrasonic_reading"), Some(1.0));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_inserts() {
        let log = BoundedEventLog::new(3);
        log.insert(reading(1));
        let before = log.snapshot();

        log.insert(reading(2));

        assert_eq!(before.len(), 1);
        assert_eq!(log.snapshot().len(), 2);
    }

    #[test]
    fn test_empty_log_snapshot() {
        let log = BoundedEventLog::new(3);
        assert_eq!(log.snapshot(), Snapshot::Log(vec![]));
        assert!(log.latest().is_none());
        assert_eq!(serde_json::to_value(log.snapshot()).unwrap(), json!([]));
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        BoundedEventLog::new(0);
    }

    #[test]
    fn test_latest_cell_replaces() {
        let cell = LatestStateCell::new();
        assert_eq!(cell.snapshot(), Snapshot::Latest(None));
        assert_eq!(serde_json::to_value(cell.snapshot()).unwrap(), json!(null));

        for n in 1..=4 {
            let record = reading(n);
            cell.insert(record.clone());
            assert_eq!(cell.snapshot(), Snapshot::Latest(Some(record)));
        }
        assert_eq!(cell.len(), 1);
    }

    #[test]
    fn test_latest_cell_returns_replaced_record() {
        let cell = LatestStateCell::new();
        assert!(cell.insert(reading(1)).is_none());
        let replaced = cell.insert(reading(2)).unwrap();
        assert_eq!(replaced.number("ultrasonic_reading"), Some(1.0));
    }

    #[test]
    fn test_stream_stores_are_independent() {
        let stores = StreamStores::new(RetentionMode::Bounded, 10);
        stores.get(Stream::Sensors).insert(reading(1));

        assert_eq!(stores.get(Stream::Sensors).len(), 1);
        assert!(stores.get(Stream::Faces).is_empty());
    }

    #[test]
    fn test_mode_selects_strategy() {
        let stores = StreamStores::new(RetentionMode::Latest, 10);
        stores.get(Stream::Sensors).insert(reading(1));
        stores.get(Stream::Sensors).insert(reading(2));

        assert!(matches!(
            stores.get(Stream::Sensors).snapshot(),
            Snapshot::Latest(Some(_))
        ));
        assert_eq!(stores.get(Stream::Sensors).len(), 1);
    }

    #[test]
    fn test_concurrent_inserts_respect_capacity() {
        let log = Arc::new(BoundedEventLog::new(50));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for n in 0..100 {
                        log.insert(reading(t * 1000 + n));
                        assert!(log.snapshot().len() <= 50);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 50);
    }
}
