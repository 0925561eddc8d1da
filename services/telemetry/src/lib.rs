//! Perimeter Telemetry Service
//!
//! Ingestion and retrieval service for the Perimeter security dashboard.
//! Sensor boards post ultrasonic distance and light readings, the webcam
//! detector posts face snapshots, and the dashboard polls both streams back
//! out together with a derived intrusion status.
//!
//! ## Features
//!
//! - **Schema Validation**: Required keys and field types are checked per
//!   stream; missing timestamps are stamped at ingestion
//! - **Configurable Retention**: Each stream keeps either a bounded history
//!   (oldest evicted first) or only its latest record
//! - **Intrusion Status**: Distance, light and face-confidence thresholds
//!   evaluated over the latest records
//!
//! ## Architecture
//!
//! ```text
//!  Sensor poller        Face detector            Dashboard
//! ┌──────────────┐    ┌──────────────┐       ┌──────────────┐
//! │ POST         │    │ POST         │       │ GET          │
//! │ /api/sensors │    │ /api/faces   │       │ /api/*       │
//! └──────────────┘    └──────────────┘       └──────────────┘
//!        │                   │                      ▲
//!        ▼                   ▼                      │
//! ┌─────────────────────────────────┐      ┌──────────────┐
//! │ Ingestion Service (validate)    │      │ Query Service│
//! └─────────────────────────────────┘      └──────────────┘
//!        │                   │                      │
//!        ▼                   ▼                      │
//! ┌──────────────┐    ┌──────────────┐              │
//! │ sensors      │    │ faces        │──────────────┘
//! │ store        │    │ store        │
//! └──────────────┘    └──────────────┘
//! ```

pub mod api;
pub mod assessment;
pub mod config;
pub mod ingestion;
pub mod query;
pub mod record;
pub mod store;

pub use api::{create_router, AppState};
pub use assessment::{Assessment, IntrusionPolicy, IntrusionPolicyBuilder};
pub use config::Config;
pub use ingestion::{Ack, IngestionService};
pub use query::QueryService;
pub use record::{Record, Stream, ValidationError};
pub use store::{BoundedEventLog, LatestStateCell, RetentionMode, Snapshot, StreamStore, StreamStores};
