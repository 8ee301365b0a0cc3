//! # hygrolog
//!
//! Append-only sensor reading store with MQTT ingestion and a
//! query/aggregation engine.
//!
//! hygrolog ingests periodic temperature/humidity readings published
//! by a remote sensor over MQTT, persists them durably in an
//! append-only CSV file, and exposes a query interface that a
//! dashboard, CLI, or API can use to filter, resample, and retrieve
//! the readings.
//!
//! ## Key Properties
//!
//! - Single writer, many readers: the ingest consumer is the only
//!   component that appends; queries take fresh full snapshots
//! - Atomic one-row appends — readers never observe a partial row
//! - Duplicate timestamps are masked at load time (first occurrence
//!   wins), never rejected at write time
//! - Bad payloads and bad rows degrade (skip, coerce to missing),
//!   they never crash ingestion or queries
//! - The broker transport is optional (`mqtt` feature); the consumer
//!   is fully testable with synthetic messages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hygrolog::query::{AggregateMode, DateFilter, Metric, QueryEngine};
//! use hygrolog::store::CsvStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CsvStore::new("final_merged_sensor_data.csv");
//! let horizon = hygrolog::reading::parse_timestamp("2025-07-01 00:00:00").unwrap();
//! let mut engine = QueryEngine::new(store, horizon);
//!
//! let rows = engine.get_aggregated(
//!     &DateFilter::default(),
//!     AggregateMode::Hourly,
//!     &[Metric::Temperature, Metric::Humidity],
//! )?;
//! println!("{} hourly rows", rows.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`reading`] — the Reading data model and payload decoding
//! - [`store`] — append-only CSV persistence
//! - [`ingest`] — the consumer loop turning messages into appends
//! - [`query`] — filtering, projection, and aggregation
//! - [`cache`] — generation-counted snapshot cache
//! - [`config`] — configuration surface
//! - [`mqtt`] — MQTT transport (feature `mqtt`)
//! - [`error`] — error types

pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod query;
pub mod reading;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use config::{BrokerConfig, Config};
pub use error::{HygrologError, QueryError, Result};
pub use ingest::{Consumer, Disposition, IngestStats, ShutdownSignal};
pub use query::{AggregateMode, Aggregated, DateFilter, Metric, MetricPoint, QueryEngine};
pub use reading::Reading;
pub use store::CsvStore;
