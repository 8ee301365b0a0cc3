//! Query engine: filtering, projection, and aggregation over store
//! snapshots.
//!
//! The engine composes a pipeline over a fresh (or cached) snapshot:
//!
//! 1. **Load & clean** — [`CsvStore::load_all`] (deduplicated,
//!    coerced), then drop records before the retention horizon.
//! 2. **Range filter** — inclusive `[start, end]` calendar-date
//!    bounds, defaulting to the span of the cleaned data.
//! 3. **Metric projection** — a non-empty subset of
//!    {temperature, humidity}.
//! 4. **Aggregation** — raw pass-through, long-form reshape, or
//!    hourly mean.
//!
//! Usage conditions (nothing selected, nothing in range) surface as
//! distinct [`QueryError`] variants so the presentation layer can
//! render a hint instead of a failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use hygrolog::query::{AggregateMode, DateFilter, Metric, QueryEngine};
//! use hygrolog::store::CsvStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let horizon = hygrolog::reading::parse_timestamp("2025-07-01 00:00:00").unwrap();
//! let mut engine = QueryEngine::new(CsvStore::new("readings.csv"), horizon);
//!
//! let rows = engine.get_aggregated(
//!     &DateFilter::default(),
//!     AggregateMode::Hourly,
//!     &[Metric::Temperature],
//! )?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::cache::SnapshotCache;
use crate::error::{QueryError, Result};
use crate::reading::Reading;
use crate::store::CsvStore;

/// A selectable measurement column.
///
/// The derived ordering (temperature before humidity) is the canonical
/// metric order used whenever output is sorted "by metric".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Temperature in degrees Celsius.
    Temperature,
    /// Relative humidity in percent.
    Humidity,
}

impl Metric {
    /// All metrics in canonical order.
    pub const ALL: [Metric; 2] = [Metric::Temperature, Metric::Humidity];

    /// The metric's column name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        }
    }

    /// Extracts this metric's value from a reading, if present.
    pub fn value_of(self, reading: &Reading) -> Option<f64> {
        match self {
            Self::Temperature => reading.temperature,
            Self::Humidity => reading.humidity,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            other => Err(format!("unknown metric '{other}' (expected temperature or humidity)")),
        }
    }
}

/// How to aggregate the filtered, projected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    /// Pass filtered rows through unchanged, ordered by timestamp.
    Raw,
    /// Pivot to one row per (timestamp, metric, value) — the shape
    /// used for overlaying multiple metrics with a shared color
    /// encoding.
    Long,
    /// Floor timestamps to the hour and emit the arithmetic mean per
    /// (hour, metric), ordered by hour then metric.
    Hourly,
}

/// One long-form or hourly output row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPoint {
    /// Row timestamp — the reading's timestamp in long form, the
    /// floored hour in hourly form.
    #[serde(with = "crate::reading::timestamp_format")]
    pub timestamp: NaiveDateTime,
    /// Which metric this row carries.
    pub metric: Metric,
    /// The value (or hourly mean).
    pub value: f64,
}

/// Aggregation output, shaped by the requested [`AggregateMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    /// Raw readings ordered by timestamp.
    Raw(Vec<Reading>),
    /// Long-form rows ordered by timestamp then metric.
    Long(Vec<MetricPoint>),
    /// Hourly means ordered by hour then metric.
    Hourly(Vec<MetricPoint>),
}

impl Aggregated {
    /// Number of output rows regardless of shape.
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(rows) => rows.len(),
            Self::Long(rows) | Self::Hourly(rows) => rows.len(),
        }
    }

    /// Whether the output has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inclusive calendar-date bounds for a query.
///
/// Unspecified bounds default to the minimum/maximum date present in
/// the cleaned snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    /// Inclusive start date.
    pub start: Option<NaiveDate>,
    /// Inclusive end date.
    pub end: Option<NaiveDate>,
}

impl DateFilter {
    /// A filter spanning the given inclusive range.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Request-driven query pipeline over a store snapshot.
///
/// Stateless per call apart from the snapshot cache: each invocation
/// re-reads the store unless the cached snapshot is still current.
/// [`QueryEngine::invalidate_cache`] forces the next call to re-read.
#[derive(Debug)]
pub struct QueryEngine {
    /// The store being queried. Never mutated from here.
    store: CsvStore,
    /// Retention floor: records strictly before this instant are
    /// excluded from every query.
    horizon: NaiveDateTime,
    /// Cached cleaned snapshot with generation-based invalidation.
    cache: SnapshotCache,
}

impl QueryEngine {
    /// Creates an engine over `store` with the given retention horizon.
    pub fn new(store: CsvStore, horizon: NaiveDateTime) -> Self {
        Self {
            store,
            horizon,
            cache: SnapshotCache::new(),
        }
    }

    /// Returns the configured retention horizon.
    pub fn horizon(&self) -> NaiveDateTime {
        self.horizon
    }

    /// Forces the next query to re-read the store.
    ///
    /// The presentation layer calls this on its explicit "reload"
    /// action; until then queries serve the cached snapshot.
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    /// Loads the cleaned snapshot: deduplicated, coerced, and with
    /// records before the retention horizon dropped.
    fn snapshot(&mut self) -> Result<Arc<Vec<Reading>>> {
        let store = &self.store;
        let horizon = self.horizon;
        self.cache.get_or_load(|| {
            let readings = store.load_all()?;
            let kept: Vec<Reading> = readings
                .into_iter()
                .filter(|r| r.timestamp >= horizon)
                .collect();
            Ok(kept)
        })
    }

    /// Returns the cleaned readings whose date falls within the
    /// filter, in file order.
    ///
    /// An empty store (or an empty range) yields an empty vector, not
    /// an error — querying before any append exists is a normal state.
    ///
    /// # Errors
    ///
    /// - [`QueryError::InvalidDateRange`] if `start` is after `end`
    /// - [`crate::error::StoreError`] if the underlying read fails
    pub fn get_filtered(&mut self, filter: &DateFilter) -> Result<Vec<Reading>> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if start > end {
                return Err(QueryError::InvalidDateRange { start, end }.into());
            }
        }

        let snapshot = self.snapshot()?;
        let Some((start, end)) = effective_bounds(filter, &snapshot) else {
            return Ok(Vec::new());
        };

        Ok(snapshot
            .iter()
            .filter(|r| {
                let date = r.date();
                date >= start && date <= end
            })
            .copied()
            .collect())
    }

    /// Runs the full pipeline: filter, project onto `metrics`, and
    /// aggregate with `mode`.
    ///
    /// # Errors
    ///
    /// - [`QueryError::NoMetricsSelected`] if `metrics` is empty —
    ///   a usage condition, checked before anything else
    /// - [`QueryError::NoData`] if filtering and projection leave no
    ///   rows, carrying the effective date bounds
    /// - [`QueryError::InvalidDateRange`] if the filter is inverted
    /// - [`crate::error::StoreError`] if the underlying read fails
    pub fn get_aggregated(
        &mut self,
        filter: &DateFilter,
        mode: AggregateMode,
        metrics: &[Metric],
    ) -> Result<Aggregated> {
        let selected = normalize_selection(metrics);
        if selected.is_empty() {
            return Err(QueryError::NoMetricsSelected.into());
        }

        let rows = self.get_filtered(filter)?;
        let (start, end) = {
            let snapshot = self.snapshot()?;
            effective_bounds(filter, &snapshot)
                .unwrap_or_else(|| empty_bounds(filter, self.horizon.date()))
        };

        if rows.is_empty() {
            return Err(QueryError::NoData { start, end }.into());
        }

        let aggregated = match mode {
            AggregateMode::Raw => Aggregated::Raw(aggregate_raw(rows)),
            AggregateMode::Long => Aggregated::Long(reshape_long(&rows, &selected)),
            AggregateMode::Hourly => Aggregated::Hourly(aggregate_hourly(&rows, &selected)),
        };

        // Projection can still come up empty when every selected cell
        // is missing; that is "no data", not a separate condition.
        if aggregated.is_empty() {
            return Err(QueryError::NoData { start, end }.into());
        }

        Ok(aggregated)
    }
}

/// Deduplicates a metric selection into canonical order.
fn normalize_selection(metrics: &[Metric]) -> Vec<Metric> {
    Metric::ALL
        .into_iter()
        .filter(|m| metrics.contains(m))
        .collect()
}

/// Resolves filter bounds against the snapshot's date span.
///
/// Returns `None` when the snapshot is empty and a bound is
/// unspecified — the caller degrades to a "no data" state instead of
/// erroring.
fn effective_bounds(filter: &DateFilter, snapshot: &[Reading]) -> Option<(NaiveDate, NaiveDate)> {
    let min_date = snapshot.iter().map(Reading::date).min();
    let max_date = snapshot.iter().map(Reading::date).max();

    let start = filter.start.or(min_date)?;
    let end = filter.end.or(max_date)?;
    Some((start, end))
}

/// Sentinel bounds for the "no data at all" state.
fn empty_bounds(filter: &DateFilter, horizon_date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = filter.start.unwrap_or(horizon_date);
    let end = filter.end.unwrap_or(start);
    (start, end)
}

/// Raw mode: filtered rows ordered by timestamp.
fn aggregate_raw(mut rows: Vec<Reading>) -> Vec<Reading> {
    rows.sort_by_key(|r| r.timestamp);
    rows
}

/// Long-form reshape: one row per present (timestamp, metric) pair,
/// ordered by timestamp then metric.
fn reshape_long(rows: &[Reading], metrics: &[Metric]) -> Vec<MetricPoint> {
    let mut readings: Vec<&Reading> = rows.iter().collect();
    readings.sort_by_key(|r| r.timestamp);

    let mut points = Vec::new();
    for reading in readings {
        for &metric in metrics {
            if let Some(value) = metric.value_of(reading) {
                points.push(MetricPoint {
                    timestamp: reading.timestamp,
                    metric,
                    value,
                });
            }
        }
    }
    points
}

/// Hourly aggregate: arithmetic mean per (hour, metric), ordered by
/// hour then metric.
fn aggregate_hourly(rows: &[Reading], metrics: &[Metric]) -> Vec<MetricPoint> {
    let mut groups: BTreeMap<(NaiveDateTime, Metric), (f64, u32)> = BTreeMap::new();

    for reading in rows {
        let hour = reading.hour_floor();
        for &metric in metrics {
            if let Some(value) = metric.value_of(reading) {
                let entry = groups.entry((hour, metric)).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
    }

    groups
        .into_iter()
        .map(|((timestamp, metric), (sum, count))| MetricPoint {
            timestamp,
            metric,
            value: sum / f64::from(count),
        })
        .collect()
}
