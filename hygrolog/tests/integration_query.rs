//! Integration tests for the full ingest-then-query pipeline.

use chrono::NaiveDate;
use hygrolog::error::{HygrologError, QueryError};
use hygrolog::query::{AggregateMode, Aggregated, DateFilter, Metric, QueryEngine};
use hygrolog::reading::{parse_timestamp, Reading};
use hygrolog::store::CsvStore;
use tempfile::tempdir;

fn ts(s: &str) -> chrono::NaiveDateTime {
    parse_timestamp(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn test_query_pipeline_integration() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("readings.csv"));

    // Three days of data, two readings per hour window on the middle
    // day, plus a pre-horizon straggler and a duplicate.
    let rows = [
        ("2025-06-15 09:00:00", 15.0, 30.0), // before horizon
        ("2025-07-13 22:00:00", 18.0, 40.0),
        ("2025-07-14 10:05:00", 20.0, 44.0),
        ("2025-07-14 10:35:00", 22.0, 46.0),
        ("2025-07-14 11:10:00", 24.0, 48.0),
        ("2025-07-15 08:00:00", 19.0, 42.0),
    ];
    for (t, temperature, humidity) in rows {
        store
            .append(&Reading::new(ts(t), Some(temperature), Some(humidity)))
            .unwrap();
    }
    // Duplicate of an existing timestamp with different values.
    store
        .append(&Reading::new(ts("2025-07-14 10:05:00"), Some(99.0), Some(99.0)))
        .unwrap();

    let mut engine = QueryEngine::new(store, ts("2025-07-01 00:00:00"));

    // Horizon plus dedup: 5 records visible.
    let all = engine.get_filtered(&DateFilter::default()).unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|r| r.timestamp >= ts("2025-07-01 00:00:00")));

    // Day boundary is inclusive on both ends.
    let filter = DateFilter::between(date("2025-07-14"), date("2025-07-14"));
    let day = engine.get_filtered(&filter).unwrap();
    assert_eq!(day.len(), 3);

    // Hourly means over the selected day, both metrics.
    let Aggregated::Hourly(points) = engine
        .get_aggregated(&filter, AggregateMode::Hourly, &Metric::ALL)
        .unwrap()
    else {
        panic!("expected hourly output");
    };

    assert_eq!(points.len(), 4); // 2 hours x 2 metrics
    assert_eq!(points[0].timestamp, ts("2025-07-14 10:00:00"));
    assert_eq!(points[0].metric, Metric::Temperature);
    assert_eq!(points[0].value, 21.0); // mean of 20 and 22 — the 99 duplicate stayed masked
    assert_eq!(points[1].metric, Metric::Humidity);
    assert_eq!(points[1].value, 45.0);
    assert_eq!(points[2].timestamp, ts("2025-07-14 11:00:00"));

    // Long form over the same day.
    let Aggregated::Long(long) = engine
        .get_aggregated(&filter, AggregateMode::Long, &Metric::ALL)
        .unwrap()
    else {
        panic!("expected long output");
    };
    assert_eq!(long.len(), 6); // 3 readings x 2 metrics
}

#[test]
fn test_usage_conditions_are_distinct() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("readings.csv"));
    store
        .append(&Reading::new(ts("2025-07-14 10:00:00"), Some(20.0), Some(45.0)))
        .unwrap();

    let mut engine = QueryEngine::new(store, ts("2025-07-01 00:00:00"));

    // Empty metric selection: usage warning, checked first.
    let err = engine
        .get_aggregated(&DateFilter::default(), AggregateMode::Raw, &[])
        .unwrap_err();
    let HygrologError::Query(query_err) = err else {
        panic!("expected a query error");
    };
    assert!(matches!(query_err, QueryError::NoMetricsSelected));
    assert!(query_err.is_usage());

    // A range with no readings: a different condition, carrying the
    // requested bounds.
    let err = engine
        .get_aggregated(
            &DateFilter::between(date("2025-08-01"), date("2025-08-02")),
            AggregateMode::Raw,
            &[Metric::Temperature],
        )
        .unwrap_err();
    match err {
        HygrologError::Query(QueryError::NoData { start, end }) => {
            assert_eq!(start, date("2025-08-01"));
            assert_eq!(end, date("2025-08-02"));
        }
        other => panic!("expected NoData, got: {other:?}"),
    }
}

#[test]
fn test_missing_store_bootstrap() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("never_written.csv"));
    let mut engine = QueryEngine::new(store, ts("2025-07-01 00:00:00"));

    // Querying before any append exists is an empty sequence, not an
    // error.
    assert!(engine.get_filtered(&DateFilter::default()).unwrap().is_empty());

    // Aggregation over nothing is the NoData condition, not a crash.
    let err = engine
        .get_aggregated(&DateFilter::default(), AggregateMode::Hourly, &Metric::ALL)
        .unwrap_err();
    assert!(matches!(
        err,
        HygrologError::Query(QueryError::NoData { .. })
    ));
}

#[test]
fn test_reload_action_picks_up_new_appends() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("readings.csv"));
    store
        .append(&Reading::new(ts("2025-07-14 10:00:00"), Some(20.0), Some(45.0)))
        .unwrap();

    // Engine and writer hold independent handles to the same file,
    // like the dashboard process and the consumer process.
    let writer = CsvStore::new(store.path());
    let mut engine = QueryEngine::new(store, ts("2025-07-01 00:00:00"));

    assert_eq!(engine.get_filtered(&DateFilter::default()).unwrap().len(), 1);

    writer
        .append(&Reading::new(ts("2025-07-14 10:01:00"), Some(21.0), Some(46.0)))
        .unwrap();

    // Stale until told otherwise.
    assert_eq!(engine.get_filtered(&DateFilter::default()).unwrap().len(), 1);
    engine.invalidate_cache();
    assert_eq!(engine.get_filtered(&DateFilter::default()).unwrap().len(), 2);
}
