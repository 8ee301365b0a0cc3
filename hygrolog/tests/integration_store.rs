//! Integration tests for store durability across process lifetimes.

use hygrolog::reading::{parse_timestamp, Reading};
use hygrolog::store::CsvStore;
use tempfile::tempdir;

fn ts(s: &str) -> chrono::NaiveDateTime {
    parse_timestamp(s).unwrap()
}

#[test]
fn test_store_survives_restart_without_header_duplication() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("readings.csv");

    // First "process": create the store and append.
    {
        let store = CsvStore::new(&path);
        for minute in 0..5 {
            store
                .append(&Reading::new(
                    ts(&format!("2025-07-14 10:0{minute}:00")),
                    Some(20.0 + f64::from(minute)),
                    Some(45.0),
                ))
                .unwrap();
        }
    }

    // Second "process": reopen and keep appending.
    {
        let store = CsvStore::new(&path);
        store
            .append(&Reading::new(ts("2025-07-14 10:05:00"), Some(25.0), Some(46.0)))
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 6);
        assert_eq!(loaded[0].timestamp, ts("2025-07-14 10:00:00"));
        assert_eq!(loaded[5].timestamp, ts("2025-07-14 10:05:00"));
    }

    // Exactly one header, no truncation.
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents
            .lines()
            .filter(|l| *l == hygrolog::store::HEADER)
            .count(),
        1
    );
    assert_eq!(contents.lines().count(), 7);
}

#[test]
fn test_duplicates_accumulate_on_disk_but_stay_masked() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("readings.csv"));

    let stamp = ts("2025-07-14 10:00:00");
    store
        .append(&Reading::new(stamp, Some(20.0), Some(45.0)))
        .unwrap();
    store
        .append(&Reading::new(stamp, Some(21.0), Some(46.0)))
        .unwrap();
    store
        .append(&Reading::new(stamp, Some(22.0), Some(47.0)))
        .unwrap();

    // The file grows with every append...
    assert_eq!(store.masked_duplicates().unwrap(), 2);

    // ...but loads surface only the first-appended values.
    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].temperature, Some(20.0));

    // Masking is stable across repeated loads.
    assert_eq!(store.load_all().unwrap(), loaded);
}

#[test]
fn test_load_tolerates_hand_edited_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("readings.csv");

    // A file with a header, a good row, a corrupt numeric cell, a
    // corrupt timestamp, and a blank line.
    std::fs::write(
        &path,
        "timestamp,temperature,humidity\n\
         2025-07-14 10:00:00,20,45\n\
         2025-07-14 10:01:00,??,45\n\
         yesterday,20,45\n\
         \n\
         2025-07-14 10:02:00,22,47\n",
    )
    .unwrap();

    let store = CsvStore::new(&path);
    let loaded = store.load_all().unwrap();

    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0].temperature, Some(20.0));
    assert_eq!(loaded[1].temperature, None); // coerced, record kept
    assert_eq!(loaded[1].humidity, Some(45.0));
    assert_eq!(loaded[2].timestamp, ts("2025-07-14 10:02:00"));
}
