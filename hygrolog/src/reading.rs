//! The Reading data model and payload decoding.
//!
//! A [`Reading`] is the atomic unit of the system: one timestamped
//! temperature/humidity measurement. The timestamp is assigned by the
//! ingest consumer's clock at message-arrival time, not by the sensor,
//! and identifies the reading — the store surfaces at most one reading
//! per distinct timestamp.
//!
//! Payload decoding is strict about *shape* but tolerant about
//! *delivery*: an undecodable or incomplete payload is reported as a
//! [`Decoded::Rejected`] value rather than an error, so the consumer
//! can log and move on without ever crashing on bad input.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Fixed timestamp format used in the store file and the CLI:
/// `YYYY-MM-DD HH:MM:SS`, local time, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamped temperature/humidity measurement.
///
/// Either measurement may be missing: the load path coerces numeric
/// cells that fail to parse to `None` instead of dropping the whole
/// record. A reading is immutable once appended to the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Arrival timestamp, second resolution, assigned by the consumer.
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,

    /// Temperature in degrees Celsius, if present and numeric.
    pub temperature: Option<f64>,

    /// Relative humidity in percent, if present and numeric.
    pub humidity: Option<f64>,
}

impl Reading {
    /// Creates a new reading.
    pub fn new(
        timestamp: NaiveDateTime,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
        }
    }

    /// Returns the calendar date of this reading's timestamp.
    ///
    /// Date-range filtering operates on this value.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Returns the timestamp floored to the start of its hour.
    ///
    /// Hourly aggregation groups readings by this value.
    pub fn hour_floor(&self) -> NaiveDateTime {
        let t = self.timestamp;
        t.date().and_hms_opt(t.time().hour(), 0, 0).unwrap_or(t)
    }
}

/// Parses a timestamp in the store's fixed format.
///
/// Returns `None` if the string does not match `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

/// Formats a timestamp in the store's fixed format.
pub fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Serde adapter for the store's fixed timestamp format.
///
/// Used with `#[serde(with = "timestamp_format")]` so timestamps in
/// JSON (config files, CLI output) look exactly like the CSV column.
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    /// Serializes a timestamp as `YYYY-MM-DD HH:MM:SS`.
    pub fn serialize<S>(t: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&t.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Deserializes a timestamp from `YYYY-MM-DD HH:MM:SS`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Outcome of decoding an inbound payload.
///
/// A valid payload carries both measurements present and numeric.
/// Everything else is rejected with a reason; rejection is a normal,
/// per-message outcome that never terminates the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The payload decoded to both required numeric fields.
    Valid {
        /// Decoded temperature value.
        temperature: f64,
        /// Decoded humidity value.
        humidity: f64,
    },
    /// The payload was rejected.
    Rejected(RejectReason),
}

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The payload is not a well-formed JSON object.
    Malformed {
        /// Parser detail for diagnosis.
        detail: String,
    },
    /// The payload decoded but one or both required fields are
    /// absent, null, or non-numeric.
    Incomplete {
        /// Names of the fields that failed validation.
        missing: Vec<&'static str>,
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { detail } => write!(f, "malformed payload: {detail}"),
            Self::Incomplete { missing } => {
                write!(f, "incomplete payload: missing or non-numeric {}", missing.join(", "))
            }
        }
    }
}

/// Decodes a raw payload into both measurements, or a rejection.
///
/// The payload must be a JSON object with `temperature` and `humidity`
/// fields that are present and numeric. Integers are accepted and
/// widened to `f64`. A field that is absent, `null`, or any
/// non-numeric JSON value marks the payload incomplete — partial
/// readings are never appended.
///
/// # Examples
///
/// ```rust
/// use hygrolog::reading::{decode_payload, Decoded};
///
/// let decoded = decode_payload(br#"{"temperature": 21.5, "humidity": 48}"#);
/// assert_eq!(decoded, Decoded::Valid { temperature: 21.5, humidity: 48.0 });
/// ```
pub fn decode_payload(payload: &[u8]) -> Decoded {
    let value: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(v) => v,
        Err(e) => {
            return Decoded::Rejected(RejectReason::Malformed {
                detail: e.to_string(),
            });
        }
    };

    let Some(object) = value.as_object() else {
        return Decoded::Rejected(RejectReason::Malformed {
            detail: "payload is not a JSON object".to_string(),
        });
    };

    let temperature = object.get("temperature").and_then(serde_json::Value::as_f64);
    let humidity = object.get("humidity").and_then(serde_json::Value::as_f64);

    match (temperature, humidity) {
        (Some(temperature), Some(humidity)) => Decoded::Valid {
            temperature,
            humidity,
        },
        _ => {
            let mut missing = Vec::new();
            if temperature.is_none() {
                missing.push("temperature");
            }
            if humidity.is_none() {
                missing.push("humidity");
            }
            Decoded::Rejected(RejectReason::Incomplete { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_timestamp_round_trip() {
        let t = ts("2025-07-14 10:05:42");
        assert_eq!(format_timestamp(t), "2025-07-14 10:05:42");
        assert_eq!(parse_timestamp(&format_timestamp(t)), Some(t));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("not a timestamp").is_none());
        assert!(parse_timestamp("2025-07-14").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_hour_floor() {
        let r = Reading::new(ts("2025-07-14 10:35:59"), Some(20.0), Some(50.0));
        assert_eq!(r.hour_floor(), ts("2025-07-14 10:00:00"));
    }

    #[test]
    fn test_decode_valid_payload() {
        let decoded = decode_payload(br#"{"temperature": 21.5, "humidity": 48.2}"#);
        assert_eq!(
            decoded,
            Decoded::Valid {
                temperature: 21.5,
                humidity: 48.2
            }
        );
    }

    #[test]
    fn test_decode_integer_values() {
        // DHT sensors often publish whole numbers.
        let decoded = decode_payload(br#"{"temperature": 22, "humidity": 50}"#);
        assert_eq!(
            decoded,
            Decoded::Valid {
                temperature: 22.0,
                humidity: 50.0
            }
        );
    }

    #[test]
    fn test_decode_extra_fields_ignored() {
        let decoded =
            decode_payload(br#"{"temperature": 22, "humidity": 50, "battery": "low"}"#);
        assert!(matches!(decoded, Decoded::Valid { .. }));
    }

    #[test]
    fn test_decode_malformed_json() {
        let decoded = decode_payload(b"{not json");
        assert!(matches!(
            decoded,
            Decoded::Rejected(RejectReason::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_non_object_payload() {
        let decoded = decode_payload(b"42");
        assert!(matches!(
            decoded,
            Decoded::Rejected(RejectReason::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_missing_humidity() {
        let decoded = decode_payload(br#"{"temperature": 21.5}"#);
        assert_eq!(
            decoded,
            Decoded::Rejected(RejectReason::Incomplete {
                missing: vec!["humidity"]
            })
        );
    }

    #[test]
    fn test_decode_null_field() {
        let decoded = decode_payload(br#"{"temperature": null, "humidity": 50}"#);
        assert_eq!(
            decoded,
            Decoded::Rejected(RejectReason::Incomplete {
                missing: vec!["temperature"]
            })
        );
    }

    #[test]
    fn test_decode_non_numeric_field() {
        let decoded = decode_payload(br#"{"temperature": "warm", "humidity": 50}"#);
        assert_eq!(
            decoded,
            Decoded::Rejected(RejectReason::Incomplete {
                missing: vec!["temperature"]
            })
        );
    }

    #[test]
    fn test_decode_both_fields_missing() {
        let decoded = decode_payload(br"{}");
        assert_eq!(
            decoded,
            Decoded::Rejected(RejectReason::Incomplete {
                missing: vec!["temperature", "humidity"]
            })
        );
    }
}
