//! Error types for the hygrolog sensor reading store.

use chrono::NaiveDate;

use thiserror::Error;

/// The main error type for all hygrolog operations.
///
/// This enum covers all possible error conditions across the store,
/// the query engine, configuration loading, and the optional MQTT
/// transport.
#[derive(Error, Debug)]
pub enum HygrologError {
    /// Error on the persistence path (append or load).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error during query operation (read path).
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Error loading or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error on the broker transport.
    #[cfg(feature = "mqtt")]
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors that can occur on the persistence path.
///
/// Append failures are the durability-critical case: a successfully
/// parsed reading must never be lost silently, so every append failure
/// surfaces as a `StoreError::Append` to the caller. Load failures for
/// a missing or empty file are *not* errors — `load_all` degrades to
/// an empty snapshot instead.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store file could not be created or opened for appending.
    #[error("failed to open store file '{path}': {source}")]
    Open {
        /// The file path that could not be opened.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Appending a row to the store file failed.
    #[error("failed to append to store file '{path}': {source}")]
    Append {
        /// The file path that could not be appended to.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the store file failed for a reason other than absence.
    #[error("failed to read store file '{path}': {source}")]
    Read {
        /// The file path that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during query operations.
///
/// The first two variants are usage-level conditions rather than
/// system failures: the presentation layer is expected to match on
/// them and render a hint ("select a metric", "no data in range")
/// instead of an error page.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The caller selected no metrics at all.
    #[error("no metrics selected: choose at least one of temperature, humidity")]
    NoMetricsSelected,

    /// The filter and projection produced an empty result set.
    #[error("no data for selection between {start} and {end}")]
    NoData {
        /// Start of the effective date range.
        start: NaiveDate,
        /// End of the effective date range.
        end: NaiveDate,
    },

    /// The date range is invalid (start after end).
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// The requested start date.
        start: NaiveDate,
        /// The requested end date.
        end: NaiveDate,
    },
}

impl QueryError {
    /// Returns true for conditions caused by how the query was asked,
    /// as opposed to a failure of the engine itself.
    ///
    /// Every current variant is a usage condition; the method exists so
    /// callers don't have to hard-code that assumption.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::NoMetricsSelected | Self::NoData { .. } | Self::InvalidDateRange { .. }
        )
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// The config file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or has the wrong shape.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// The config file path.
        path: String,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration parsed but fails validation.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of what is invalid.
        reason: String,
    },
}

/// Errors that can occur on the MQTT transport.
#[cfg(feature = "mqtt")]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The broker could not be reached or rejected the connection,
    /// after all retry attempts were exhausted.
    #[error("failed to connect to broker {broker}: {reason}")]
    Connect {
        /// The broker address (host:port).
        broker: String,
        /// The rejection or connection failure reason.
        reason: String,
    },

    /// Subscribing to the topic failed.
    #[error("failed to subscribe to topic '{topic}': {reason}")]
    Subscribe {
        /// The topic that could not be subscribed to.
        topic: String,
        /// The failure reason.
        reason: String,
    },

    /// The established connection was lost and could not be recovered.
    #[error("connection to broker {broker} lost: {reason}")]
    ConnectionLost {
        /// The broker address (host:port).
        broker: String,
        /// The failure reason.
        reason: String,
    },
}

/// Type alias for `Result<T, HygrologError>`.
pub type Result<T> = std::result::Result<T, HygrologError>;
