//! Ingest consumer: turns inbound message payloads into appended
//! readings.
//!
//! The consumer is deliberately transport-agnostic. [`Consumer::run`]
//! drives a long-lived blocking loop over an injected channel of raw
//! payloads, so the full decode/validate/append path is exercisable in
//! tests with synthetic messages; the MQTT transport (feature `mqtt`)
//! feeds the same [`Consumer::handle_payload`] entry point.
//!
//! Per-message discipline: each payload is handled to completion —
//! decoded, validated, and durably appended — before the next one is
//! looked at. Payload problems are skipped and logged, never fatal.
//! Append failures are the opposite: they propagate, because silently
//! dropping a successfully parsed reading would violate the
//! durability contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};

use crate::error::Result;
use crate::reading::{decode_payload, Decoded, Reading, RejectReason};
use crate::store::CsvStore;

/// How long the run loop waits for a message before re-checking the
/// shutdown signal.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Outcome of handling a single payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The payload was valid and its reading was durably appended.
    Appended,
    /// The payload was not a well-formed JSON object; skipped.
    SkippedMalformed,
    /// The payload decoded but a required field was absent, null, or
    /// non-numeric; skipped.
    SkippedIncomplete,
}

/// Counters for a consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Readings durably appended.
    pub appended: u64,
    /// Payloads skipped as malformed.
    pub malformed: u64,
    /// Payloads skipped as incomplete.
    pub incomplete: u64,
}

impl IngestStats {
    /// Total messages handled, accepted or not.
    pub fn handled(&self) -> u64 {
        self.appended + self.malformed + self.incomplete
    }
}

/// Cloneable cancellation signal for the consumer loop.
///
/// Trigger it from any thread; the run loop notices within one poll
/// interval and exits after the in-flight message completes.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The ingest consumer: single writer of the store.
///
/// Exactly one consumer instance may append to a given store at a
/// time; the one-row-per-append atomicity of [`CsvStore`] relies on
/// there being a single writer.
pub struct Consumer {
    /// The store being appended to.
    store: CsvStore,
    /// Clock used to stamp accepted readings. Injectable for tests.
    clock: Box<dyn Fn() -> NaiveDateTime + Send>,
}

impl Consumer {
    /// Creates a consumer stamping readings with the local wall clock,
    /// truncated to second resolution.
    pub fn new(store: CsvStore) -> Self {
        Self::with_clock(store, Box::new(now_local_seconds))
    }

    /// Creates a consumer with an injected clock.
    ///
    /// Tests use this to make arrival timestamps deterministic.
    pub fn with_clock(store: CsvStore, clock: Box<dyn Fn() -> NaiveDateTime + Send>) -> Self {
        Self { store, clock }
    }

    /// Returns the store this consumer appends to.
    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    /// Handles one payload: decode, validate, and append if valid.
    ///
    /// The reading's timestamp is assigned from the consumer's clock
    /// at this moment, not taken from the sensor. Rejected payloads
    /// are logged together with the raw payload for diagnosis and
    /// reported through the [`Disposition`] — they are never errors.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Append`] (or `Open`) when
    /// the durable append fails; the message must then be treated as
    /// unhandled by the caller.
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<Disposition> {
        match decode_payload(payload) {
            Decoded::Valid {
                temperature,
                humidity,
            } => {
                let reading = Reading::new((self.clock)(), Some(temperature), Some(humidity));
                self.store.append(&reading)?;
                tracing::debug!(
                    timestamp = %crate::reading::format_timestamp(reading.timestamp),
                    temperature,
                    humidity,
                    "appended reading"
                );
                Ok(Disposition::Appended)
            }
            Decoded::Rejected(reason) => {
                tracing::warn!(
                    payload = %String::from_utf8_lossy(payload),
                    %reason,
                    "skipping payload"
                );
                Ok(match reason {
                    RejectReason::Malformed { .. } => Disposition::SkippedMalformed,
                    RejectReason::Incomplete { .. } => Disposition::SkippedIncomplete,
                })
            }
        }
    }

    /// Runs the blocking consume loop until shutdown or the channel
    /// closes.
    ///
    /// Messages are handled strictly one at a time in delivery order.
    /// The loop exits cleanly when `shutdown` is triggered (after the
    /// in-flight message completes) or when every sender is dropped.
    ///
    /// # Errors
    ///
    /// Stops and propagates the first append failure; everything
    /// handled before it is already durable.
    pub fn run(
        &mut self,
        messages: &Receiver<Vec<u8>>,
        shutdown: &ShutdownSignal,
    ) -> Result<IngestStats> {
        let mut stats = IngestStats::default();

        loop {
            if shutdown.is_triggered() {
                tracing::info!(appended = stats.appended, "consumer shutting down");
                break;
            }

            match messages.recv_timeout(POLL_INTERVAL) {
                Ok(payload) => match self.handle_payload(&payload)? {
                    Disposition::Appended => stats.appended += 1,
                    Disposition::SkippedMalformed => stats.malformed += 1,
                    Disposition::SkippedIncomplete => stats.incomplete += 1,
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!(appended = stats.appended, "message source closed");
                    break;
                }
            }
        }

        Ok(stats)
    }
}

/// Local wall-clock time truncated to whole seconds.
fn now_local_seconds() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
