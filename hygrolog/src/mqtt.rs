//! MQTT transport feeding the ingest consumer.
//!
//! Maintains one subscription on one topic and hands every delivered
//! payload to [`Consumer::handle_payload`]. Connection failures are
//! retried with bounded exponential backoff; a broker that keeps
//! rejecting the connection surfaces as a [`TransportError`] carrying
//! the rejection reason.
//!
//! This module is only available when the `mqtt` feature is enabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use hygrolog::config::BrokerConfig;
//! use hygrolog::ingest::{Consumer, ShutdownSignal};
//! use hygrolog::mqtt::MqttIngestor;
//! use hygrolog::store::CsvStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let broker: BrokerConfig = serde_json::from_str(
//! #     r#"{"host": "192.168.0.11", "topic": "esp32/dht11/data"}"#)?;
//! let mut consumer = Consumer::new(CsvStore::new("readings.csv"));
//! let shutdown = ShutdownSignal::new();
//!
//! let ingestor = MqttIngestor::new(broker);
//! let stats = ingestor.run(&mut consumer, &shutdown)?;
//! println!("appended {} readings", stats.appended);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use rumqttc::{Client, ConnectReturnCode, Event, MqttOptions, Packet, QoS};

use crate::config::BrokerConfig;
use crate::error::{Result, TransportError};
use crate::ingest::{Consumer, Disposition, IngestStats, ShutdownSignal};

/// First retry delay after a connection error.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Ceiling for the doubling backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Consecutive connection errors tolerated before giving up.
const MAX_ATTEMPTS: u32 = 5;

/// Event-loop capacity for the MQTT client.
const CLIENT_CAPACITY: usize = 64;

/// Blocking MQTT subscription driving a [`Consumer`].
#[derive(Debug, Clone)]
pub struct MqttIngestor {
    /// Broker connection settings.
    config: BrokerConfig,
}

impl MqttIngestor {
    /// Creates an ingestor for the given broker.
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    /// Connects, subscribes, and consumes until shutdown.
    ///
    /// The topic is subscribed on every successful ConnAck, so a
    /// reconnect re-establishes the subscription. Each publish is
    /// handled to completion before the next event is polled.
    /// Triggering `shutdown` disconnects and returns the stats
    /// accumulated so far; shutdown is noticed on the next inbound
    /// event (at the latest a keep-alive ping).
    ///
    /// # Errors
    ///
    /// - [`TransportError::Connect`] if the broker rejects the
    ///   connection or stays unreachable past the retry budget
    /// - [`TransportError::ConnectionLost`] if an established
    ///   connection drops and cannot be recovered
    /// - [`TransportError::Subscribe`] if the subscription fails
    /// - [`crate::error::StoreError`] if an append fails — the
    ///   in-flight message is then unhandled and the loop stops
    pub fn run(&self, consumer: &mut Consumer, shutdown: &ShutdownSignal) -> Result<IngestStats> {
        let broker = self.config.address();

        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));
        if let (Some(username), Some(password)) =
            (&self.config.username, &self.config.password)
        {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut connection) = Client::new(options, CLIENT_CAPACITY);

        let mut stats = IngestStats::default();
        let mut ever_connected = false;
        let mut attempts = 0u32;
        let mut backoff = INITIAL_BACKOFF;

        for event in connection.iter() {
            if shutdown.is_triggered() {
                tracing::info!(broker = %broker, appended = stats.appended, "disconnecting");
                let _ = client.disconnect();
                break;
            }

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(TransportError::Connect {
                            broker,
                            reason: format!("broker rejected connection: {:?}", ack.code),
                        }
                        .into());
                    }

                    ever_connected = true;
                    attempts = 0;
                    backoff = INITIAL_BACKOFF;

                    client
                        .subscribe(&self.config.topic, QoS::AtMostOnce)
                        .map_err(|e| TransportError::Subscribe {
                            topic: self.config.topic.clone(),
                            reason: e.to_string(),
                        })?;
                    tracing::info!(broker = %broker, topic = %self.config.topic, "subscribed");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match consumer.handle_payload(&publish.payload)? {
                        Disposition::Appended => stats.appended += 1,
                        Disposition::SkippedMalformed => stats.malformed += 1,
                        Disposition::SkippedIncomplete => stats.incomplete += 1,
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        let reason = e.to_string();
                        return Err(if ever_connected {
                            TransportError::ConnectionLost { broker, reason }
                        } else {
                            TransportError::Connect { broker, reason }
                        }
                        .into());
                    }

                    tracing::warn!(
                        broker = %broker,
                        attempt = attempts,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "connection error, retrying"
                    );
                    std::thread::sleep(backoff);
                    backoff = next_backoff(backoff);
                }
            }
        }

        Ok(stats)
    }
}

/// Doubles the backoff up to [`MAX_BACKOFF`].
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
