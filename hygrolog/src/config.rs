//! Configuration surface: broker, topic, store path, retention
//! horizon.
//!
//! Configuration is a JSON document loaded with serde, validated
//! before use. A minimal file looks like:
//!
//! ```json
//! {
//!   "broker": {
//!     "host": "192.168.0.11",
//!     "port": 1883,
//!     "topic": "esp32/dht11/data"
//!   },
//!   "store_path": "final_merged_sensor_data.csv",
//!   "retention_horizon": "2025-07-01 00:00:00"
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "hygrolog".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

/// Connection settings for the MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or IP address.
    pub host: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Topic to subscribe to.
    pub topic: String,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Optional username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl BrokerConfig {
    /// The broker address as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Broker connection settings.
    pub broker: BrokerConfig,

    /// Path to the append-only store file.
    pub store_path: PathBuf,

    /// Retention floor: readings before this instant are excluded
    /// from query results.
    #[serde(with = "crate::reading::timestamp_format")]
    pub retention_horizon: NaiveDateTime,
}

impl Config {
    /// Loads and validates configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Read`] if the file cannot be read
    /// - [`ConfigError::Parse`] if it is not valid JSON of this shape
    /// - [`ConfigError::Invalid`] if a field fails validation
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates field contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] with a description of the
    /// first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.broker.host.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "broker.host must not be empty".to_string(),
            }
            .into());
        }
        if self.broker.topic.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "broker.topic must not be empty".to_string(),
            }
            .into());
        }
        if self.broker.client_id.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "broker.client_id must not be empty".to_string(),
            }
            .into());
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "store_path must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HygrologError;
    use tempfile::tempdir;

    fn write_config(dir: &std::path::Path, contents: &str) -> PathBuf {
        let path = dir.join("config.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "broker": {"host": "192.168.0.11", "topic": "esp32/dht11/data"},
                "store_path": "readings.csv",
                "retention_horizon": "2025-07-01 00:00:00"
            }"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.broker.host, "192.168.0.11");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.client_id, "hygrolog");
        assert_eq!(config.broker.keep_alive_secs, 60);
        assert_eq!(config.broker.address(), "192.168.0.11:1883");
        assert_eq!(
            config.retention_horizon,
            crate::reading::parse_timestamp("2025-07-01 00:00:00").unwrap()
        );
    }

    #[test]
    fn test_load_with_credentials() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "broker": {
                    "host": "broker.local",
                    "port": 8883,
                    "topic": "sensors/room1",
                    "username": "sensor",
                    "password": "hunter2"
                },
                "store_path": "readings.csv",
                "retention_horizon": "2025-07-01 00:00:00"
            }"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.broker.username.as_deref(), Some("sensor"));
        assert_eq!(config.broker.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Config::load("/no/such/config.json");
        assert!(matches!(
            result.unwrap_err(),
            HygrologError::Config(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "{ not json }");

        let result = Config::load(&path);
        assert!(matches!(
            result.unwrap_err(),
            HygrologError::Config(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_empty_topic_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "broker": {"host": "broker.local", "topic": ""},
                "store_path": "readings.csv",
                "retention_horizon": "2025-07-01 00:00:00"
            }"#,
        );

        let result = Config::load(&path);
        assert!(matches!(
            result.unwrap_err(),
            HygrologError::Config(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let config = Config {
            broker: BrokerConfig {
                host: "broker.local".to_string(),
                port: 1883,
                topic: "sensors/room1".to_string(),
                client_id: "hygrolog".to_string(),
                username: None,
                password: None,
                keep_alive_secs: 60,
            },
            store_path: PathBuf::from("readings.csv"),
            retention_horizon: crate::reading::parse_timestamp("2025-07-01 00:00:00").unwrap(),
        };

        let json = serde_json::to_string_pretty(&config).unwrap();
        let path = write_config(dir.path(), &json);
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
