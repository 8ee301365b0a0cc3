//! CLI for the hygrolog sensor reading store.
//!
//! Provides commands for inspecting a store, querying and aggregating
//! readings, and running the MQTT ingest consumer.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use hygrolog::query::{AggregateMode, Aggregated, DateFilter, Metric, QueryEngine};
use hygrolog::reading::{format_timestamp, parse_timestamp};
use hygrolog::store::CsvStore;
use hygrolog::HygrologError;

/// Retention horizon applied when none is given.
const DEFAULT_HORIZON: &str = "2025-07-01 00:00:00";

/// hygrolog — append-only sensor reading store.
#[derive(Parser)]
#[command(name = "hygrolog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a store: row counts, masked duplicates, date span.
    Info {
        /// Path to the store file.
        store_path: PathBuf,
    },

    /// Query and aggregate readings from a store.
    Query {
        /// Path to the store file.
        store_path: PathBuf,

        /// Inclusive start date (YYYY-MM-DD); defaults to the earliest
        /// date present.
        #[arg(long)]
        start: Option<String>,

        /// Inclusive end date (YYYY-MM-DD); defaults to the latest
        /// date present.
        #[arg(long)]
        end: Option<String>,

        /// Metrics to include, comma separated.
        #[arg(long, value_delimiter = ',', default_value = "temperature,humidity")]
        metrics: Vec<String>,

        /// Aggregation mode.
        #[arg(long, value_enum, default_value_t = Mode::Raw)]
        mode: Mode,

        /// Retention horizon (YYYY-MM-DD HH:MM:SS); readings before
        /// this instant are excluded.
        #[arg(long, default_value = DEFAULT_HORIZON)]
        horizon: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },

    /// Run the MQTT ingest consumer until interrupted.
    #[cfg(feature = "mqtt")]
    Ingest {
        /// Path to the JSON configuration file.
        #[arg(long)]
        config: PathBuf,
    },
}

/// Aggregation mode flag.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Filtered readings ordered by timestamp.
    Raw,
    /// One row per (timestamp, metric, value).
    Long,
    /// Hourly mean per (hour, metric).
    Hourly,
}

impl From<Mode> for AggregateMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Raw => Self::Raw,
            Mode::Long => Self::Long,
            Mode::Hourly => Self::Hourly,
        }
    }
}

/// Output format for query results.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array of objects.
    Json,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { store_path } => cmd_info(&store_path),
        Commands::Query {
            store_path,
            start,
            end,
            metrics,
            mode,
            horizon,
            format,
        } => cmd_query(
            &store_path,
            start.as_deref(),
            end.as_deref(),
            &metrics,
            mode,
            &horizon,
            format,
        ),
        #[cfg(feature = "mqtt")]
        Commands::Ingest { config } => cmd_ingest(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `hygrolog info <store_path>`.
fn cmd_info(store_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let store = CsvStore::new(store_path);
    let readings = store.load_all()?;
    let masked = store.masked_duplicates()?;

    println!("Store: {}", store_path.display());
    println!();
    println!("Distinct readings: {}", readings.len());
    println!("Masked duplicate rows: {masked}");

    if let (Some(first), Some(last)) = (
        readings.iter().map(|r| r.timestamp).min(),
        readings.iter().map(|r| r.timestamp).max(),
    ) {
        println!(
            "Span: {} .. {}",
            format_timestamp(first),
            format_timestamp(last)
        );
    }

    let with_temperature = readings.iter().filter(|r| r.temperature.is_some()).count();
    let with_humidity = readings.iter().filter(|r| r.humidity.is_some()).count();
    println!("With temperature: {with_temperature}");
    println!("With humidity: {with_humidity}");

    Ok(())
}

/// Implements `hygrolog query <store_path>`.
#[allow(clippy::too_many_arguments)]
fn cmd_query(
    store_path: &PathBuf,
    start: Option<&str>,
    end: Option<&str>,
    metric_names: &[String],
    mode: Mode,
    horizon: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let horizon = parse_timestamp(horizon)
        .ok_or_else(|| format!("invalid horizon '{horizon}' (expected YYYY-MM-DD HH:MM:SS)"))?;

    let filter = DateFilter {
        start: start.map(parse_date).transpose()?,
        end: end.map(parse_date).transpose()?,
    };

    let metrics = metric_names
        .iter()
        .map(|name| Metric::from_str(name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut engine = QueryEngine::new(CsvStore::new(store_path), horizon);

    let aggregated = match engine.get_aggregated(&filter, mode.into(), &metrics) {
        Ok(aggregated) => aggregated,
        // Usage conditions get a hint on stderr, not a failure exit.
        Err(HygrologError::Query(e)) if e.is_usage() => {
            eprintln!("{e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match (format, aggregated) {
        (OutputFormat::Csv, Aggregated::Raw(rows)) => {
            println!("timestamp,temperature,humidity");
            for r in &rows {
                println!(
                    "{},{},{}",
                    format_timestamp(r.timestamp),
                    r.temperature.map(|v| v.to_string()).unwrap_or_default(),
                    r.humidity.map(|v| v.to_string()).unwrap_or_default(),
                );
            }
        }
        (OutputFormat::Csv, Aggregated::Long(points) | Aggregated::Hourly(points)) => {
            println!("timestamp,metric,value");
            for p in &points {
                println!("{},{},{}", format_timestamp(p.timestamp), p.metric, p.value);
            }
        }
        (OutputFormat::Json, Aggregated::Raw(rows)) => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        (OutputFormat::Json, Aggregated::Long(points) | Aggregated::Hourly(points)) => {
            println!("{}", serde_json::to_string_pretty(&points)?);
        }
    }

    Ok(())
}

/// Implements `hygrolog ingest --config <file>`.
#[cfg(feature = "mqtt")]
fn cmd_ingest(config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    use hygrolog::ingest::{Consumer, ShutdownSignal};
    use hygrolog::mqtt::MqttIngestor;
    use hygrolog::Config;

    let config = Config::load(config_path)?;

    tracing::info!(
        broker = %config.broker.address(),
        topic = %config.broker.topic,
        store = %config.store_path.display(),
        "starting ingest"
    );

    let mut consumer = Consumer::new(CsvStore::new(&config.store_path));
    let shutdown = ShutdownSignal::new();

    let stats = MqttIngestor::new(config.broker).run(&mut consumer, &shutdown)?;

    tracing::info!(
        appended = stats.appended,
        malformed = stats.malformed,
        incomplete = stats.incomplete,
        "ingest finished"
    );

    Ok(())
}

/// Parses a calendar date flag.
fn parse_date(s: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{s}' (expected YYYY-MM-DD)").into())
}
