//! Configuration management for Battery Reserve
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. Behaviour is fixed per deployment; there are
//! no command-line flags.

use crate::error::{ReserveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time-series source connection
    pub influx: InfluxConfig,

    /// Series names and expected shapes
    pub series: SeriesConfig,

    /// Optional regression step
    pub model: ModelConfig,

    /// Daylight window and cover column
    pub daylight: DaylightConfig,

    /// Cover-to-target mapping
    pub heuristic: HeuristicConfig,

    /// Control broker connection
    pub broker: BrokerConfig,

    /// Device setting topics
    pub topics: TopicsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Compute and log the decision without contacting the broker
    pub dry_run: bool,
}

/// InfluxDB 1.x HTTP query endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// Base URL, e.g. http://localhost:8086
    pub url: String,

    /// Database (bucket) holding the forecast measurements
    pub database: String,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Named series and their expected cardinality
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Current-day hourly forecast measurement
    pub daily_forecast: String,

    /// Number of hourly rows the current-day forecast must contain
    pub expected_daily_rows: usize,

    /// Historical forecast measurement (model features)
    pub forecast_history: String,

    /// Historical generation measurement (model labels)
    pub generation_history: String,

    /// Look-back window for the historical series in days
    pub history_days: u32,
}

/// Regression step configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Replace the raw forecast cover with model predictions
    pub enabled: bool,

    /// Forecast columns used as features, in order
    pub feature_columns: Vec<String>,

    /// Label column of the generation history, expressed in percent (0..100)
    pub label_column: String,

    /// Ridge regularisation added to the normal equations
    pub ridge: f64,
}

/// How the sunset boundary hour is weighted.
///
/// `Remaining` reproduces the reference figures (14:30/15:15 weighs 0.5/0.75,
/// 06:00-09:00 over covers 10..40 averages 25); `Elapsed` counts only the
/// daylight part of the sunset hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunsetWeighting {
    /// Fraction of the hour before sunset: `minute / 60`
    Elapsed,
    /// Same rule as sunrise: `(60 - minute) / 60`
    Remaining,
}

/// Daylight aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaylightConfig {
    /// CSV sun table with one row per day
    pub sun_table: String,

    /// Forecast column aggregated over the daylight window
    pub cover_column: String,

    pub sunset_weighting: SunsetWeighting,
}

/// Target heuristic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Battery percentage added per percent of cover above the floor
    pub slope: f64,

    /// Minimum reserve, also the cover level below which the floor applies
    pub floor_pct: f64,
}

/// Control broker connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,

    /// MQTT client id; generated per run when empty
    pub client_id: String,

    pub username: Option<String>,
    pub password: Option<String>,

    pub keep_alive_secs: u64,

    /// Connect timeout handed to the transport
    pub connect_timeout_secs: u64,

    /// Maximum wait for any acknowledgment
    pub ack_timeout_secs: u64,
}

/// Device setting topics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Optional prefix joined with '/'
    pub prefix: String,

    /// Charge target topic (integer percentage)
    pub charge_target: String,

    /// Stop-discharge floor topic (integer percentage)
    pub discharge_floor: String,

    /// Grid charge enable topic (literal "true")
    pub grid_charge: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console level override
    pub console_level: Option<String>,

    /// Optional file level override
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl TopicsConfig {
    /// Full topic name for a setting
    pub fn topic(&self, name: &str) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first existing default location
    pub fn load() -> Result<Self> {
        let default_paths = [
            "battery_reserve.yaml",
            "/data/battery_reserve.yaml",
            "/etc/battery-reserve/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.influx.url.is_empty() {
            return Err(ReserveError::validation("influx.url", "URL cannot be empty"));
        }

        if self.influx.database.is_empty() {
            return Err(ReserveError::validation(
                "influx.database",
                "Database cannot be empty",
            ));
        }

        if self.influx.timeout_secs == 0 {
            return Err(ReserveError::validation(
                "influx.timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.series.expected_daily_rows == 0 {
            return Err(ReserveError::validation(
                "series.expected_daily_rows",
                "Must be greater than 0",
            ));
        }

        if self.model.enabled && self.model.feature_columns.is_empty() {
            return Err(ReserveError::validation(
                "model.feature_columns",
                "At least one feature column is required when the model is enabled",
            ));
        }

        if !(self.model.ridge >= 0.0 && self.model.ridge.is_finite()) {
            return Err(ReserveError::validation(
                "model.ridge",
                "Must be a finite non-negative number",
            ));
        }

        if self.daylight.cover_column.is_empty() {
            return Err(ReserveError::validation(
                "daylight.cover_column",
                "Cover column cannot be empty",
            ));
        }

        if !(self.heuristic.slope > 0.0 && self.heuristic.slope <= 1.0) {
            return Err(ReserveError::validation(
                "heuristic.slope",
                "Must be in (0, 1]",
            ));
        }

        if !(0.0..=100.0).contains(&self.heuristic.floor_pct) {
            return Err(ReserveError::validation(
                "heuristic.floor_pct",
                "Must be in [0, 100]",
            ));
        }

        if self.broker.host.is_empty() {
            return Err(ReserveError::validation(
                "broker.host",
                "Host cannot be empty",
            ));
        }

        if self.broker.port == 0 {
            return Err(ReserveError::validation(
                "broker.port",
                "Port must be greater than 0",
            ));
        }

        if self.broker.connect_timeout_secs == 0 || self.broker.ack_timeout_secs == 0 {
            return Err(ReserveError::validation(
                "broker.timeouts",
                "Connect and ack timeouts must be greater than 0",
            ));
        }

        for (field, topic) in [
            ("topics.charge_target", &self.topics.charge_target),
            ("topics.discharge_floor", &self.topics.discharge_floor),
            ("topics.grid_charge", &self.topics.grid_charge),
        ] {
            if topic.is_empty() {
                return Err(ReserveError::validation(field, "Topic cannot be empty"));
            }
        }

        crate::logging::parse_log_level(&self.logging.level)?;

        Ok(())
    }
}
