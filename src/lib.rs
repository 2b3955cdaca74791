//! # Battery Reserve - forecast-driven battery reserve setter
//!
//! Decides how much of a home battery to keep in reserve for the day from the
//! cloud cover forecast, and commits that decision to the inverter over MQTT.
//!
//! ## Pipeline
//!
//! 1. Look up today's sunrise and sunset in the sun table
//! 2. Fetch the hourly forecast (and optionally history for a regression step)
//! 3. Average cover over the daylight window, weighting partial hours
//! 4. Map the average onto a bounded reserve percentage
//! 5. Publish charge target, discharge floor and grid-charge enable, in order,
//!    each only after the previous one completed
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `series`: Time series sources, shape checks and alignment
//! - `daylight`: Sun table and partial-hour weighted aggregation
//! - `model`: Regression capability used to refine the forecast
//! - `heuristic`: Cover-to-reserve mapping
//! - `dispatcher`: Ordered, acknowledged delivery over the control broker
//! - `planner` / `runner`: One end-to-end run

pub mod config;
pub mod daylight;
pub mod dispatcher;
pub mod error;
pub mod heuristic;
pub mod logging;
pub mod model;
pub mod planner;
pub mod runner;
pub mod series;

// Re-export commonly used types
pub use config::Config;
pub use error::{ReserveError, Result};
pub use runner::{RunOutcome, run_once};
