//! Time-series source abstraction

use super::TimeSeries;
use crate::error::{ReserveError, Result};
use std::collections::HashMap;

/// A query for one named series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    /// Series (measurement) name
    pub name: String,
    /// Columns the caller expects, in order
    pub columns: Vec<String>,
    /// Only rows newer than this many days; `None` fetches everything
    pub lookback_days: Option<u32>,
}

impl SeriesRequest {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            lookback_days: None,
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }
}

/// External collaborator returning named series
#[async_trait::async_trait]
pub trait SeriesSource: Send + Sync {
    async fn fetch(&self, request: &SeriesRequest) -> Result<TimeSeries>;
}

/// Source backed by series held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<String, TimeSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series under its own name
    pub fn with_series(mut self, series: TimeSeries) -> Self {
        self.series.insert(series.name().to_string(), series);
        self
    }
}

#[async_trait::async_trait]
impl SeriesSource for InMemorySource {
    async fn fetch(&self, request: &SeriesRequest) -> Result<TimeSeries> {
        let series = self.series.get(&request.name).ok_or_else(|| {
            ReserveError::source_error(format!("unknown series '{}'", request.name))
        })?;
        series.select(&request.columns)
    }
}
