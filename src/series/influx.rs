//! InfluxDB 1.x HTTP query adapter
//!
//! Series are measurements; requested columns are fields. Queries go to the
//! `/query` endpoint with `epoch=s` so the `time` column comes back as integer
//! seconds.

use super::source::{SeriesRequest, SeriesSource};
use super::{Sample, TimeSeries};
use crate::config::InfluxConfig;
use crate::error::{ReserveError, Result};
use crate::logging::get_logger;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<RawSeries>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Time-series source backed by an InfluxDB 1.x server
pub struct InfluxSource {
    config: InfluxConfig,
    client: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl InfluxSource {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
            logger: get_logger("influx"),
        })
    }
}

#[async_trait::async_trait]
impl SeriesSource for InfluxSource {
    async fn fetch(&self, request: &SeriesRequest) -> Result<TimeSeries> {
        let query = build_query(request);
        let url = format!("{}/query", self.config.url.trim_end_matches('/'));
        self.logger.debug(&format!("Querying {}: {}", url, query));

        let mut http = self.client.get(&url).query(&[
            ("db", self.config.database.as_str()),
            ("q", query.as_str()),
            ("epoch", "s"),
        ]);
        if let Some(user) = self.config.username.as_ref() {
            http = http.basic_auth(user, self.config.password.as_ref());
        }

        let resp = http.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let msg = format!("InfluxDB returned {} for '{}': {}", status, request.name, body);
            self.logger.error(&msg);
            return Err(ReserveError::source_error(msg));
        }

        let series = parse_query_response(&body, request)?;
        self.logger.info(&format!(
            "Fetched {} rows from '{}'",
            series.len(),
            request.name
        ));
        Ok(series)
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('\\', "\\\\").replace('"', "\\\""))
}

/// InfluxQL statement for a request
pub fn build_query(request: &SeriesRequest) -> String {
    let fields = request
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut query = format!("SELECT {} FROM {}", fields, quote_ident(&request.name));
    if let Some(days) = request.lookback_days {
        query.push_str(&format!(" WHERE time > now() - {}d", days));
    }
    query
}

fn numeric(value: &Value, column: &str, row: usize) -> Result<f64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i as f64)
            } else if let Some(u) = n.as_u64() {
                Ok(u as f64)
            } else {
                n.as_f64().ok_or_else(|| {
                    ReserveError::source_error(format!(
                        "column '{}' row {}: unrepresentable number",
                        column, row
                    ))
                })
            }
        }
        other => Err(ReserveError::source_error(format!(
            "column '{}' row {}: unsupported field kind {}",
            column,
            row,
            kind_name(other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode a `/query` JSON body into a series with the requested column layout.
///
/// A statement without `series` yields an empty series; callers decide whether
/// that is fatal.
pub fn parse_query_response(body: &str, request: &SeriesRequest) -> Result<TimeSeries> {
    let response: QueryResponse = serde_json::from_str(body)?;
    if let Some(err) = response.error {
        return Err(ReserveError::source_error(err));
    }

    let Some(statement) = response.results.into_iter().next() else {
        return Err(ReserveError::source_error("response contains no results"));
    };
    if let Some(err) = statement.error {
        return Err(ReserveError::source_error(err));
    }

    let mut raw_series = statement.series.into_iter();
    let Some(raw) = raw_series.next() else {
        return TimeSeries::new(request.name.clone(), request.columns.clone(), Vec::new());
    };
    if raw_series.next().is_some() {
        return Err(ReserveError::source_error(format!(
            "query for '{}' returned more than one series",
            request.name
        )));
    }

    let expected_columns: Vec<&str> = std::iter::once("time")
        .chain(request.columns.iter().map(String::as_str))
        .collect();
    if raw.columns.iter().map(String::as_str).ne(expected_columns.iter().copied()) {
        return Err(ReserveError::source_error(format!(
            "series '{}' has columns {:?}, expected {:?}",
            request.name, raw.columns, expected_columns
        )));
    }

    let mut samples = Vec::with_capacity(raw.values.len());
    for (row, values) in raw.values.iter().enumerate() {
        if values.len() != expected_columns.len() {
            return Err(ReserveError::shape(
                format!("{} row {}", request.name, row),
                expected_columns.len(),
                values.len(),
            ));
        }
        let timestamp = values[0].as_i64().ok_or_else(|| {
            ReserveError::source_error(format!(
                "series '{}' row {}: time is not integer seconds",
                request.name, row
            ))
        })?;
        let features = values[1..]
            .iter()
            .zip(&request.columns)
            .map(|(v, c)| numeric(v, c, row))
            .collect::<Result<Vec<_>>>()?;
        samples.push(Sample::new(timestamp, features));
    }

    TimeSeries::new(request.name.clone(), request.columns.clone(), samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SeriesRequest {
        SeriesRequest::new(
            "daily_forecast",
            vec!["cloud_cover".to_string(), "temperature_2m".to_string()],
        )
    }

    #[test]
    fn test_build_query() {
        let q = build_query(&request().with_lookback_days(30));
        assert_eq!(
            q,
            "SELECT \"cloud_cover\", \"temperature_2m\" FROM \"daily_forecast\" WHERE time > now() - 30d"
        );
    }

    #[test]
    fn test_parse_mixed_numeric_kinds() {
        let body = r#"{"results":[{"statement_id":0,"series":[{"name":"daily_forecast",
            "columns":["time","cloud_cover","temperature_2m"],
            "values":[[1700000000,12,3.5],[1700003600,18446744073709551615,-2]]}]}]}"#;
        let series = parse_query_response(body, &request()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.timestamps(), vec![1_700_000_000, 1_700_003_600]);
        assert_eq!(series.samples()[0].values, vec![12.0, 3.5]);
        assert_eq!(series.samples()[1].values[1], -2.0);
    }

    #[test]
    fn test_rejects_non_numeric_fields() {
        let body = r#"{"results":[{"series":[{"name":"daily_forecast",
            "columns":["time","cloud_cover","temperature_2m"],
            "values":[[1700000000,"cloudy",3.5]]}]}]}"#;
        let err = parse_query_response(body, &request()).unwrap_err();
        assert!(err.to_string().contains("unsupported field kind string"));

        let body = r#"{"results":[{"series":[{"name":"daily_forecast",
            "columns":["time","cloud_cover","temperature_2m"],
            "values":[[1700000000,null,3.5]]}]}]}"#;
        let err = parse_query_response(body, &request()).unwrap_err();
        assert!(err.to_string().contains("unsupported field kind null"));
    }

    #[test]
    fn test_missing_series_is_empty() {
        let body = r#"{"results":[{"statement_id":0}]}"#;
        let series = parse_query_response(body, &request()).unwrap();
        assert!(series.is_empty());
        assert!(matches!(
            series.ensure_non_empty(),
            Err(ReserveError::EmptyResult { .. })
        ));
    }

    #[test]
    fn test_column_order_must_match() {
        let body = r#"{"results":[{"series":[{"name":"daily_forecast",
            "columns":["time","temperature_2m","cloud_cover"],
            "values":[[1700000000,3.5,12]]}]}]}"#;
        assert!(matches!(
            parse_query_response(body, &request()),
            Err(ReserveError::Source { .. })
        ));
    }

    #[test]
    fn test_statement_error_is_reported() {
        let body = r#"{"results":[{"statement_id":0,"error":"database not found: weather"}]}"#;
        let err = parse_query_response(body, &request()).unwrap_err();
        assert!(err.to_string().contains("database not found"));
    }
}
