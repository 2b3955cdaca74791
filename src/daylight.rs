//! Daylight window lookup and partial-hour weighted aggregation
//!
//! The sunrise/sunset boundary for a day comes from a sun table (one CSV row
//! per calendar day, UTC). [`aggregate`] averages an hourly column over that
//! window, weighting the two boundary hours by the fraction that is daylight.

use crate::config::SunsetWeighting;
use crate::error::{ReserveError, Result};
use crate::series::TimeSeries;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Sunrise and sunset for one UTC calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunWindow {
    pub sunrise_hour: u32,
    pub sunrise_minute: u32,
    pub sunset_hour: u32,
    pub sunset_minute: u32,
}

impl SunWindow {
    pub fn new(
        sunrise_hour: u32,
        sunrise_minute: u32,
        sunset_hour: u32,
        sunset_minute: u32,
    ) -> Result<Self> {
        for (field, value, limit) in [
            ("sunrise_hour", sunrise_hour, 24),
            ("sunrise_minute", sunrise_minute, 60),
            ("sunset_hour", sunset_hour, 24),
            ("sunset_minute", sunset_minute, 60),
        ] {
            if value >= limit {
                return Err(ReserveError::validation(
                    format!("sun_window.{}", field),
                    format!("{} is out of range 0..{}", value, limit),
                ));
            }
        }
        Ok(Self {
            sunrise_hour,
            sunrise_minute,
            sunset_hour,
            sunset_minute,
        })
    }

    /// Weight of the hour containing sunrise
    pub fn first_weight(&self) -> f64 {
        f64::from(60 - self.sunrise_minute) / 60.0
    }

    /// Weight of the hour containing sunset
    pub fn last_weight(&self, weighting: SunsetWeighting) -> f64 {
        match weighting {
            SunsetWeighting::Elapsed => f64::from(self.sunset_minute) / 60.0,
            SunsetWeighting::Remaining => f64::from(60 - self.sunset_minute) / 60.0,
        }
    }
}

/// One row of the sun table CSV
#[derive(Debug, Clone, Deserialize)]
pub struct SunRow {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub rise_hour_utc: u32,
    pub rise_minute_utc: u32,
    pub set_hour_utc: u32,
    pub set_minute_utc: u32,
}

impl SunRow {
    fn matches(&self, date: NaiveDate) -> bool {
        self.year == date.year() && self.month == date.month() && self.day == date.day()
    }
}

/// Per-day sunrise/sunset table
#[derive(Debug, Clone, Default)]
pub struct SunTable {
    rows: Vec<SunRow>,
}

impl SunTable {
    /// Parse a headed CSV table. Header and field whitespace is ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let rows = rdr.deserialize().collect::<std::result::Result<Vec<SunRow>, _>>()?;
        Ok(Self { rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            ReserveError::io(format!(
                "Failed to open sun table {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_reader(file)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The window for `date`; the table must hold exactly one row for it.
    pub fn lookup(&self, date: NaiveDate) -> Result<SunWindow> {
        let matches: Vec<&SunRow> = self.rows.iter().filter(|r| r.matches(date)).collect();
        match matches.as_slice() {
            [] => Err(ReserveError::no_match(format!("sun table row for {}", date))),
            [row] => SunWindow::new(
                row.rise_hour_utc,
                row.rise_minute_utc,
                row.set_hour_utc,
                row.set_minute_utc,
            ),
            many => Err(ReserveError::ambiguous_match(
                format!("sun table row for {}", date),
                many.len(),
            )),
        }
    }
}

/// Index of the single sample on `date` at `hour`
fn unique_hour_index(series: &TimeSeries, date: NaiveDate, hour: u32, label: &str) -> Result<usize> {
    let matches: Vec<usize> = series
        .samples()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.date_hour() == Some((date, hour)))
        .map(|(i, _)| i)
        .collect();
    let lookup = || format!("{} hour {:02} on {} in '{}'", label, hour, date, series.name());
    match matches.as_slice() {
        [] => Err(ReserveError::no_match(lookup())),
        [i] => Ok(*i),
        many => Err(ReserveError::ambiguous_match(lookup(), many.len())),
    }
}

/// Partial-hour weighted average of `column` over the daylight window of `date`.
///
/// The sunrise and sunset hours must each match exactly one sample, and the
/// sunset sample must come after the sunrise sample.
pub fn aggregate(
    hourly: &TimeSeries,
    window: &SunWindow,
    column: &str,
    date: NaiveDate,
    weighting: SunsetWeighting,
) -> Result<f64> {
    let col = hourly.column_index(column)?;
    let start = unique_hour_index(hourly, date, window.sunrise_hour, "sunrise")?;
    let end = unique_hour_index(hourly, date, window.sunset_hour, "sunset")?;

    // Sunsets past midnight UTC (western longitudes in summer) land here too;
    // such days fail until the sun table is shifted to a same-day window.
    if end <= start {
        return Err(ReserveError::validation(
            "daylight",
            format!(
                "sunset sample (hour {}) must follow sunrise sample (hour {})",
                window.sunset_hour, window.sunrise_hour
            ),
        ));
    }

    let samples = hourly.samples();
    let first_weight = window.first_weight();
    let last_weight = window.last_weight(weighting);

    let interior = &samples[start + 1..end];
    let interior_sum: f64 = interior.iter().map(|s| s.values[col]).sum();

    let numerator = first_weight * samples[start].values[col]
        + interior_sum
        + last_weight * samples[end].values[col];
    let denominator = first_weight + interior.len() as f64 + last_weight;

    if denominator <= 0.0 {
        return Err(ReserveError::validation(
            "daylight",
            "daylight window has zero total weight",
        ));
    }

    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Sample;
    use chrono::{NaiveDate, NaiveTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn hourly(covers: &[(u32, f64)]) -> TimeSeries {
        let samples = covers
            .iter()
            .map(|&(hour, cover)| {
                let ts = day()
                    .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap())
                    .and_utc()
                    .timestamp();
                Sample::new(ts, vec![cover])
            })
            .collect();
        TimeSeries::new("daily_forecast", vec!["cloud_cover".to_string()], samples).unwrap()
    }

    #[test]
    fn test_adjacent_boundaries_have_no_interior() {
        let series = hourly(&[(13, 90.0), (14, 40.0), (15, 80.0), (16, 10.0)]);
        let window = SunWindow::new(14, 30, 15, 15).unwrap();

        let remaining =
            aggregate(&series, &window, "cloud_cover", day(), SunsetWeighting::Remaining).unwrap();
        let expected = (0.5 * 40.0 + 0.75 * 80.0) / 1.25;
        assert!((remaining - expected).abs() < 1e-9);

        let elapsed =
            aggregate(&series, &window, "cloud_cover", day(), SunsetWeighting::Elapsed).unwrap();
        let expected = (0.5 * 40.0 + 0.25 * 80.0) / 0.75;
        assert!((elapsed - expected).abs() < 1e-9);
    }

    #[test]
    fn test_on_the_hour_window() {
        let series = hourly(&[(6, 10.0), (7, 20.0), (8, 30.0), (9, 40.0)]);
        let window = SunWindow::new(6, 0, 9, 0).unwrap();

        let remaining =
            aggregate(&series, &window, "cloud_cover", day(), SunsetWeighting::Remaining).unwrap();
        assert!((remaining - 25.0).abs() < 1e-9);

        // Sunset at 09:00 leaves no daylight in the 09:00 hour
        let elapsed =
            aggregate(&series, &window, "cloud_cover", day(), SunsetWeighting::Elapsed).unwrap();
        assert!((elapsed - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_and_duplicate_hours() {
        let series = hourly(&[(7, 20.0), (8, 30.0)]);
        let window = SunWindow::new(6, 10, 8, 40).unwrap();
        assert!(matches!(
            aggregate(&series, &window, "cloud_cover", day(), SunsetWeighting::Elapsed),
            Err(ReserveError::NoMatch { .. })
        ));

        let series = hourly(&[(6, 10.0), (6, 11.0), (7, 20.0), (8, 30.0)]);
        assert!(matches!(
            aggregate(&series, &window, "cloud_cover", day(), SunsetWeighting::Elapsed),
            Err(ReserveError::AmbiguousMatch { count: 2, .. })
        ));
    }

    #[test]
    fn test_other_dates_are_ignored() {
        let series = hourly(&[(6, 10.0), (7, 20.0), (8, 30.0)]);
        let window = SunWindow::new(6, 0, 8, 30).unwrap();
        let tomorrow = day().succ_opt().unwrap();
        assert!(matches!(
            aggregate(&series, &window, "cloud_cover", tomorrow, SunsetWeighting::Elapsed),
            Err(ReserveError::NoMatch { .. })
        ));
    }

    #[test]
    fn test_same_hour_window_is_rejected() {
        let series = hourly(&[(14, 40.0), (15, 80.0)]);
        let window = SunWindow::new(14, 10, 14, 50).unwrap();
        assert!(matches!(
            aggregate(&series, &window, "cloud_cover", day(), SunsetWeighting::Elapsed),
            Err(ReserveError::Validation { .. })
        ));
    }

    #[test]
    fn test_sunset_past_midnight_utc_is_rejected() {
        let covers: Vec<(u32, f64)> = (0..24).map(|h| (h, 50.0)).collect();
        let series = hourly(&covers);
        // 10:27 rise, 00:48 set: the set hour is the first sample of the date
        let window = SunWindow::new(10, 27, 0, 48).unwrap();
        for weighting in [SunsetWeighting::Elapsed, SunsetWeighting::Remaining] {
            let err = aggregate(&series, &window, "cloud_cover", day(), weighting).unwrap_err();
            assert!(matches!(err, ReserveError::Validation { ref field, .. } if field == "daylight"));
        }
    }

    #[test]
    fn test_sun_table_lookup() {
        let csv = "year, month, day, rise_hour_utc, rise_minute_utc, set_hour_utc, set_minute_utc\n\
                   2025, 6, 1, 10, 27, 0, 48\n\
                   2025, 6, 2, 10, 27, 0, 49\n\
                   2025, 6, 2, 10, 27, 0, 49\n";
        let table = SunTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);

        let window = table.lookup(day()).unwrap();
        assert_eq!(window, SunWindow::new(10, 27, 0, 48).unwrap());

        let ambiguous = table.lookup(day().succ_opt().unwrap()).unwrap_err();
        assert!(matches!(ambiguous, ReserveError::AmbiguousMatch { count: 2, .. }));

        let missing = table
            .lookup(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
            .unwrap_err();
        assert!(matches!(missing, ReserveError::NoMatch { .. }));
    }

    #[test]
    fn test_sun_window_range_checks() {
        assert!(SunWindow::new(24, 0, 12, 0).is_err());
        assert!(SunWindow::new(6, 60, 12, 0).is_err());
        assert!(SunWindow::new(6, 59, 23, 59).is_ok());
    }
}
