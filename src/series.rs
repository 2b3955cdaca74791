//! Time series ingestion and alignment
//!
//! A [`TimeSeries`] is a named, time-ordered table of numeric samples fetched
//! from a [`SeriesSource`]. [`align`] reduces two series to their common
//! timestamps so their rows can be used together as features and labels.

use crate::error::{ReserveError, Result};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use std::collections::BTreeMap;

pub mod influx;
pub mod source;

pub use influx::InfluxSource;
pub use source::{InMemorySource, SeriesRequest, SeriesSource};

/// One timestamped row of feature values
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds since the Unix epoch (UTC)
    pub timestamp: i64,
    pub values: Vec<f64>,
}

impl Sample {
    pub fn new(timestamp: i64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    /// UTC date and hour of this sample, if the timestamp is representable
    pub fn date_hour(&self) -> Option<(NaiveDate, u32)> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0).map(|dt| (dt.date_naive(), dt.hour()))
    }
}

/// Named, ordered series of samples with a fixed column layout
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    columns: Vec<String>,
    samples: Vec<Sample>,
}

impl TimeSeries {
    /// Build a series, enforcing non-decreasing timestamps and a constant row width.
    ///
    /// The first sample's width is authoritative and must also match the column count.
    pub fn new(name: impl Into<String>, columns: Vec<String>, samples: Vec<Sample>) -> Result<Self> {
        let name = name.into();

        if let Some(first) = samples.first() {
            let width = first.values.len();
            if width != columns.len() {
                return Err(ReserveError::validation(
                    format!("series.{}", name),
                    format!(
                        "row width {} does not match {} declared columns",
                        width,
                        columns.len()
                    ),
                ));
            }
            if let Some((i, s)) = samples
                .iter()
                .enumerate()
                .find(|(_, s)| s.values.len() != width)
            {
                return Err(ReserveError::validation(
                    format!("series.{}", name),
                    format!("row {} has {} values, expected {}", i, s.values.len(), width),
                ));
            }
        }

        if let Some(i) = samples
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(ReserveError::validation(
                format!("series.{}", name),
                format!("timestamps decrease at row {}", i + 1),
            ));
        }

        Ok(Self {
            name,
            columns,
            samples,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// Feature rows in sample order
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.samples.iter().map(|s| s.values.clone()).collect()
    }

    /// Position of a named column
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| {
                ReserveError::validation(
                    format!("series.{}", self.name),
                    format!("missing column '{}'", column),
                )
            })
    }

    /// New series holding only the given columns, in the given order
    pub fn select(&self, columns: &[String]) -> Result<TimeSeries> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        let samples = self
            .samples
            .iter()
            .map(|s| Sample::new(s.timestamp, indices.iter().map(|&i| s.values[i]).collect()))
            .collect();
        TimeSeries::new(self.name.clone(), columns.to_vec(), samples)
    }

    /// New series holding only samples on the given UTC date
    pub fn on_date(&self, date: NaiveDate) -> TimeSeries {
        let samples = self
            .samples
            .iter()
            .filter(|s| s.date_hour().is_some_and(|(d, _)| d == date))
            .cloned()
            .collect();
        TimeSeries {
            name: self.name.clone(),
            columns: self.columns.clone(),
            samples,
        }
    }

    /// Fail with `EmptyResult` when the series has no rows
    pub fn ensure_non_empty(&self) -> Result<&Self> {
        if self.samples.is_empty() {
            return Err(ReserveError::empty_result(&self.name));
        }
        Ok(self)
    }

    /// Fail with `Shape` unless the series has exactly `expected` rows
    pub fn ensure_len(&self, expected: usize) -> Result<&Self> {
        if self.samples.len() != expected {
            return Err(ReserveError::shape(&self.name, expected, self.samples.len()));
        }
        Ok(self)
    }
}

/// Two series projected onto their common timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    /// Strictly ascending shared timestamps
    pub timestamps: Vec<i64>,
    /// Index into the left series for each shared timestamp
    pub left_indices: Vec<usize>,
    /// Index into the right series for each shared timestamp
    pub right_indices: Vec<usize>,
    /// Left feature rows gathered in timestamp order
    pub left: Vec<Vec<f64>>,
    /// Right feature rows gathered in timestamp order
    pub right: Vec<Vec<f64>>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Swap the two sides
    pub fn swapped(self) -> AlignedPair {
        AlignedPair {
            timestamps: self.timestamps,
            left_indices: self.right_indices,
            right_indices: self.left_indices,
            left: self.right,
            right: self.left,
        }
    }
}

/// First index of every distinct timestamp, ordered by timestamp
fn first_index_by_timestamp(series: &TimeSeries) -> BTreeMap<i64, usize> {
    let mut index = BTreeMap::new();
    for (i, s) in series.samples.iter().enumerate() {
        index.entry(s.timestamp).or_insert(i);
    }
    index
}

/// Intersect the timestamp sets of `a` and `b` and gather both sides' rows.
///
/// Timestamps match on exact integer equality only.
pub fn align(a: &TimeSeries, b: &TimeSeries) -> AlignedPair {
    let a_index = first_index_by_timestamp(a);
    let b_index = first_index_by_timestamp(b);

    let mut pair = AlignedPair {
        timestamps: Vec::new(),
        left_indices: Vec::new(),
        right_indices: Vec::new(),
        left: Vec::new(),
        right: Vec::new(),
    };

    for (ts, &ia) in &a_index {
        if let Some(&ib) = b_index.get(ts) {
            pair.timestamps.push(*ts);
            pair.left_indices.push(ia);
            pair.right_indices.push(ib);
            pair.left.push(a.samples[ia].values.clone());
            pair.right.push(b.samples[ib].values.clone());
        }
    }

    pair
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, rows: &[(i64, f64)]) -> TimeSeries {
        TimeSeries::new(
            name,
            vec!["v".to_string()],
            rows.iter().map(|&(t, v)| Sample::new(t, vec![v])).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_decreasing_timestamps() {
        let err = TimeSeries::new(
            "bad",
            vec!["v".to_string()],
            vec![Sample::new(10, vec![1.0]), Sample::new(5, vec![2.0])],
        )
        .unwrap_err();
        assert!(matches!(err, ReserveError::Validation { .. }));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = TimeSeries::new(
            "ragged",
            vec!["a".to_string(), "b".to_string()],
            vec![Sample::new(0, vec![1.0, 2.0]), Sample::new(1, vec![1.0])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 values"));
    }

    #[test]
    fn test_ensure_len_reports_counts() {
        let s = series("daily_forecast", &[(0, 1.0), (3600, 2.0)]);
        match s.ensure_len(24).unwrap_err() {
            ReserveError::Shape {
                expected, observed, ..
            } => {
                assert_eq!(expected, 24);
                assert_eq!(observed, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(s.ensure_len(2).is_ok());
    }

    #[test]
    fn test_ensure_non_empty() {
        let s = series("empty", &[]);
        assert!(matches!(
            s.ensure_non_empty(),
            Err(ReserveError::EmptyResult { .. })
        ));
    }

    #[test]
    fn test_align_intersects_exact_timestamps() {
        let a = series("a", &[(0, 1.0), (3600, 2.0), (7200, 3.0), (10800, 4.0)]);
        // 7201 is a one-second skew and must not match
        let b = series("b", &[(3600, 20.0), (7201, 30.0), (10800, 40.0), (14400, 50.0)]);

        let pair = align(&a, &b);
        assert_eq!(pair.timestamps, vec![3600, 10800]);
        assert_eq!(pair.left_indices, vec![1, 3]);
        assert_eq!(pair.right_indices, vec![0, 2]);
        assert_eq!(pair.left, vec![vec![2.0], vec![4.0]]);
        assert_eq!(pair.right, vec![vec![20.0], vec![40.0]]);
    }

    #[test]
    fn test_align_is_commutative_up_to_swap() {
        let a = series("a", &[(0, 1.0), (5, 2.0), (5, 2.5), (9, 3.0)]);
        let b = series("b", &[(5, 7.0), (9, 8.0), (12, 9.0)]);

        let ab = align(&a, &b);
        let ba = align(&b, &a);
        assert_eq!(ab.timestamps, ba.timestamps);
        assert!(ab.timestamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ab.clone().swapped(), ba);
        // duplicate timestamp 5 resolves to its first occurrence
        assert_eq!(ab.left[0], vec![2.0]);
    }

    #[test]
    fn test_select_and_on_date() {
        let s = TimeSeries::new(
            "f",
            vec!["a".to_string(), "b".to_string()],
            vec![
                Sample::new(1_700_000_000, vec![1.0, 2.0]),
                Sample::new(1_700_100_000, vec![3.0, 4.0]),
            ],
        )
        .unwrap();

        let only_b = s.select(&["b".to_string()]).unwrap();
        assert_eq!(only_b.rows(), vec![vec![2.0], vec![4.0]]);
        assert!(s.select(&["missing".to_string()]).is_err());

        let day = DateTime::<Utc>::from_timestamp(1_700_000_000, 0)
            .unwrap()
            .date_naive();
        assert_eq!(s.on_date(day).len(), 1);
    }
}
