//! Prediction model capability
//!
//! The planner only depends on [`Model`]. [`LinearRegression`] is the shipped
//! implementation: ordinary least squares with an intercept and a small ridge
//! term, solved through the normal equations.

use crate::config::ModelConfig;
use crate::error::{ReserveError, Result};

/// Train-then-predict regression capability
pub trait Model: Send {
    fn train(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<()>;
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;
}

/// Least-squares linear regression with intercept
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    ridge: f64,
    /// Intercept followed by one weight per feature
    coefficients: Option<Vec<f64>>,
}

impl LinearRegression {
    pub fn new(ridge: f64) -> Self {
        Self {
            ridge,
            coefficients: None,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.ridge)
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }
}

fn feature_width(features: &[Vec<f64>]) -> Result<usize> {
    let width = features.first().map_or(0, Vec::len);
    if let Some((i, row)) = features.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(ReserveError::model(format!(
            "feature row {} has {} values, expected {}",
            i,
            row.len(),
            width
        )));
    }
    Ok(width)
}

impl Model for LinearRegression {
    fn train(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<()> {
        if features.is_empty() {
            return Err(ReserveError::model("cannot train on zero rows"));
        }
        if features.len() != labels.len() {
            return Err(ReserveError::model(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let width = feature_width(features)?;
        let n = width + 1;

        // Normal equations over the design matrix [1 | X]
        let mut xtx = vec![vec![0.0; n]; n];
        let mut xty = vec![0.0; n];
        for (row, &y) in features.iter().zip(labels) {
            let design: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..n {
                xty[i] += design[i] * y;
                for j in 0..n {
                    xtx[i][j] += design[i] * design[j];
                }
            }
        }
        // Intercept is not regularised
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += self.ridge;
        }

        self.coefficients = Some(solve_dense(xtx, xty)?);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| ReserveError::model("model has not been trained"))?;
        let width = feature_width(features)?;
        if !features.is_empty() && width + 1 != coefficients.len() {
            return Err(ReserveError::model(format!(
                "model trained on {} features, got {}",
                coefficients.len() - 1,
                width
            )));
        }
        Ok(features
            .iter()
            .map(|row| {
                coefficients[0]
                    + row
                        .iter()
                        .zip(&coefficients[1..])
                        .map(|(x, w)| x * w)
                        .sum::<f64>()
            })
            .collect())
    }
}

/// Solves `A * x = b` by Gaussian elimination with partial pivoting.
fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = a.len();

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = a[col][col].abs();
        for (r, row) in a.iter().enumerate().skip(col + 1) {
            if row[col].abs() > pivot_val {
                pivot_val = row[col].abs();
                pivot_row = r;
            }
        }

        if pivot_val < 1e-12 {
            return Err(ReserveError::model(format!(
                "singular system at column {} (collinear or constant features)",
                col
            )));
        }

        if pivot_row != col {
            a.swap(pivot_row, col);
            b.swap(pivot_row, col);
        }

        let pivot = a[col][col];
        for r in (col + 1)..n {
            let factor = a[r][col] / pivot;
            if factor == 0.0 {
                continue;
            }
            a[r][col] = 0.0;
            for c in (col + 1)..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut rhs = b[i];
        for j in (i + 1)..n {
            rhs -= a[i][j] * x[j];
        }
        x[i] = rhs / a[i][i];
    }

    if let Some((i, xi)) = x.iter().enumerate().find(|(_, xi)| !xi.is_finite()) {
        return Err(ReserveError::model(format!(
            "non-finite coefficient at index {}: {}",
            i, xi
        )));
    }

    Ok(x)
}
