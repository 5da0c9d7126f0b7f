//! Motion detection from lagged differences of smoothed amplitudes.

use crate::data::model::{ChangePoint, ChangeResult, SpectrumSeries};
use crate::error::{Error, Result};

/// Flags rows whose spectrum moved more than `threshold` over `lag` rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeDetector {
    lag: usize,
    threshold: f64,
}

impl ChangeDetector {
    pub fn new(lag: usize, threshold: f64) -> Result<Self> {
        if lag == 0 {
            return Err(Error::invalid("lag", "must be at least 1"));
        }
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::invalid(
                "threshold",
                format!("must be a finite, non-negative number, got {threshold}"),
            ));
        }
        Ok(Self { lag, threshold })
    }

    /// One point per input row. Rows before `lag` have no earlier partner
    /// and carry NaN with `event = false`.
    pub fn detect(&self, series: &SpectrumSeries) -> ChangeResult {
        let rows = series.rows();
        let points = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mse = match i.checked_sub(self.lag) {
                    Some(j) => lagged_mse(&row.values, &rows[j].values),
                    None => f64::NAN,
                };
                ChangePoint {
                    timestamp: row.timestamp.clone(),
                    mse,
                    event: mse > self.threshold,
                }
            })
            .collect();

        ChangeResult {
            lag: self.lag,
            threshold: self.threshold,
            points,
        }
    }
}

/// Mean of squared per-subcarrier differences, skipping NaN deltas.
fn lagged_mse(current: &[f64], earlier: &[f64]) -> f64 {
    let (sum, count) = current
        .iter()
        .zip(earlier)
        .map(|(a, b)| (a - b).powi(2))
        .filter(|d| !d.is_nan())
        .fold((0.0, 0usize), |(s, c), d| (s + d, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Score every row of `series` against the row `lag` steps earlier.
pub fn detect_changes(series: &SpectrumSeries, lag: usize, threshold: f64) -> Result<ChangeResult> {
    Ok(ChangeDetector::new(lag, threshold)?.detect(series))
}
