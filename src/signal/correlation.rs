//! Similarity scoring against a fixed reference spectrum.
//!
//! Every spectrum (reference included) is mean-subtracted first; the
//! remaining subcarriers after masking are compared with Pearson's r.
//! The reference row itself never appears in the output.

use log::debug;

use crate::data::model::{CorrelationPoint, CorrelationResult, SpectrumSeries};
use crate::error::{Error, Result};
use crate::signal::baseline::normalize;
use crate::signal::mask::{apply_mask, build_mask};

/// Pearson correlation `cov(x, y) / (std(x) * std(y))`.
///
/// Both slices must have the same length. Fails with
/// [`Error::InsufficientData`] below two points. A constant
/// input has no defined correlation and yields NaN. The result is clamped
/// to [-1, 1] to absorb rounding overshoot.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(Error::invalid(
            "y",
            format!("length {} differs from x length {}", y.len(), x.len()),
        ));
    }
    let n = x.len();
    if n < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            available: n,
        });
    }
    let n_f = n as f64;
    let mean_x = x.iter().sum::<f64>() / n_f;
    let mean_y = y.iter().sum::<f64>() / n_f;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return Ok(f64::NAN);
    }
    Ok((cov / denom).clamp(-1.0, 1.0))
}

/// Correlates a series against one of its own rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationEngine {
    reference_index: usize,
    exclude_low_index: i64,
}

impl CorrelationEngine {
    /// `exclude_low_index` drops subcarriers `0..=exclude_low_index`;
    /// pass -1 to keep them all.
    pub fn new(reference_index: usize, exclude_low_index: i64) -> Self {
        Self {
            reference_index,
            exclude_low_index,
        }
    }

    pub fn correlate(&self, series: &SpectrumSeries) -> Result<CorrelationResult> {
        let reference_row = series.get(self.reference_index).ok_or_else(|| {
            Error::invalid(
                "reference_index",
                format!(
                    "{} is out of range for a series of {} rows",
                    self.reference_index,
                    series.len()
                ),
            )
        })?;
        let reference = normalize(&reference_row.values);

        let points = series
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.reference_index)
            .map(|(i, row)| {
                let candidate = normalize(&row.values);
                let mask = build_mask(&reference, &candidate, self.exclude_low_index);
                let correlation = match pearson(
                    &apply_mask(&reference, &mask),
                    &apply_mask(&candidate, &mask),
                ) {
                    Ok(r) => r,
                    Err(e) => {
                        debug!("row {i} ({}): {e}, correlation undefined", row.timestamp);
                        f64::NAN
                    }
                };
                CorrelationPoint {
                    timestamp: row.timestamp.clone(),
                    correlation,
                }
            })
            .collect();

        Ok(CorrelationResult {
            reference_index: self.reference_index,
            points,
        })
    }
}

/// Correlate every non-reference row of `series` with row `reference_index`.
pub fn correlate(
    series: &SpectrumSeries,
    reference_index: usize,
    exclude_low_index: i64,
) -> Result<CorrelationResult> {
    CorrelationEngine::new(reference_index, exclude_low_index).correlate(series)
}
