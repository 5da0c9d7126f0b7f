//! Moving-average smoothing along the time axis.
//!
//! Each subcarrier column is filtered on its own; rows are never mixed
//! across subcarriers. NaN samples inside a window are skipped, and a
//! window with fewer than `min_periods` valid samples yields NaN.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::model::{SpectrumRow, SpectrumSeries};
use crate::error::{Error, Result};

/// Most decimal places an emitted value can be rounded to.
pub const MAX_PRECISION: u32 = 15;

/// Window alignment relative to the output element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    /// `[i - window + 1, i]`, shrinking near the start of the series.
    #[default]
    Trailing,
    /// `[i - window/2, i + window/2]`, clipped at both ends.
    Centered,
}

impl SmoothingMode {
    /// Inclusive row range averaged for element `i` of an `n`-row series.
    fn bounds(self, i: usize, window: usize, n: usize) -> (usize, usize) {
        match self {
            SmoothingMode::Trailing => (i.saturating_sub(window - 1), i),
            SmoothingMode::Centered => {
                let half = window / 2;
                (i.saturating_sub(half), (i + half).min(n - 1))
            }
        }
    }
}

impl fmt::Display for SmoothingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingMode::Trailing => write!(f, "trailing"),
            SmoothingMode::Centered => write!(f, "centered"),
        }
    }
}

impl FromStr for SmoothingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trailing" => Ok(SmoothingMode::Trailing),
            "centered" | "centred" | "center" => Ok(SmoothingMode::Centered),
            other => Err(format!("unknown smoothing mode '{other}' (trailing, centered)")),
        }
    }
}

/// Validated moving-average filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalSmoother {
    window: usize,
    mode: SmoothingMode,
    min_periods: usize,
    precision: Option<u32>,
}

impl TemporalSmoother {
    pub fn new(window: usize, mode: SmoothingMode, min_periods: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::invalid("window", "must be at least 1"));
        }
        if min_periods == 0 || min_periods > window {
            return Err(Error::invalid(
                "min_periods",
                format!("must be within 1..={window}, got {min_periods}"),
            ));
        }
        Ok(Self {
            window,
            mode,
            min_periods,
            precision: None,
        })
    }

    /// Round every emitted value to `decimals` places (ties to even).
    pub fn with_precision(mut self, decimals: Option<u32>) -> Result<Self> {
        if let Some(d) = decimals.filter(|&d| d > MAX_PRECISION) {
            return Err(Error::invalid(
                "precision",
                format!("at most {MAX_PRECISION} decimal places, got {d}"),
            ));
        }
        self.precision = decimals;
        Ok(self)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }

    pub fn apply(&self, series: &SpectrumSeries) -> Result<SpectrumSeries> {
        self.apply_with(series, |_| Ok(()))
    }

    /// Like [`apply`](Self::apply), calling `check` with each output row
    /// index before it is computed; the first error aborts the pass.
    ///
    /// Each column keeps a running sum and valid-sample count, so a pass
    /// costs O(rows x subcarriers) whatever the window.
    pub fn apply_with<F>(&self, series: &SpectrumSeries, mut check: F) -> Result<SpectrumSeries>
    where
        F: FnMut(usize) -> Result<()>,
    {
        let rows = series.rows();
        let n = rows.len();
        let width = series.subcarriers();

        let mut sum = vec![0.0; width];
        let mut count = vec![0usize; width];
        // rows [next_out, next_in) are currently inside the window
        let mut next_in = 0;
        let mut next_out = 0;
        let mut smoothed = Vec::with_capacity(n);

        for i in 0..n {
            check(i)?;
            let (lo, hi) = self.mode.bounds(i, self.window, n);
            while next_in <= hi {
                for (k, &v) in rows[next_in].values.iter().enumerate() {
                    if !v.is_nan() {
                        sum[k] += v;
                        count[k] += 1;
                    }
                }
                next_in += 1;
            }
            while next_out < lo {
                for (k, &v) in rows[next_out].values.iter().enumerate() {
                    if !v.is_nan() {
                        sum[k] -= v;
                        count[k] -= 1;
                        if count[k] == 0 {
                            sum[k] = 0.0;
                        }
                    }
                }
                next_out += 1;
            }

            let values = sum
                .iter()
                .zip(&count)
                .map(|(&s, &c)| {
                    if c >= self.min_periods {
                        self.finish(s / c as f64)
                    } else {
                        f64::NAN
                    }
                })
                .collect();
            smoothed.push(SpectrumRow::new(rows[i].timestamp.clone(), values));
        }

        SpectrumSeries::from_rows(smoothed)
    }

    fn finish(&self, value: f64) -> f64 {
        match self.precision {
            Some(decimals) => round_to(value, decimals),
            None => value,
        }
    }
}

/// Smooth a series with the given window and alignment.
pub fn smooth(
    series: &SpectrumSeries,
    window: usize,
    mode: SmoothingMode,
    min_periods: usize,
) -> Result<SpectrumSeries> {
    TemporalSmoother::new(window, mode, min_periods)?.apply(series)
}

/// Round half-to-even at `decimals` places; NaN passes through.
///
/// Beyond [`MAX_PRECISION`] places an f64 has nothing left to round and
/// the value is returned as is.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if decimals > MAX_PRECISION {
        return value;
    }
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}
