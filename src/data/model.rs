use std::fmt;

use chrono::{NaiveTime, Timelike};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Timestamp – capture clock of one record
// ---------------------------------------------------------------------------

/// Time-of-day stamp as written by the capture tool.
///
/// The raw label is always kept so exports reproduce the input verbatim;
/// `time` is `None` when the label does not match `HH:MM:SS.ffffff` or
/// `MM:SS.ffffff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    label: String,
    time: Option<NaiveTime>,
}

impl Timestamp {
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        Timestamp {
            label: label.to_string(),
            time: parse_clock(label),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_valid(&self) -> bool {
        self.time.is_some()
    }

    /// Seconds since midnight, with microsecond resolution.
    pub fn seconds(&self) -> Option<f64> {
        self.time.map(|t| {
            t.num_seconds_from_midnight() as f64 + t.nanosecond() as f64 * 1e-9
        })
    }
}

fn parse_clock(label: &str) -> Option<NaiveTime> {
    // chrono needs an hour field, so "MM:SS.ffffff" is widened first.
    let full = match label.matches(':').count() {
        1 => format!("00:{label}"),
        2 => label.to_string(),
        _ => return None,
    };
    NaiveTime::parse_from_str(&full, "%H:%M:%S%.f").ok()
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

// ---------------------------------------------------------------------------
// RawRecord – one input row
// ---------------------------------------------------------------------------

/// One `{timestamp, data}` row as handed over by the file reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub timestamp: String,
    /// Bracketed `[r0, i0, r1, i1, ...]` list; `None` for a blank cell.
    #[serde(rename = "data", default)]
    pub payload: Option<String>,
}

impl RawRecord {
    pub fn new(timestamp: impl Into<String>, payload: impl Into<String>) -> Self {
        RawRecord {
            timestamp: timestamp.into(),
            payload: Some(payload.into()),
        }
    }

    /// Whether the record carries no samples at all.
    pub fn is_blank(&self) -> bool {
        self.payload
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
    }
}

/// Complex subcarrier vector of one frame, in decode order.
pub type ComplexSpectrum = Vec<Complex64>;

// ---------------------------------------------------------------------------
// SpectrumSeries – time-ordered per-subcarrier vectors
// ---------------------------------------------------------------------------

/// A single spectrum (one timestamp, one value per subcarrier).
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRow {
    pub timestamp: Timestamp,
    pub values: Vec<f64>,
}

impl SpectrumRow {
    pub fn new(timestamp: Timestamp, values: Vec<f64>) -> Self {
        SpectrumRow { timestamp, values }
    }
}

/// Time-ordered sequence of equally wide spectra.
///
/// Used for amplitude, phase and smoothed views alike; every row has
/// exactly `subcarriers` values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumSeries {
    rows: Vec<SpectrumRow>,
    subcarriers: usize,
}

impl SpectrumSeries {
    /// Build a series, rejecting rows whose width differs from the first.
    pub fn from_rows(rows: Vec<SpectrumRow>) -> Result<Self> {
        let subcarriers = rows.first().map_or(0, |r| r.values.len());
        if let Some((row, bad)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.values.len() != subcarriers)
        {
            return Err(Error::SubcarrierMismatch {
                row,
                expected: subcarriers,
                actual: bad.values.len(),
            });
        }
        Ok(SpectrumSeries { rows, subcarriers })
    }

    /// Number of spectra.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width N shared by every row.
    pub fn subcarriers(&self) -> usize {
        self.subcarriers
    }

    pub fn rows(&self) -> &[SpectrumRow] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&SpectrumRow> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpectrumRow> {
        self.rows.iter()
    }

    /// Same timestamps, values replaced row by row.
    pub fn map_values<F>(&self, mut f: F) -> SpectrumSeries
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let rows: Vec<SpectrumRow> = self
            .rows
            .iter()
            .map(|r| SpectrumRow::new(r.timestamp.clone(), f(&r.values)))
            .collect();
        let subcarriers = rows.first().map_or(0, |r| r.values.len());
        SpectrumSeries { rows, subcarriers }
    }

    /// The series in reverse time order.
    pub fn reversed(&self) -> SpectrumSeries {
        SpectrumSeries {
            rows: self.rows.iter().rev().cloned().collect(),
            subcarriers: self.subcarriers,
        }
    }
}

impl<'a> IntoIterator for &'a SpectrumSeries {
    type Item = &'a SpectrumRow;
    type IntoIter = std::slice::Iter<'a, SpectrumRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationPoint {
    pub timestamp: Timestamp,
    /// Pearson r in [-1, 1], or NaN when undefined.
    pub correlation: f64,
}

/// Correlation of every non-reference spectrum against the reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorrelationResult {
    /// Row the candidates were compared against. The pipeline reports
    /// the input record position, dropped records included.
    pub reference_index: usize,
    pub points: Vec<CorrelationPoint>,
}

impl CorrelationResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points that fell back to NaN.
    pub fn undefined_count(&self) -> usize {
        self.points.iter().filter(|p| p.correlation.is_nan()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangePoint {
    pub timestamp: Timestamp,
    /// Windowed-difference MSE; NaN while fewer than `lag` earlier rows exist.
    pub mse: f64,
    pub event: bool,
}

/// Per-timestamp MSE series with motion flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeResult {
    pub lag: usize,
    pub threshold: f64,
    pub points: Vec<ChangePoint>,
}

impl ChangeResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &ChangePoint> {
        self.points.iter().filter(|p| p.event)
    }

    pub fn event_count(&self) -> usize {
        self.events().count()
    }

    pub fn first_event(&self) -> Option<&ChangePoint> {
        self.events().next()
    }

    pub fn last_event(&self) -> Option<&ChangePoint> {
        self.events().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, values: &[f64]) -> SpectrumRow {
        SpectrumRow::new(Timestamp::parse(label), values.to_vec())
    }

    #[test]
    fn test_timestamp_formats() {
        let full = Timestamp::parse("12:34:56.250000");
        assert!(full.is_valid());
        assert!((full.seconds().unwrap() - 45296.25).abs() < 1e-9);

        let short = Timestamp::parse("01:02.500000");
        assert!(short.is_valid());
        assert!((short.seconds().unwrap() - 62.5).abs() < 1e-9);

        let bad = Timestamp::parse("yesterday");
        assert!(!bad.is_valid());
        assert_eq!(bad.label(), "yesterday");
        assert_eq!(bad.to_string(), "yesterday");
    }

    #[test]
    fn test_blank_record() {
        assert!(RawRecord::new("00:00.0", "   ").is_blank());
        assert!(RawRecord {
            timestamp: "00:00.0".into(),
            payload: None
        }
        .is_blank());
        assert!(!RawRecord::new("00:00.0", "[1,2]").is_blank());
    }

    #[test]
    fn test_series_rejects_width_change() {
        let err = SpectrumSeries::from_rows(vec![
            row("00:00.0", &[1.0, 2.0]),
            row("00:00.1", &[1.0, 2.0]),
            row("00:00.2", &[1.0]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            Error::SubcarrierMismatch {
                row: 2,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_series_reversed_keeps_width() {
        let series = SpectrumSeries::from_rows(vec![
            row("00:00.0", &[1.0, 2.0]),
            row("00:00.1", &[3.0, 4.0]),
        ])
        .unwrap();
        let rev = series.reversed();
        assert_eq!(rev.subcarriers(), 2);
        assert_eq!(rev.get(0).unwrap().values, vec![3.0, 4.0]);
        assert_eq!(rev.get(1).unwrap().timestamp.label(), "00:00.0");
    }

    #[test]
    fn test_change_result_event_summary() {
        let point = |label: &str, mse: f64, event: bool| ChangePoint {
            timestamp: Timestamp::parse(label),
            mse,
            event,
        };
        let result = ChangeResult {
            lag: 1,
            threshold: 1.0,
            points: vec![
                point("00:00.0", f64::NAN, false),
                point("00:00.1", 2.0, true),
                point("00:00.2", 0.5, false),
                point("00:00.3", 3.0, true),
            ],
        };
        assert_eq!(result.event_count(), 2);
        assert_eq!(result.first_event().unwrap().timestamp.label(), "00:00.1");
        assert_eq!(result.last_event().unwrap().timestamp.label(), "00:00.3");
    }
}
