use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::{MalformedPolicy, PipelineConfig};
use crate::data::model::{
    ChangeResult, CorrelationResult, RawRecord, SpectrumRow, SpectrumSeries, Timestamp,
};
use crate::error::{Error, Result};
use crate::signal::{amplitude, decode_record, normalize_series, phase, CorrelationEngine};

/// How often (in records) the decode loop checks the time budget.
const DEADLINE_STRIDE: usize = 4096;

// ---------------------------------------------------------------------------
// Decode output
// ---------------------------------------------------------------------------

/// A record left out of the series because its payload did not decode.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// Position in the input sequence.
    pub row: usize,
    pub timestamp: String,
    pub error: Error,
}

/// Amplitude and phase views of one capture, plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct DecodedCapture {
    pub amplitude: SpectrumSeries,
    pub phase: SpectrumSeries,
    pub skipped: Vec<SkippedRecord>,
    /// Input position of every series row, ascending.
    pub source_rows: Vec<usize>,
    /// Records without any samples.
    pub blank: usize,
    /// Records kept whose timestamp did not parse.
    pub invalid_timestamps: usize,
}

impl DecodedCapture {
    pub fn len(&self) -> usize {
        self.amplitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitude.is_empty()
    }

    pub fn subcarriers(&self) -> usize {
        self.amplitude.subcarriers()
    }

    /// Series position of input row `input_row`, or `None` if that record
    /// was blank, skipped or never present.
    pub fn series_index(&self, input_row: usize) -> Option<usize> {
        self.source_rows.binary_search(&input_row).ok()
    }
}

// ---------------------------------------------------------------------------
// Time budget
// ---------------------------------------------------------------------------

struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn start(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self, stage: &str) -> Result<()> {
        match self.limit {
            Some(limit) if self.started.elapsed() > limit => Err(Error::ResourceLimit(format!(
                "{stage} exceeded the {} ms time budget",
                limit.as_millis()
            ))),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Runs the processing stages of one series with a fixed configuration.
///
/// Holds no state besides the configuration, so one instance can process
/// any number of independent captures.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate the configuration up front.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Decode every record into amplitude and phase spectra.
    ///
    /// Blank records are skipped silently. Malformed ones follow the
    /// configured policy. A change of subcarrier count is always fatal.
    pub fn decode(&self, records: &[RawRecord]) -> Result<DecodedCapture> {
        let deadline = Deadline::start(self.config.budget.time_limit());
        self.decode_within(records, &deadline)
    }

    fn decode_within(&self, records: &[RawRecord], deadline: &Deadline) -> Result<DecodedCapture> {
        let budget = &self.config.budget;
        if records.len() > budget.max_records {
            return Err(Error::ResourceLimit(format!(
                "{} records exceed the limit of {}",
                records.len(),
                budget.max_records
            )));
        }

        let mut capture = DecodedCapture::default();
        let mut amp_rows = Vec::with_capacity(records.len());
        let mut phase_rows = Vec::with_capacity(records.len());
        let mut width: Option<usize> = None;

        for (row, record) in records.iter().enumerate() {
            if row % DEADLINE_STRIDE == 0 {
                deadline.check("decoding")?;
            }
            if record.is_blank() {
                capture.blank += 1;
                continue;
            }

            let spectrum = match decode_record(record) {
                Ok(s) => s,
                Err(e) => match self.config.on_malformed {
                    MalformedPolicy::Abort => return Err(e),
                    MalformedPolicy::Skip => {
                        warn!("Skipping row {row} ({}): {e}", record.timestamp);
                        capture.skipped.push(SkippedRecord {
                            row,
                            timestamp: record.timestamp.clone(),
                            error: e,
                        });
                        continue;
                    }
                },
            };
            if spectrum.is_empty() {
                capture.blank += 1;
                continue;
            }
            if spectrum.len() > budget.max_subcarriers {
                return Err(Error::ResourceLimit(format!(
                    "row {row} has {} subcarriers, limit is {}",
                    spectrum.len(),
                    budget.max_subcarriers
                )));
            }
            let expected = *width.get_or_insert(spectrum.len());
            if spectrum.len() != expected {
                return Err(Error::SubcarrierMismatch {
                    row,
                    expected,
                    actual: spectrum.len(),
                });
            }

            let timestamp = Timestamp::parse(&record.timestamp);
            if !timestamp.is_valid() {
                warn!("Row {row}: unparseable timestamp '{}'", record.timestamp);
                capture.invalid_timestamps += 1;
            }
            capture.source_rows.push(row);
            amp_rows.push(SpectrumRow::new(timestamp.clone(), amplitude(&spectrum)));
            phase_rows.push(SpectrumRow::new(timestamp, phase(&spectrum)));
        }

        capture.amplitude = SpectrumSeries::from_rows(amp_rows)?;
        capture.phase = SpectrumSeries::from_rows(phase_rows)?;
        debug!(
            "Decoded {} spectra x {} subcarriers ({} blank, {} skipped)",
            capture.len(),
            capture.subcarriers(),
            capture.blank,
            capture.skipped.len()
        );
        Ok(capture)
    }

    /// Smoothed view for persisting, rounded to the configured precision.
    pub fn smooth(&self, series: &SpectrumSeries) -> Result<SpectrumSeries> {
        self.config.smoothing.export_smoother()?.apply(series)
    }

    /// decode → smooth → correlate.
    ///
    /// `reference_index` counts input records, blank and malformed ones
    /// included. Naming a record that was dropped is an error.
    pub fn run_correlation(&self, records: &[RawRecord]) -> Result<CorrelationResult> {
        let reference = self.reference_index()?;
        let deadline = Deadline::start(self.config.budget.time_limit());
        let capture = self.decode_within(records, &deadline)?;
        let position = resolve_reference(&capture, reference, records.len())?;
        let smoothed = self.smooth_within(&capture.amplitude, &deadline)?;
        let mut result = CorrelationEngine::new(position, self.config.correlation.exclude_low_index)
            .correlate(&smoothed)?;
        result.reference_index = reference;
        deadline.check("correlation")?;
        Ok(result)
    }

    /// decode → smooth → (normalize) → lagged MSE.
    pub fn run_changes(&self, records: &[RawRecord]) -> Result<ChangeResult> {
        let detector = self.config.detection.detector()?;
        let deadline = Deadline::start(self.config.budget.time_limit());
        let capture = self.decode_within(records, &deadline)?;
        let mut smoothed = self.smooth_within(&capture.amplitude, &deadline)?;
        if self.config.detection.normalize {
            smoothed = normalize_series(&smoothed);
        }
        let result = detector.detect(&smoothed);
        deadline.check("change detection")?;
        Ok(result)
    }

    /// Full-precision smoothing that gives up once the deadline passes.
    fn smooth_within(&self, series: &SpectrumSeries, deadline: &Deadline) -> Result<SpectrumSeries> {
        let smoother = self.config.smoothing.smoother()?;
        debug!(
            "Smoothing {} rows, window {} ({})",
            series.len(),
            smoother.window(),
            smoother.mode()
        );
        let smoothed = smoother.apply_with(series, |row| {
            if row % DEADLINE_STRIDE == 0 {
                deadline.check("smoothing")
            } else {
                Ok(())
            }
        })?;
        deadline.check("smoothing")?;
        Ok(smoothed)
    }

    fn reference_index(&self) -> Result<usize> {
        self.config.correlation.reference_index.ok_or_else(|| {
            Error::invalid("reference_index", "must be set explicitly for correlation")
        })
    }
}

/// Map an input-row reference onto the decoded series.
fn resolve_reference(capture: &DecodedCapture, input_row: usize, total: usize) -> Result<usize> {
    if input_row >= total {
        return Err(Error::invalid(
            "reference_index",
            format!("{input_row} is out of range for {total} input records"),
        ));
    }
    capture.series_index(input_row).ok_or_else(|| {
        Error::invalid(
            "reference_index",
            format!("input record {input_row} is blank or malformed"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SmoothingMode;

    fn rec(ts: &str, payload: &str) -> RawRecord {
        RawRecord::new(ts, payload)
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.smoothing.window = 1;
        config.correlation.exclude_low_index = -1;
        config.detection.lag = 1;
        config
    }

    #[test]
    fn test_decode_skips_blank_and_malformed() {
        let pipeline = Pipeline::new(config()).unwrap();
        let records = vec![
            rec("00:00:00.000000", "[3,4,6,8]"),
            rec("00:00:00.100000", ""),
            rec("00:00:00.200000", "[1,2,3]"),
            rec("00:00:00.300000", "[0,1,1,0]"),
        ];
        let capture = pipeline.decode(&records).unwrap();
        assert_eq!(capture.len(), 2);
        assert_eq!(capture.subcarriers(), 2);
        assert_eq!(capture.blank, 1);
        assert_eq!(capture.skipped.len(), 1);
        assert_eq!(capture.skipped[0].row, 2);
        assert_eq!(capture.source_rows, vec![0, 3]);
        assert_eq!(capture.series_index(3), Some(1));
        assert_eq!(capture.series_index(1), None);
        assert!(matches!(capture.skipped[0].error, Error::MalformedRecord(_)));
        assert_eq!(capture.amplitude.get(0).unwrap().values, vec![5.0, 10.0]);
        let phases = &capture.phase.get(1).unwrap().values;
        assert!((phases[0] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(phases[1], 0.0);
    }

    #[test]
    fn test_abort_policy_surfaces_error() {
        let mut cfg = config();
        cfg.on_malformed = MalformedPolicy::Abort;
        let pipeline = Pipeline::new(cfg).unwrap();
        let err = pipeline
            .decode(&[rec("00:00.0", "[1,2]"), rec("00:00.1", "[1,x]")])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn test_width_change_is_fatal() {
        let pipeline = Pipeline::new(config()).unwrap();
        let err = pipeline
            .decode(&[rec("00:00.0", "[1,2,3,4]"), rec("00:00.1", "[1,2]")])
            .unwrap_err();
        assert_eq!(
            err,
            Error::SubcarrierMismatch {
                row: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_resource_limits() {
        let mut cfg = config();
        cfg.budget.max_records = 1;
        let pipeline = Pipeline::new(cfg).unwrap();
        let records = vec![rec("00:00.0", "[1,2]"), rec("00:00.1", "[1,2]")];
        assert!(matches!(pipeline.decode(&records), Err(Error::ResourceLimit(_))));

        let mut cfg = config();
        cfg.budget.max_subcarriers = 1;
        let pipeline = Pipeline::new(cfg).unwrap();
        assert!(matches!(
            pipeline.decode(&[rec("00:00.0", "[1,2,3,4]")]),
            Err(Error::ResourceLimit(_))
        ));
    }

    #[test]
    fn test_invalid_timestamps_are_counted() {
        let pipeline = Pipeline::new(config()).unwrap();
        let capture = pipeline.decode(&[rec("not a time", "[1,2]")]).unwrap();
        assert_eq!(capture.len(), 1);
        assert_eq!(capture.invalid_timestamps, 1);
        assert_eq!(capture.amplitude.get(0).unwrap().timestamp.label(), "not a time");
    }

    #[test]
    fn test_correlation_requires_reference() {
        let pipeline = Pipeline::new(config()).unwrap();
        let err = pipeline.run_correlation(&[rec("00:00.0", "[1,2]")]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                name: "reference_index",
                ..
            }
        ));
    }

    #[test]
    fn test_run_correlation() {
        let mut cfg = config();
        cfg.correlation.reference_index = Some(0);
        let pipeline = Pipeline::new(cfg).unwrap();
        // amplitudes [1,1,2,2] / [2,2,4,4] / [2,2,1,1]
        let records = vec![
            rec("00:00.0", "[1,0,0,1,2,0,0,2]"),
            rec("00:00.1", "[2,0,0,2,4,0,0,4]"),
            rec("00:00.2", "[2,0,0,2,1,0,0,1]"),
        ];
        let result = pipeline.run_correlation(&records).unwrap();
        assert_eq!(result.len(), 2);
        assert!((result.points[0].correlation - 1.0).abs() < 1e-12);
        assert!((result.points[1].correlation + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_run_changes() {
        let mut cfg = config();
        cfg.detection.threshold = 10.0;
        let pipeline = Pipeline::new(cfg).unwrap();
        let records = vec![
            rec("00:00.0", "[3,4,3,4]"),
            rec("00:00.1", "[3,4,3,4]"),
            rec("00:00.2", "[6,8,6,8]"),
            rec("00:00.3", "[6,8,6,8]"),
        ];
        let result = pipeline.run_changes(&records).unwrap();
        let mse: Vec<f64> = result.points.iter().map(|p| p.mse).collect();
        assert!(mse[0].is_nan());
        assert_eq!(mse[1], 0.0);
        assert!((mse[2] - 25.0).abs() < 1e-12);
        assert_eq!(mse[3], 0.0);
        assert_eq!(result.event_count(), 1);
        assert_eq!(result.first_event().unwrap().timestamp.label(), "00:00.2");
    }

    #[test]
    fn test_smooth_rounds_for_export() {
        let mut cfg = config();
        cfg.smoothing.window = 3;
        cfg.smoothing.mode = SmoothingMode::Trailing;
        cfg.smoothing.precision = Some(2);
        let pipeline = Pipeline::new(cfg).unwrap();
        let capture = pipeline
            .decode(&[rec("00:00.0", "[1,0]"), rec("00:00.1", "[1,0]"), rec("00:00.2", "[2,0]")])
            .unwrap();
        let smoothed = pipeline.smooth(&capture.amplitude).unwrap();
        assert_eq!(smoothed.get(2).unwrap().values, vec![1.33]);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut cfg = config();
        cfg.smoothing.window = 0;
        assert!(Pipeline::new(cfg).is_err());
    }

    #[test]
    fn test_reference_counts_input_rows() {
        let mut cfg = config();
        cfg.correlation.reference_index = Some(2);
        let pipeline = Pipeline::new(cfg).unwrap();
        // amplitudes [1,1,2,2] / blank / [2,2,4,4] / [2,2,1,1]
        let records = vec![
            rec("00:00.0", "[1,0,0,1,2,0,0,2]"),
            rec("00:00.1", ""),
            rec("00:00.2", "[2,0,0,2,4,0,0,4]"),
            rec("00:00.3", "[2,0,0,2,1,0,0,1]"),
        ];
        let result = pipeline.run_correlation(&records).unwrap();
        assert_eq!(result.reference_index, 2);
        let labels: Vec<&str> = result.points.iter().map(|p| p.timestamp.label()).collect();
        assert_eq!(labels, vec!["00:00.0", "00:00.3"]);
        assert!((result.points[0].correlation - 1.0).abs() < 1e-12);
        assert!((result.points[1].correlation + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reference_on_dropped_row_is_rejected() {
        let records = vec![
            rec("00:00.0", "[1,0,0,1,2,0,0,2]"),
            rec("00:00.1", ""),
            rec("00:00.2", "[1,x]"),
            rec("00:00.3", "[2,0,0,2,1,0,0,1]"),
        ];
        for reference in [1, 2, 4] {
            let mut cfg = config();
            cfg.correlation.reference_index = Some(reference);
            let err = Pipeline::new(cfg).unwrap().run_correlation(&records).unwrap_err();
            assert!(
                matches!(err, Error::InvalidParameter { name: "reference_index", .. }),
                "reference {reference}: {err}"
            );
        }
    }

    #[test]
    fn test_expired_deadline_stops_smoothing_early() {
        let mut cfg = config();
        cfg.smoothing.window = 5000;
        cfg.smoothing.mode = SmoothingMode::Centered;
        let pipeline = Pipeline::new(cfg).unwrap();
        let rows = (0..20_000)
            .map(|i| SpectrumRow::new(Timestamp::parse(&format!("{i}")), vec![i as f64; 64]))
            .collect();
        let series = SpectrumSeries::from_rows(rows).unwrap();

        let deadline = Deadline::start(Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(5));
        let started = Instant::now();
        let err = pipeline.smooth_within(&series, &deadline).unwrap_err();
        assert!(matches!(&err, Error::ResourceLimit(msg) if msg.starts_with("smoothing")));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_time_budget_fails_large_input() {
        let mut cfg = config();
        cfg.budget.time_limit_ms = Some(1);
        let pipeline = Pipeline::new(cfg).unwrap();
        let payload = format!("[{}]", vec!["3,4"; 64].join(","));
        let records: Vec<RawRecord> = (0..50_000)
            .map(|i| rec(&format!("00:00.{i}"), &payload))
            .collect();
        let started = Instant::now();
        assert!(matches!(pipeline.run_changes(&records), Err(Error::ResourceLimit(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_normalized_detection_ignores_uniform_gain() {
        let records = vec![
            rec("00:00.0", "[3,4,3,4]"),
            rec("00:00.1", "[6,8,6,8]"),
            rec("00:00.2", "[6,8,6,8]"),
        ];
        let mut cfg = config();
        cfg.detection.threshold = 10.0;
        let raw = Pipeline::new(cfg.clone()).unwrap().run_changes(&records).unwrap();
        assert_eq!(raw.event_count(), 1);

        cfg.detection.normalize = true;
        let normalized = Pipeline::new(cfg).unwrap().run_changes(&records).unwrap();
        assert_eq!(normalized.points[1].mse, 0.0);
        assert_eq!(normalized.event_count(), 0);
    }
}
