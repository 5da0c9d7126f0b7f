//! Pipeline configuration with documented defaults.
//!
//! Every knob is explicit; nothing is inferred from the data. The values
//! can be loaded from a JSON file and then overridden field by field from
//! the command line.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::signal::smoothing::{SmoothingMode, TemporalSmoother};
use crate::signal::ChangeDetector;

/// What to do with a record whose payload cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log and drop the record.
    #[default]
    Skip,
    /// Fail the whole series.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub window: usize,
    pub mode: SmoothingMode,
    pub min_periods: usize,
    /// Decimal places kept in emitted values; `None` keeps full precision.
    pub precision: Option<u32>,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 100,
            mode: SmoothingMode::Trailing,
            min_periods: 1,
            precision: Some(6),
        }
    }
}

impl SmoothingConfig {
    /// Full-precision smoother used inside the analysis chain.
    pub fn smoother(&self) -> Result<TemporalSmoother> {
        TemporalSmoother::new(self.window, self.mode, self.min_periods)
    }

    /// Smoother whose output is rounded for persisting.
    pub fn export_smoother(&self) -> Result<TemporalSmoother> {
        self.smoother()?.with_precision(self.precision)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Row used as the reference spectrum. Deliberately has no default.
    pub reference_index: Option<usize>,
    /// Subcarriers `0..=exclude_low_index` are left out; -1 keeps all.
    pub exclude_low_index: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            reference_index: None,
            exclude_low_index: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub lag: usize,
    pub threshold: f64,
    /// Subtract each spectrum's mean before differencing, so a uniform
    /// gain change across all subcarriers does not register as motion.
    pub normalize: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            lag: 10,
            threshold: 1.0,
            normalize: false,
        }
    }
}

impl DetectionConfig {
    pub fn detector(&self) -> Result<ChangeDetector> {
        ChangeDetector::new(self.lag, self.threshold)
    }
}

/// Size and time limits for a single series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBudget {
    pub max_records: usize,
    pub max_subcarriers: usize,
    pub time_limit_ms: Option<u64>,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            max_records: 5_000_000,
            max_subcarriers: 4096,
            time_limit_ms: None,
        }
    }
}

impl ResourceBudget {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub smoothing: SmoothingConfig,
    pub correlation: CorrelationConfig,
    pub detection: DetectionConfig,
    pub budget: ResourceBudget,
    pub on_malformed: MalformedPolicy,
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check every parameter before any data is touched.
    pub fn validate(&self) -> Result<()> {
        self.smoothing.export_smoother()?;
        self.detection.detector()?;
        if self.budget.max_records == 0 {
            return Err(Error::invalid("max_records", "must be at least 1"));
        }
        if self.budget.max_subcarriers == 0 {
            return Err(Error::invalid("max_subcarriers", "must be at least 1"));
        }
        if self.budget.time_limit_ms == Some(0) {
            return Err(Error::invalid("time_limit_ms", "must be positive when set"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.smoothing.window, 100);
        assert_eq!(config.smoothing.precision, Some(6));
        assert_eq!(config.correlation.exclude_low_index, 60);
        assert_eq!(config.correlation.reference_index, None);
        assert_eq!(config.detection.lag, 10);
        assert_eq!(config.on_malformed, MalformedPolicy::Skip);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "smoothing": { "window": 20, "mode": "centered" },
                "correlation": { "reference_index": 599 },
                "on_malformed": "abort"
            }"#,
        )
        .unwrap();
        assert_eq!(config.smoothing.window, 20);
        assert_eq!(config.smoothing.mode, SmoothingMode::Centered);
        assert_eq!(config.smoothing.min_periods, 1);
        assert_eq!(config.correlation.reference_index, Some(599));
        assert_eq!(config.correlation.exclude_low_index, 60);
        assert_eq!(config.on_malformed, MalformedPolicy::Abort);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.smoothing.window = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter { name: "window", .. })
        ));

        let mut config = PipelineConfig::default();
        config.detection.threshold = -1.0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter { name: "threshold", .. })
        ));

        let mut config = PipelineConfig::default();
        config.budget.time_limit_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.smoothing.precision = Some(16);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter { name: "precision", .. })
        ));
    }

    #[test]
    fn test_negative_window_is_a_parse_error() {
        assert!(PipelineConfig::from_json_str(r#"{"smoothing": {"window": -5}}"#).is_err());
    }
}
