//! # rusty-csi
//!
//! Offline analysis of WiFi Channel State Information (CSI) captures.
//!
//! Each capture row holds a timestamp and a `[r0, i0, r1, i1, ...]` list
//! of interleaved real/imaginary subcarrier samples. The crate turns those
//! rows into amplitude and phase spectra, smooths them along time, and
//! scores them either by correlation against a reference spectrum or by
//! lagged-difference MSE for motion detection.
//!
//! ## Stages
//!
//! 1. **Decoding**: payload text → complex subcarrier vector
//! 2. **Spectrum**: amplitude (modulus) and phase (argument)
//! 3. **Smoothing**: trailing or centered moving average per subcarrier
//! 4. **Baseline**: zero-mean normalisation of each spectrum
//! 5. **Scoring**: masked Pearson correlation, or MSE change detection
//!
//! Everything is a pure function of the input rows and the
//! [`config::PipelineConfig`]; independent captures can be processed in
//! parallel without coordination.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod signal;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{DecodedCapture, Pipeline};
