/// Signal processing core: pure transforms over in-memory series.
///
/// ```text
///   payload text
///        │
///        ▼
///   ┌──────────┐
///   │ decoder  │  "[r0,i0,...]" → Vec<Complex64>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ spectrum │  amplitude / phase per subcarrier
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ smoothing │  trailing or centered moving average over time
///   └───────────┘
///        │
///        ├──────────────────────────┐
///        ▼                          ▼
///   ┌─────────────────────┐    ┌────────┐
///   │ baseline + mask +   │    │ change │  lagged-difference MSE
///   │ correlation         │    └────────┘
///   └─────────────────────┘
/// ```

pub mod baseline;
pub mod change;
pub mod correlation;
pub mod decoder;
pub mod mask;
pub mod smoothing;
pub mod spectrum;

pub use baseline::{normalize, normalize_series};
pub use change::{detect_changes, ChangeDetector};
pub use correlation::{correlate, pearson, CorrelationEngine};
pub use decoder::{decode, decode_record};
pub use smoothing::{smooth, SmoothingMode, TemporalSmoother};
pub use spectrum::{amplitude, phase};
