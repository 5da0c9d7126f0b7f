/// Data layer: core types, loading, and export.
///
/// Architecture:
/// ```text
///  .csv / .json capture
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Vec<RawRecord>
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    model      │  RawRecord, SpectrumSeries, Correlation/ChangeResult
///   └──────────────┘
///        │   (signal processing happens in `crate::signal`)
///        ▼
///   ┌──────────┐
///   │  export   │  series / correlation / MSE → CSV
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
