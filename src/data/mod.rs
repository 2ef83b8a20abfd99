/// Data layer: core types, CSV loading, and curve output.
///
/// Architecture:
/// ```text
///      setup.csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows → SampleDataset per sample
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ SampleDataset │  RawMeasurement rows, angle-ordered
///   └──────────────┘
///        ⋮  (reduction)
///        ▼
///   ┌──────────┐
///   │  writer   │  ReducedCurve → UN_<sample>_det_1<suffix>.txt
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
