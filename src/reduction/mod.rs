/// Reduction stages, from normalized rocking curves to calibrated I(Q).
///
/// ```text
///   SampleDataset
///        │
///        ▼
///   ┌──────────┐
///   │ correct   │  monitor normalization, Q, empty-cell subtraction
///   └──────────┘
///        │  CorrectedPoint
///        ▼
///   ┌──────────┐
///   │ binning   │  linear / log bins, inverse-variance weights
///   └──────────┘
///        │  Bin
///        ▼
///   ┌──────────┐
///   │ scaling   │  calibration factor → ReducedCurve
///   └──────────┘
/// ```
///
/// `pipeline` strings the stages together per sample.

pub mod binning;
pub mod correct;
pub mod pipeline;
pub mod scaling;
