//! Reduction of USANS rocking-curve logs into I(Q) curves.
//!
//! The crate reads a CSV log of per-angle detector and monitor counts,
//! normalizes and background-corrects each sample, bins the result in Q and
//! writes four text curves per sample:
//!
//! | file                          | binning | scale    |
//! |-------------------------------|---------|----------|
//! | `UN_<sample>_det_1.txt`       | linear  | scaled   |
//! | `UN_<sample>_det_1_lbs.txt`   | log     | scaled   |
//! | `UN_<sample>_det_1_lb.txt`    | log     | unscaled |
//! | `UN_<sample>_det_1_unscaled.txt` | linear | unscaled |
//!
//! The empty-cell sample is never scaled: its primary curve is unscaled and
//! it has no `_lbs` curve. With `logbin` the linear curves are log-binned too.
//!
//! ```no_run
//! use usans_reduce::{reduce, ReductionConfig};
//!
//! let config = ReductionConfig::new("setup.csv", "reduced");
//! let report = reduce(&config).unwrap();
//! assert!(report.is_complete());
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod reduction;

pub use config::{ReductionConfig, ReductionSettings};
pub use data::model::{BinMode, ReducedCurve, ScaleMode, Variant};
pub use error::{ReduceError, Result};
pub use reduction::pipeline::{reduce, ReductionReport};
