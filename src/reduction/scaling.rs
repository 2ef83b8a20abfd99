//! Absolute-intensity calibration.

use crate::config::{CalibrationConfig, ReferenceStandard};
use crate::data::model::{Bin, CorrectedPoint, ReducedCurve, ScaleMode};
use crate::error::{ReduceError, Result};

/// Everything that goes into one sample's calibration factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Rocking-curve transmission relative to the empty cell.
    pub transmission: f64,
    /// Thickness in cm.
    pub thickness: f64,
    /// Absolute-intensity constant (explicit, from the reference standard,
    /// or 1).
    pub constant: f64,
}

impl Calibration {
    /// `constant / (transmission · thickness)`.
    pub fn factor(&self) -> f64 {
        self.constant / (self.transmission * self.thickness)
    }
}

/// Thickness of `sample`, rejecting non-positive values.
pub fn thickness(sample: &str, config: &CalibrationConfig) -> Result<f64> {
    let d = config.thickness_of(sample);
    if !(d.is_finite() && d > 0.0) {
        return Err(ReduceError::Division {
            sample: sample.to_string(),
            message: format!("thickness must be positive, got {d}"),
        });
    }
    Ok(d)
}

/// Calibration constant from a reference standard of known cross-section.
///
/// The reference's corrected points inside the Q window are normalized by
/// transmission and thickness and averaged with inverse-variance weights.
/// Returns `None` when no usable point falls in the window.
pub fn reference_constant(
    reference: &ReferenceStandard,
    points: &[CorrectedPoint],
    transmission: f64,
    thickness: f64,
) -> Option<f64> {
    let norm = transmission * thickness;
    let (weight, weighted) = points
        .iter()
        .filter(|p| p.q >= reference.q_min && p.q <= reference.q_max)
        .filter(|p| p.uncertainty > 0.0)
        .fold((0.0, 0.0), |(w_sum, wi_sum), p| {
            let i = p.intensity / norm;
            let u = p.uncertainty / norm;
            let w = 1.0 / (u * u);
            (w_sum + w, wi_sum + w * i)
        });
    if weight <= 0.0 {
        return None;
    }
    let mean = weighted / weight;
    if !(mean.is_finite() && mean > 0.0) {
        return None;
    }
    Some(reference.cross_section / mean)
}

/// Constant for `sample`: explicit factor first, then the reference value,
/// then 1.
pub fn resolve_constant(sample: &str, config: &CalibrationConfig, reference: Option<f64>) -> f64 {
    config
        .factors
        .get(sample)
        .copied()
        .or(reference)
        .unwrap_or(1.0)
}

/// Turn bins into an output curve for the given scale mode.
pub fn scale(bins: &[Bin], mode: ScaleMode, calibration: &Calibration) -> ReducedCurve {
    let factor = match mode {
        ScaleMode::Scaled => calibration.factor(),
        ScaleMode::Unscaled => 1.0,
    };
    ReducedCurve::from_bins(bins, factor)
}
