//! Monitor normalization, Q conversion and empty-cell subtraction.

use std::f64::consts::PI;

use crate::data::model::{CorrectedPoint, SampleDataset};
use crate::error::{ReduceError, Result};

// ---------------------------------------------------------------------------
// Rocking curve
// ---------------------------------------------------------------------------

/// A monitor-normalized point on the rocking curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    /// Angle relative to the curve center, degrees.
    pub angle: f64,
    pub intensity: f64,
    pub uncertainty: f64,
}

/// Monitor-normalized rocking curve of one sample, centered on θ₀.
#[derive(Debug, Clone)]
pub struct RockingCurve {
    pub sample: String,
    /// θ₀ in absolute analyzer degrees.
    pub center: f64,
    /// Highest normalized intensity.
    pub peak: f64,
    /// Σ transmission / Σ monitor, when every row has a transmission count.
    pub transmission_rate: Option<f64>,
    /// Ordered by strictly increasing relative angle.
    pub points: Vec<NormalizedPoint>,
}

/// Normalize every measurement of `dataset` by its monitor count.
///
/// `I = counts / monitor` with Poisson errors on both counts combined in
/// quadrature. Counts below one are treated as one count for the error so
/// that empty intervals keep a finite weight.
pub fn rocking_curve(dataset: &SampleDataset, center_angle: Option<f64>) -> Result<RockingCurve> {
    let sample = dataset.name.clone();
    let mut raw = Vec::with_capacity(dataset.len());

    for m in dataset.measurements() {
        if m.monitor <= 0.0 {
            return Err(ReduceError::Division {
                sample,
                message: format!("zero monitor count at angle {}", m.angle),
            });
        }
        let intensity = m.counts / m.monitor;
        let effective = m.counts.max(1.0);
        let uncertainty = effective / m.monitor * (1.0 / effective + 1.0 / m.monitor).sqrt();
        raw.push((m.angle, intensity, uncertainty));
    }

    let Some(&(peak_angle, peak, _)) = raw
        .iter()
        .reduce(|best, p| if p.1 > best.1 { p } else { best })
    else {
        return Err(ReduceError::Division {
            sample,
            message: "no measurements".to_string(),
        });
    };

    let center = center_angle.unwrap_or(peak_angle);
    let points = raw
        .into_iter()
        .map(|(angle, intensity, uncertainty)| NormalizedPoint {
            angle: angle - center,
            intensity,
            uncertainty,
        })
        .collect();

    let transmission_rate = dataset
        .total_transmission()
        .map(|t| t / dataset.total_monitor());

    Ok(RockingCurve {
        sample,
        center,
        peak,
        transmission_rate,
        points,
    })
}

impl RockingCurve {
    /// Linear interpolation of intensity and uncertainty at a relative angle,
    /// clamped to the end points outside the measured range.
    pub fn interpolate(&self, angle: f64) -> (f64, f64) {
        let pts = &self.points;
        let (Some(first), Some(last)) = (pts.first(), pts.last()) else {
            return (0.0, 0.0);
        };
        if angle <= first.angle {
            return (first.intensity, first.uncertainty);
        }
        if angle >= last.angle {
            return (last.intensity, last.uncertainty);
        }
        // first.angle < angle < last.angle, so 1 <= idx < len
        let idx = pts.partition_point(|p| p.angle <= angle);
        let (a, b) = (pts[idx - 1], pts[idx]);
        let t = (angle - a.angle) / (b.angle - a.angle);
        (
            a.intensity + t * (b.intensity - a.intensity),
            a.uncertainty + t * (b.uncertainty - a.uncertainty),
        )
    }
}

// ---------------------------------------------------------------------------
// Transmission and subtraction
// ---------------------------------------------------------------------------

/// Rocking-curve transmission of `sample` relative to the empty cell.
///
/// Uses the transmission detector when both curves have it, the ratio of
/// peak intensities otherwise.
pub fn transmission(sample: &RockingCurve, background: &RockingCurve) -> Result<f64> {
    let t = match (sample.transmission_rate, background.transmission_rate) {
        (Some(s), Some(b)) => s / b,
        _ => sample.peak / background.peak,
    };
    if !(t.is_finite() && t > 0.0) {
        return Err(ReduceError::Division {
            sample: sample.sample.clone(),
            message: format!(
                "degenerate transmission {t} relative to '{}'",
                background.sample
            ),
        });
    }
    Ok(t)
}

/// Momentum transfer for an angle offset in degrees and a wavelength in Å.
pub fn q_from_angle(delta_deg: f64, wavelength: f64) -> f64 {
    4.0 * PI / wavelength * (delta_deg.to_radians() / 2.0).sin()
}

/// Convert a rocking curve to Q and subtract `T · I_bg` when a background is
/// given. Points at or below the curve center are dropped.
pub fn correct(
    curve: &RockingCurve,
    background: Option<(&RockingCurve, f64)>,
    wavelength: f64,
) -> Vec<CorrectedPoint> {
    curve
        .points
        .iter()
        .filter(|p| p.angle > 0.0)
        .map(|p| {
            let (intensity, uncertainty) = match background {
                Some((bg, t)) => {
                    let (bi, bu) = bg.interpolate(p.angle);
                    (
                        p.intensity - t * bi,
                        p.uncertainty.hypot(t * bu),
                    )
                }
                None => (p.intensity, p.uncertainty),
            };
            CorrectedPoint {
                angle: p.angle,
                q: q_from_angle(p.angle, wavelength),
                intensity,
                uncertainty,
            }
        })
        .collect()
}
