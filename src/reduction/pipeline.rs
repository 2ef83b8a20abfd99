use std::collections::BTreeMap;
use std::path::PathBuf;

use rayon::prelude::*;

use super::binning::bin_points;
use super::correct::{correct, rocking_curve, transmission, RockingCurve};
use super::scaling::{reference_constant, resolve_constant, scale, thickness, Calibration};
use crate::config::{ReductionConfig, ReductionSettings};
use crate::data::loader::load_csv;
use crate::data::model::{Bin, BinMode, CorrectedPoint, ReducedCurve, Variant};
use crate::data::writer::write_curve;
use crate::error::{ReduceError, Result};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of a reduction run.
#[derive(Debug, Default)]
pub struct ReductionReport {
    /// Files written per sample, in variant order.
    pub written: BTreeMap<String, Vec<PathBuf>>,
    /// Variants left out because no bin had data.
    pub skipped: BTreeMap<String, Vec<Variant>>,
    /// Samples whose reduction failed. Other samples are unaffected.
    pub failures: BTreeMap<String, ReduceError>,
}

impl ReductionReport {
    /// Whether every sample was reduced.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.written.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Reduce the log at `config.path` into `config.output`.
///
/// Pipeline:
/// ```text
///  load_csv ─▶ rocking_curve ─▶ correct ─▶ bin_points ─▶ scale ─▶ write_curve
///               (per sample, in parallel)  (linear/log)  (scaled/unscaled)
/// ```
///
/// Input and configuration problems are returned as `Err`. Numeric problems
/// of one sample are collected in the report while the other samples are
/// still written.
pub fn reduce(config: &ReductionConfig) -> Result<ReductionReport> {
    let settings = &config.settings;
    settings.validate()?;

    let datasets = load_csv(&config.path, &settings.columns)?;
    log::info!(
        "Loaded {} samples from {}",
        datasets.len(),
        config.path.display()
    );
    if datasets.is_empty() {
        log::warn!("No measurements in {}", config.path.display());
    }

    let mut report = ReductionReport::default();

    // ---- Normalization (per sample) ----
    let center = settings.instrument.center_angle;
    let normalized: BTreeMap<String, Result<RockingCurve>> = datasets
        .par_iter()
        .map(|(name, ds)| (name.clone(), rocking_curve(ds, center)))
        .collect();

    let mut curves = BTreeMap::new();
    for (name, result) in normalized {
        match result {
            Ok(curve) => {
                curves.insert(name, curve);
            }
            Err(e) => {
                report.failures.insert(name, e);
            }
        }
    }

    let background = resolve_background(settings, &curves, &report.failures);

    // ---- Correction (per sample) ----
    let corrected: BTreeMap<String, Result<Corrected>> = curves
        .par_iter()
        .map(|(name, curve)| (name.clone(), correct_sample(name, curve, &background, settings)))
        .collect();

    let reference = calibration_reference(settings, &corrected);

    // ---- Binning and scaling (per sample) ----
    let reduced: BTreeMap<String, Result<Vec<(Variant, ReducedCurve)>>> = corrected
        .into_par_iter()
        .map(|(name, result)| {
            let curves = result
                .and_then(|c| sample_curves(&name, &c, settings, config.logbin, reference));
            (name, curves)
        })
        .collect();

    // ---- Output (sequential, deterministic order) ----
    for (name, result) in reduced {
        let curves = match result {
            Ok(curves) => curves,
            Err(e) => {
                report.failures.insert(name, e);
                continue;
            }
        };
        for (variant, curve) in curves {
            match write_curve(&config.output, &name, variant, &curve) {
                Ok(Some(path)) => report.written.entry(name.clone()).or_default().push(path),
                Ok(None) => {
                    log::debug!("Sample '{name}': no data for the {variant} curve, skipped");
                    report.skipped.entry(name.clone()).or_default().push(variant);
                }
                Err(e) => {
                    report.failures.insert(name.clone(), e);
                    break;
                }
            }
        }
    }

    for (name, e) in &report.failures {
        log::error!("Sample '{name}' failed: {e}");
    }
    log::info!(
        "Wrote {} files for {} samples into {}",
        report.file_count(),
        report.written.len(),
        config.output.display()
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

enum Background<'a> {
    /// No empty cell configured or present: nothing is subtracted.
    None,
    Curve(&'a RockingCurve),
    /// The empty cell itself failed; samples depending on it fail too.
    Failed(&'a str),
}

fn resolve_background<'a>(
    settings: &'a ReductionSettings,
    curves: &'a BTreeMap<String, RockingCurve>,
    failures: &BTreeMap<String, ReduceError>,
) -> Background<'a> {
    let Some(name) = settings.background.as_deref() else {
        return Background::None;
    };
    if let Some(curve) = curves.get(name) {
        return Background::Curve(curve);
    }
    if failures.contains_key(name) {
        return Background::Failed(name);
    }
    log::warn!("Background sample '{name}' not found in input, no subtraction");
    Background::None
}

struct Corrected {
    points: Vec<CorrectedPoint>,
    transmission: f64,
    thickness: f64,
    is_background: bool,
}

fn correct_sample(
    name: &str,
    curve: &RockingCurve,
    background: &Background<'_>,
    settings: &ReductionSettings,
) -> Result<Corrected> {
    let wavelength = settings.instrument.wavelength;
    if settings.is_background(name) {
        return Ok(Corrected {
            points: correct(curve, None, wavelength),
            transmission: 1.0,
            thickness: 1.0,
            is_background: true,
        });
    }

    let thickness = thickness(name, &settings.calibration)?;
    let (points, transmission) = match background {
        Background::None => (correct(curve, None, wavelength), 1.0),
        Background::Curve(bg) => {
            let t = transmission(curve, bg)?;
            log::debug!("Sample '{name}': transmission {t:.4}");
            (correct(curve, Some((*bg, t)), wavelength), t)
        }
        Background::Failed(bg) => {
            return Err(ReduceError::Division {
                sample: name.to_string(),
                message: format!("background '{bg}' could not be normalized"),
            });
        }
    };

    Ok(Corrected {
        points,
        transmission,
        thickness,
        is_background: false,
    })
}

fn calibration_reference(
    settings: &ReductionSettings,
    corrected: &BTreeMap<String, Result<Corrected>>,
) -> Option<f64> {
    let reference = settings.calibration.reference.as_ref()?;
    let constant = match corrected.get(&reference.sample) {
        Some(Ok(c)) => reference_constant(reference, &c.points, c.transmission, c.thickness),
        _ => None,
    };
    match constant {
        Some(k) => log::info!("Calibration constant {k:.6e} from '{}'", reference.sample),
        None => log::warn!(
            "Reference standard '{}' unusable, calibration constant defaults to 1",
            reference.sample
        ),
    }
    constant
}

fn sample_curves(
    name: &str,
    corrected: &Corrected,
    settings: &ReductionSettings,
    logbin: bool,
    reference: Option<f64>,
) -> Result<Vec<(Variant, ReducedCurve)>> {
    let calibration = Calibration {
        transmission: corrected.transmission,
        thickness: corrected.thickness,
        constant: resolve_constant(name, &settings.calibration, reference),
    };

    let mut bins: BTreeMap<BinMode, Vec<Bin>> = BTreeMap::new();
    let mut out = Vec::with_capacity(Variant::ALL.len());
    for variant in Variant::ALL {
        let Some(scale_mode) = variant.scale_mode(corrected.is_background) else {
            continue;
        };
        let mode = variant.bin_mode(logbin);
        if !bins.contains_key(&mode) {
            let binned = bin_points(name, &corrected.points, mode, &settings.binning)?;
            bins.insert(mode, binned);
        }
        out.push((variant, scale(&bins[&mode], scale_mode, &calibration)));
    }
    Ok(out)
}
