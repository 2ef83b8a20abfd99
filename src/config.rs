//! Reduction configuration.
//!
//! [`ReductionConfig`] is the only input of [`crate::reduce`]: the caller (the
//! CLI, or a test) resolves paths and flags once and hands over an immutable
//! value. Everything instrument-specific lives in [`ReductionSettings`], which
//! can be loaded from a JSON file where every field is optional.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReduceError, Result};
use crate::reduction::binning::MAX_BINS;

const MAX_LOG_BINS_PER_DECADE: usize = 1_000;

// ---------------------------------------------------------------------------
// Entry-point configuration
// ---------------------------------------------------------------------------

/// Resolved parameters for one reduction run.
#[derive(Debug, Clone)]
pub struct ReductionConfig {
    /// Input CSV log.
    pub path: PathBuf,
    /// Directory receiving the `UN_*.txt` files (created if absent).
    pub output: PathBuf,
    /// Log-bin the primary and `_unscaled` curves as well.
    pub logbin: bool,
    pub settings: ReductionSettings,
}

impl ReductionConfig {
    /// Configuration with default settings.
    pub fn new(path: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            output: output.into(),
            logbin: false,
            settings: ReductionSettings::default(),
        }
    }

    pub fn with_logbin(mut self, logbin: bool) -> Self {
        self.logbin = logbin;
        self
    }

    pub fn with_settings(mut self, settings: ReductionSettings) -> Self {
        self.settings = settings;
        self
    }
}

// ---------------------------------------------------------------------------
// Settings file
// ---------------------------------------------------------------------------

/// Instrument and reduction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionSettings {
    pub columns: ColumnSchema,
    /// Name of the empty-cell sample subtracted from all others.
    pub background: Option<String>,
    pub instrument: InstrumentConfig,
    pub binning: BinningConfig,
    pub calibration: CalibrationConfig,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        Self {
            columns: ColumnSchema::default(),
            background: Some("EmptyPCell".to_string()),
            instrument: InstrumentConfig::default(),
            binning: BinningConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl ReductionSettings {
    /// Load settings from a JSON file and validate them.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ReduceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: ReductionSettings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the reduction cannot work with.
    pub fn validate(&self) -> Result<()> {
        let wl = self.instrument.wavelength;
        if !(wl.is_finite() && wl > 0.0) {
            return Err(ReduceError::Config(format!(
                "wavelength must be positive, got {wl}"
            )));
        }
        let per_decade = self.binning.log_bins_per_decade;
        if !(1..=MAX_LOG_BINS_PER_DECADE).contains(&per_decade) {
            return Err(ReduceError::Config(format!(
                "log_bins_per_decade must be in 1..={MAX_LOG_BINS_PER_DECADE}, got {per_decade}"
            )));
        }
        if let Some(n) = self.binning.linear_bins {
            if !(1..=MAX_BINS).contains(&n) {
                return Err(ReduceError::Config(format!(
                    "linear_bins must be in 1..={MAX_BINS}, got {n}"
                )));
            }
        }
        if let Some(reference) = &self.calibration.reference {
            if !(reference.cross_section.is_finite() && reference.cross_section > 0.0) {
                return Err(ReduceError::Config(format!(
                    "reference cross section must be positive, got {}",
                    reference.cross_section
                )));
            }
        }
        Ok(())
    }

    /// Whether `sample` is the configured empty cell.
    pub fn is_background(&self, sample: &str) -> bool {
        self.background.as_deref() == Some(sample)
    }
}

/// Header names of the CSV log. Matching ignores case and surrounding
/// whitespace. `transmission` and `run` are optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSchema {
    pub sample: String,
    pub angle: String,
    pub counts: String,
    pub monitor: String,
    pub transmission: String,
    pub run: String,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            sample: "sample".to_string(),
            angle: "angle".to_string(),
            counts: "counts".to_string(),
            monitor: "monitor".to_string(),
            transmission: "transmission".to_string(),
            run: "run".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Neutron wavelength in Å.
    #[serde(default = "default_wavelength")]
    pub wavelength: f64,

    /// Rocking-curve center in degrees. `None` uses the peak of each sample.
    #[serde(default)]
    pub center_angle: Option<f64>,
}

fn default_wavelength() -> f64 {
    3.6
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            wavelength: default_wavelength(),
            center_angle: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinningConfig {
    /// Number of linear bins. `None` uses one bin per measured point.
    #[serde(default)]
    pub linear_bins: Option<usize>,

    #[serde(default = "default_log_bins_per_decade")]
    pub log_bins_per_decade: usize,
}

fn default_log_bins_per_decade() -> usize {
    10
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            linear_bins: None,
            log_bins_per_decade: default_log_bins_per_decade(),
        }
    }
}

/// Absolute-intensity calibration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Explicit per-sample calibration constants.
    pub factors: BTreeMap<String, f64>,
    /// Sample thickness in cm (default 1.0).
    pub thickness: BTreeMap<String, f64>,
    pub reference: Option<ReferenceStandard>,
}

/// A sample of known differential cross-section used to derive the
/// calibration constant of samples without an explicit factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceStandard {
    pub sample: String,
    /// Known cross-section in cm⁻¹ sr⁻¹ over the window below.
    pub cross_section: f64,
    #[serde(default)]
    pub q_min: f64,
    #[serde(default = "default_reference_q_max")]
    pub q_max: f64,
}

fn default_reference_q_max() -> f64 {
    f64::INFINITY
}

impl CalibrationConfig {
    pub fn thickness_of(&self, sample: &str) -> f64 {
        self.thickness.get(sample).copied().unwrap_or(1.0)
    }
}
