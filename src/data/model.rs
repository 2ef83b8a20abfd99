use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ReduceError, Result};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a run-metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed value for CSV columns the reduction does not interpret
/// (temperature, comments, scan flags...).
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl MetadataValue {
    /// Infer the narrowest type for a raw CSV cell.
    pub fn guess(s: &str) -> Self {
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        if s == "true" || s == "false" {
            return MetadataValue::Bool(s == "true");
        }
        MetadataValue::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// RawMeasurement – one row of the CSV log
// ---------------------------------------------------------------------------

/// A single counting interval at one analyzer angle.
#[derive(Debug, Clone)]
pub struct RawMeasurement {
    pub sample: String,
    /// Analyzer angle in degrees.
    pub angle: f64,
    /// Main detector counts.
    pub counts: f64,
    /// Monitor counts for the same interval.
    pub monitor: f64,
    /// Transmission detector counts, when the log has that column.
    pub transmission: Option<f64>,
    pub run: Option<String>,
    /// 1-based line number in the source file.
    pub line: usize,
    /// Remaining columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

// ---------------------------------------------------------------------------
// SampleDataset – all rows of one sample
// ---------------------------------------------------------------------------

/// All measurements of one sample, ordered by strictly increasing angle.
#[derive(Debug, Clone)]
pub struct SampleDataset {
    pub name: String,
    measurements: Vec<RawMeasurement>,
}

impl SampleDataset {
    /// Build a dataset, checking the angle ordering. Rows are never
    /// reordered: an out-of-order row is an error.
    pub fn from_measurements(
        name: impl Into<String>,
        measurements: Vec<RawMeasurement>,
    ) -> Result<Self> {
        let name = name.into();
        for pair in measurements.windows(2) {
            if !(pair[1].angle > pair[0].angle) {
                return Err(ReduceError::UnorderedAngles {
                    sample: name,
                    line: pair[1].line,
                });
            }
        }
        Ok(Self { name, measurements })
    }

    pub fn measurements(&self) -> &[RawMeasurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn total_monitor(&self) -> f64 {
        self.measurements.iter().map(|m| m.monitor).sum()
    }

    /// Summed transmission counts, or `None` if any row lacks them.
    pub fn total_transmission(&self) -> Option<f64> {
        self.measurements.iter().map(|m| m.transmission).sum()
    }
}

// ---------------------------------------------------------------------------
// Derived stages
// ---------------------------------------------------------------------------

/// A measurement after monitor normalization and background subtraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedPoint {
    /// Angle relative to the rocking-curve center, degrees.
    pub angle: f64,
    /// Momentum transfer in Å⁻¹.
    pub q: f64,
    pub intensity: f64,
    pub uncertainty: f64,
}

/// One aggregated Q interval. `[q_low, q_high)` except for the last bin of a
/// sequence, which also holds its upper edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub q_low: f64,
    pub q_high: f64,
    /// Mean Q of the contributing points.
    pub q: f64,
    pub intensity: f64,
    pub uncertainty: f64,
    /// Number of contributing points, always at least one.
    pub count: usize,
}

impl Bin {
    pub fn half_width(&self) -> f64 {
        0.5 * (self.q_high - self.q_low)
    }
}

/// One output row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub q: f64,
    pub intensity: f64,
    pub uncertainty: f64,
    /// Half-width of the source bin.
    pub q_resolution: f64,
}

/// The curve written for one (sample, variant).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReducedCurve {
    pub points: Vec<CurvePoint>,
}

impl ReducedCurve {
    /// Turn bins into output rows, multiplying intensity and uncertainty by
    /// `factor`.
    pub fn from_bins(bins: &[Bin], factor: f64) -> Self {
        let points = bins
            .iter()
            .map(|b| CurvePoint {
                q: b.q,
                intensity: b.intensity * factor,
                uncertainty: b.uncertainty * factor.abs(),
                q_resolution: b.half_width(),
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Output variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinMode {
    Linear,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScaleMode {
    /// Multiplied by the sample's calibration factor.
    Scaled,
    /// Factor 1.
    Unscaled,
}

/// The four curves written per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    Primary,
    LogScaled,
    Log,
    Unscaled,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Primary,
        Variant::LogScaled,
        Variant::Log,
        Variant::Unscaled,
    ];

    /// File-name suffix after `UN_<sample>_det_1`.
    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Primary => "",
            Variant::LogScaled => "_lbs",
            Variant::Log => "_lb",
            Variant::Unscaled => "_unscaled",
        }
    }

    /// Binning used for this variant. `logbin` switches the linear variants
    /// to log bins.
    pub fn bin_mode(self, logbin: bool) -> BinMode {
        match self {
            Variant::LogScaled | Variant::Log => BinMode::Log,
            Variant::Primary | Variant::Unscaled if logbin => BinMode::Log,
            Variant::Primary | Variant::Unscaled => BinMode::Linear,
        }
    }

    /// Scale mode, or `None` when the variant does not exist for the sample.
    /// The background has nothing subtracted and no calibration: its primary
    /// curve is unscaled and it has no `_lbs` curve.
    pub fn scale_mode(self, is_background: bool) -> Option<ScaleMode> {
        match (self, is_background) {
            (Variant::LogScaled, true) => None,
            (Variant::Primary, true) => Some(ScaleMode::Unscaled),
            (Variant::Primary | Variant::LogScaled, false) => Some(ScaleMode::Scaled),
            (Variant::Log | Variant::Unscaled, _) => Some(ScaleMode::Unscaled),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Primary => "primary",
            Variant::LogScaled => "log-scaled",
            Variant::Log => "log",
            Variant::Unscaled => "unscaled",
        };
        write!(f, "{name}")
    }
}
