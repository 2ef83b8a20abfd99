//! Text writer for reduced curves.
//!
//! Each (sample, variant) becomes `UN_<sample>_det_1<suffix>.txt`, one
//! `Q,I,dI,dQ` row per bin. Files are written to a temporary file next to the
//! destination and renamed into place, so a failed write never leaves a
//! truncated curve behind.

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::model::{ReducedCurve, Variant};
use crate::error::{ReduceError, Result};

/// Output file name for one curve.
pub fn output_file_name(sample: &str, variant: Variant) -> String {
    format!("UN_{sample}_det_1{}.txt", variant.suffix())
}

/// Render a curve as comma-separated rows. Floats use the shortest
/// representation that parses back to the same value.
pub fn format_curve(curve: &ReducedCurve) -> String {
    let mut out = String::with_capacity(curve.len() * 64);
    for p in &curve.points {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{},{},{},{}",
            p.q, p.intensity, p.uncertainty, p.q_resolution
        );
    }
    out
}

/// Write `curve` into `dir`, creating the directory if needed.
///
/// Returns `Ok(None)` without touching the filesystem when the curve has no
/// points.
pub fn write_curve(
    dir: &Path,
    sample: &str,
    variant: Variant,
    curve: &ReducedCurve,
) -> Result<Option<PathBuf>> {
    if curve.is_empty() {
        return Ok(None);
    }

    ensure_dir(dir)?;
    let path = dir.join(output_file_name(sample, variant));
    let io_err = |source| ReduceError::Io {
        path: path.clone(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(format_curve(curve).as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(&path).map_err(|e| io_err(e.error))?;

    log::debug!("Wrote {} points to {}", curve.len(), path.display());
    Ok(Some(path))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| ReduceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CurvePoint;
    use tempfile::TempDir;

    fn curve() -> ReducedCurve {
        ReducedCurve {
            points: vec![
                CurvePoint {
                    q: 1.5e-5,
                    intensity: 120.25,
                    uncertainty: 0.5,
                    q_resolution: 2.5e-6,
                },
                CurvePoint {
                    q: 2e-5,
                    intensity: -3.0,
                    uncertainty: 1.0,
                    q_resolution: 2.5e-6,
                },
            ],
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(output_file_name("S115_dry", Variant::Primary), "UN_S115_dry_det_1.txt");
        assert_eq!(output_file_name("S115_dry", Variant::LogScaled), "UN_S115_dry_det_1_lbs.txt");
        assert_eq!(output_file_name("S115_dry", Variant::Log), "UN_S115_dry_det_1_lb.txt");
        assert_eq!(
            output_file_name("S115_dry", Variant::Unscaled),
            "UN_S115_dry_det_1_unscaled.txt"
        );
    }

    #[test]
    fn test_format_round_trips() {
        let text = format_curve(&curve());
        let rows: Vec<Vec<f64>> = text
            .lines()
            .map(|l| l.split(',').map(|v| v.parse().unwrap()).collect())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![1.5e-5, 120.25, 0.5, 2.5e-6]);
        assert_eq!(rows[1][1], -3.0);
    }

    #[test]
    fn test_write_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("out");
        let path = write_curve(&dir, "S1", Variant::Log, &curve()).unwrap().unwrap();

        assert_eq!(path, dir.join("UN_S1_det_1_lb.txt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), format_curve(&curve()));
        // Only the final file remains, no temporaries.
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
    }

    #[test]
    fn test_empty_curve_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("out");
        let written = write_curve(&dir, "S1", Variant::Primary, &ReducedCurve::default()).unwrap();
        assert!(written.is_none());
        assert!(!dir.exists());
    }
}
