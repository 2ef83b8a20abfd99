//! Q binning with inverse-variance aggregation.

use crate::config::BinningConfig;
use crate::data::model::{Bin, BinMode, CorrectedPoint};
use crate::error::{ReduceError, Result};

/// Upper bound on the number of bins of one curve, whatever the Q range.
pub const MAX_BINS: usize = 100_000;

/// Bin edges covering `[q_min, q_max]`. The first edge is `q_min` and the last
/// is `q_max`, both exact. A degenerate range yields a single bin. At most
/// [`MAX_BINS`] bins are produced.
pub fn bin_edges(
    mode: BinMode,
    q_min: f64,
    q_max: f64,
    n_points: usize,
    config: &BinningConfig,
) -> Vec<f64> {
    if q_max <= q_min {
        return vec![q_min, q_max];
    }

    let mut edges: Vec<f64> = match mode {
        BinMode::Linear => {
            let n = config.linear_bins.unwrap_or(n_points).clamp(1, MAX_BINS);
            let width = (q_max - q_min) / n as f64;
            (0..=n).map(|i| q_min + width * i as f64).collect()
        }
        BinMode::Log => {
            let decades = (q_max / q_min).log10();
            // tolerance keeps an exact number of decades from rounding up
            let n = (decades * config.log_bins_per_decade as f64 - 1e-9).ceil() as usize;
            let n = n.clamp(1, MAX_BINS);
            let ratio = q_max / q_min;
            (0..=n)
                .map(|i| q_min * ratio.powf(i as f64 / n as f64))
                .collect()
        }
    };

    edges[0] = q_min;
    if let Some(last) = edges.last_mut() {
        *last = q_max;
    }
    edges
}

/// Aggregate points into the bins delimited by `edges`.
///
/// Every bin is `[low, high)` except the last, which also takes points equal
/// to its upper edge. Bins without points are left out. Points must carry a
/// positive uncertainty.
pub fn aggregate(points: &[CorrectedPoint], edges: &[f64]) -> Vec<Bin> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let n_bins = edges.len() - 1;

    #[derive(Default, Clone, Copy)]
    struct Acc {
        weight: f64,
        weighted_intensity: f64,
        q_sum: f64,
        count: usize,
    }

    let mut acc = vec![Acc::default(); n_bins];
    for p in points {
        if p.q < edges[0] || p.q > edges[n_bins] {
            continue;
        }
        let idx = edges
            .partition_point(|&e| e <= p.q)
            .saturating_sub(1)
            .min(n_bins - 1);
        let w = 1.0 / (p.uncertainty * p.uncertainty);
        let a = &mut acc[idx];
        a.weight += w;
        a.weighted_intensity += w * p.intensity;
        a.q_sum += p.q;
        a.count += 1;
    }

    acc.iter()
        .enumerate()
        .filter(|(_, a)| a.count > 0)
        .map(|(i, a)| Bin {
            q_low: edges[i],
            q_high: edges[i + 1],
            q: a.q_sum / a.count as f64,
            intensity: a.weighted_intensity / a.weight,
            uncertainty: 1.0 / a.weight.sqrt(),
            count: a.count,
        })
        .collect()
}

/// Bin the corrected points of `sample` with the requested mode.
///
/// Log binning only considers points with `Q > 0`. An empty input gives an
/// empty output.
pub fn bin_points(
    sample: &str,
    points: &[CorrectedPoint],
    mode: BinMode,
    config: &BinningConfig,
) -> Result<Vec<Bin>> {
    if let Some(bad) = points
        .iter()
        .find(|p| !(p.uncertainty.is_finite() && p.uncertainty > 0.0))
    {
        return Err(ReduceError::Division {
            sample: sample.to_string(),
            message: format!("non-positive uncertainty {} at Q = {}", bad.uncertainty, bad.q),
        });
    }

    let usable: Vec<CorrectedPoint> = match mode {
        BinMode::Linear => points.to_vec(),
        BinMode::Log => points.iter().copied().filter(|p| p.q > 0.0).collect(),
    };
    if usable.is_empty() {
        return Ok(Vec::new());
    }

    let (q_min, q_max) = usable
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.q), hi.max(p.q))
        });
    if mode == BinMode::Log && !(q_max / q_min).is_finite() {
        return Err(ReduceError::Division {
            sample: sample.to_string(),
            message: format!("Q range {q_min:e}..{q_max:e} too wide for log binning"),
        });
    }
    let edges = bin_edges(mode, q_min, q_max, usable.len(), config);
    Ok(aggregate(&usable, &edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn point(q: f64, intensity: f64, uncertainty: f64) -> CorrectedPoint {
        CorrectedPoint {
            angle: q,
            q,
            intensity,
            uncertainty,
        }
    }

    fn config(linear_bins: Option<usize>, per_decade: usize) -> BinningConfig {
        BinningConfig {
            linear_bins,
            log_bins_per_decade: per_decade,
        }
    }

    #[test]
    fn test_linear_edges() {
        let edges = bin_edges(BinMode::Linear, 1.0, 3.0, 4, &config(None, 10));
        assert_eq!(edges, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn test_log_edges_are_geometric() {
        let edges = bin_edges(BinMode::Log, 1e-5, 1e-3, 0, &config(None, 2));
        assert_eq!(edges.len(), 5);
        assert_eq!(edges[0], 1e-5);
        assert_eq!(edges[4], 1e-3);
        for w in edges.windows(3) {
            let r1 = w[1] / w[0];
            let r2 = w[2] / w[1];
            assert!((r1 - r2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_inverse_variance_weighting() {
        let points = [point(1.0, 10.0, 1.0), point(1.2, 20.0, 2.0)];
        let bins = aggregate(&points, &[1.0, 2.0]);
        assert_eq!(bins.len(), 1);
        let b = bins[0];
        // weights 1 and 1/4
        assert!((b.intensity - (10.0 + 20.0 * 0.25) / 1.25).abs() < 1e-12);
        assert!((b.uncertainty - 1.0 / 1.25_f64.sqrt()).abs() < 1e-12);
        assert!((b.q - 1.1).abs() < 1e-12);
        assert_eq!(b.count, 2);
    }

    #[test]
    fn test_last_edge_is_inclusive_and_empty_bins_dropped() {
        let points = [point(1.0, 1.0, 1.0), point(4.0, 2.0, 1.0)];
        let bins = aggregate(&points, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bins.len(), 2);
        assert_eq!((bins[0].q_low, bins[0].q_high), (1.0, 2.0));
        assert_eq!((bins[1].q_low, bins[1].q_high), (3.0, 4.0));
        assert_eq!(bins[1].intensity, 2.0);
    }

    #[test]
    fn test_inner_edge_belongs_to_upper_bin() {
        let points = [point(1.0, 1.0, 1.0), point(2.0, 5.0, 1.0), point(3.0, 1.0, 1.0)];
        let bins = aggregate(&points, &[1.0, 2.0, 3.0]);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 2);
    }

    #[test]
    fn test_single_point_gives_one_bin() {
        let bins =
            bin_points("S", &[point(2e-5, 3.0, 0.1)], BinMode::Log, &config(None, 10)).unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].q, 2e-5);
    }

    #[test]
    fn test_log_mode_skips_non_positive_q() {
        let points = [point(0.0, 9.0, 1.0), point(1e-4, 1.0, 1.0), point(1e-3, 1.0, 1.0)];
        let bins = bin_points("S", &points, BinMode::Log, &config(None, 1)).unwrap();
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);

        let bins = bin_points("S", &points, BinMode::Linear, &config(Some(1), 1)).unwrap();
        assert_eq!(bins[0].count, 3);
    }

    #[test]
    fn test_zero_uncertainty_is_division_error() {
        let err = bin_points("S1", &[point(1.0, 1.0, 0.0)], BinMode::Linear, &config(None, 10))
            .unwrap_err();
        assert!(matches!(err, ReduceError::Division { .. }));
    }

    #[test]
    fn test_subnormal_q_is_division_error_in_log_mode() {
        let points = [point(1e-312, 1.0, 0.1), point(0.5, 1.0, 0.1)];
        let err = bin_points("A", &points, BinMode::Log, &config(None, 10)).unwrap_err();
        assert!(matches!(err, ReduceError::Division { ref sample, .. } if sample == "A"));

        // linear bins cope with the same range
        let bins = bin_points("A", &points, BinMode::Linear, &config(None, 10)).unwrap();
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_bin_count_is_capped() {
        let edges = bin_edges(BinMode::Log, 1e-300, 1.0, 2, &config(None, 10_000));
        assert_eq!(edges.len(), MAX_BINS + 1);
        let edges = bin_edges(BinMode::Linear, 0.0, 1.0, 2, &config(Some(usize::MAX), 10));
        assert_eq!(edges.len(), MAX_BINS + 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(bin_points("S", &[], BinMode::Linear, &config(None, 10)).unwrap().is_empty());
    }

    fn arb_points() -> impl Strategy<Value = Vec<CorrectedPoint>> {
        prop::collection::vec((1e-6f64..1e-2, -10.0f64..100.0, 0.01f64..5.0), 0..60)
            .prop_map(|v| v.into_iter().map(|(q, i, u)| point(q, i, u)).collect())
    }

    proptest! {
        #[test]
        fn prop_bins_never_fabricated(
            points in arb_points(),
            log in any::<bool>(),
            linear_bins in prop::option::of(1usize..200),
            per_decade in 1usize..40,
        ) {
            let mode = if log { BinMode::Log } else { BinMode::Linear };
            let bins = bin_points("S", &points, mode, &config(linear_bins, per_decade)).unwrap();

            // every point lands in exactly one bin, and no bin is empty
            prop_assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), points.len());
            prop_assert!(bins.len() <= points.len());
            for b in &bins {
                prop_assert!(b.count >= 1);
                // mean Q may drift by rounding only
                prop_assert!(b.q >= b.q_low * (1.0 - 1e-12) && b.q <= b.q_high * (1.0 + 1e-12));
                prop_assert!(b.uncertainty > 0.0);
            }
            for w in bins.windows(2) {
                prop_assert!(w[0].q_high <= w[1].q_low);
            }
        }

        #[test]
        fn prop_binning_is_deterministic(points in arb_points(), log in any::<bool>()) {
            let mode = if log { BinMode::Log } else { BinMode::Linear };
            let cfg = config(None, 10);
            prop_assert_eq!(
                bin_points("S", &points, mode, &cfg).unwrap(),
                bin_points("S", &points, mode, &cfg).unwrap()
            );
        }
    }
}
