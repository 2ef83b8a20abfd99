//! Writes a synthetic USANS log (`setup.csv` by default) with an empty cell
//! and two samples, for trying the reduction without beam time.

use std::path::Path;

use anyhow::{Context, Result};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Squared-Lorentzian scattering wing.
fn wing(x: f64, width: f64, amplitude: f64) -> f64 {
    amplitude / (1.0 + (x / width).powi(2)).powi(2)
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Gaussian approximation of a Poisson draw, clipped at zero.
    fn counts(&mut self, mean: f64) -> f64 {
        self.gauss(mean, mean.sqrt()).round().max(0.0)
    }
}

struct SampleSpec {
    name: &'static str,
    run: u32,
    transmission: f64,
    wing_amplitude: f64,
    wing_width: f64,
}

const MONITOR: f64 = 100_000.0;
const PEAK_COUNTS: f64 = 50_000.0;
const TRANSMISSION_COUNTS: f64 = 8_000.0;
/// Rocking-curve width in degrees (≈ 2 arcsec FWHM).
const BEAM_SIGMA: f64 = 2.4e-4;

/// Write the synthetic log to `path`. Returns (samples, angles per sample).
fn generate(path: &Path, seed: u64) -> Result<(usize, usize)> {
    let mut rng = SimpleRng::new(seed);

    // A few points across the peak, then geometric steps out to 0.035°.
    let mut angles: Vec<f64> = vec![-6e-4, -3e-4, 0.0];
    let (start, stop, n) = (2e-4_f64, 3.5e-2_f64, 40);
    angles.extend((0..n).map(|i| start * (stop / start).powf(i as f64 / (n - 1) as f64)));

    let samples = [
        SampleSpec {
            name: "EmptyPCell",
            run: 1001,
            transmission: 1.0,
            wing_amplitude: 0.0,
            wing_width: 1.0,
        },
        SampleSpec {
            name: "S115_dry",
            run: 1002,
            transmission: 0.82,
            wing_amplitude: 900.0,
            wing_width: 2.0e-3,
        },
        SampleSpec {
            name: "S115_pc3",
            run: 1003,
            transmission: 0.64,
            wing_amplitude: 2_500.0,
            wing_width: 1.2e-3,
        },
    ];

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["sample", "run", "angle", "counts", "monitor", "transmission"])?;

    for spec in &samples {
        for &angle in &angles {
            let beam = gaussian(angle, 0.0, BEAM_SIGMA, PEAK_COUNTS * spec.transmission);
            let scattering = wing(angle, spec.wing_width, spec.wing_amplitude);
            // constant instrument background
            let mean = beam + scattering + 3.0;

            let monitor = rng.counts(MONITOR);
            let counts = rng.counts(mean);
            let trans = rng.counts(TRANSMISSION_COUNTS * spec.transmission);

            writer.write_record([
                spec.name.to_string(),
                spec.run.to_string(),
                format!("{angle:.6e}"),
                counts.to_string(),
                monitor.to_string(),
                trans.to_string(),
            ])?;
        }
    }
    writer.flush().context("flushing CSV")?;
    Ok((samples.len(), angles.len()))
}

fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "setup.csv".to_string());
    let (samples, angles) = generate(Path::new(&path), 42)?;
    println!("Wrote {samples} samples × {angles} angles to {path}");
    Ok(())
}
