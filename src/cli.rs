//! CLI argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

/// Reduce a USANS CSV log into I(Q) curves
#[derive(Parser, Debug)]
#[command(name = "usans-reduce")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the CSV log (e.g. setup.csv)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output directory (default: directory of the input file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also log-bin the primary and unscaled curves
    #[arg(long)]
    pub logbin: bool,

    /// JSON settings file (columns, wavelength, binning, calibration)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Output directory, falling back to the input file's directory.
    pub fn output_dir(&self) -> PathBuf {
        match &self.output {
            Some(dir) => dir.clone(),
            None => self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}
