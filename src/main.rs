mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;

use cli::Cli;
use usans_reduce::{reduce, ReductionConfig, ReductionSettings};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(&cli) {
        log::error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => ReductionSettings::from_json(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => ReductionSettings::default(),
    };

    let config = ReductionConfig::new(&cli.path, cli.output_dir())
        .with_logbin(cli.logbin)
        .with_settings(settings);

    let report = reduce(&config)?;
    for (sample, files) in &report.written {
        log::info!("{sample}: {} curves", files.len());
    }
    if !report.is_complete() {
        let failed: Vec<&str> = report.failures.keys().map(String::as_str).collect();
        bail!("reduction failed for {}", failed.join(", "));
    }
    Ok(())
}
