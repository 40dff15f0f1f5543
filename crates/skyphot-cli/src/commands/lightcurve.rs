use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use skyphot_core::lightcurve::{run_lightcurves, LightCurveConfig, TimeStandard};

use crate::summary::print_lightcurve_summary;

#[derive(Args)]
pub struct LightcurveArgs {
    /// Photometry file written by `skyphot phot`
    pub photometry: PathBuf,

    /// Catalog index of the target star
    #[arg(long)]
    pub target: usize,

    /// Comma-separated catalog indices of the comparison stars
    #[arg(long, value_delimiter = ',', required = true)]
    pub comparisons: Vec<usize>,

    /// Bin duration in seconds
    #[arg(long, default_value = "600")]
    pub bin_seconds: f64,

    /// Time standard: jd, hjd or bjd
    #[arg(long, default_value = "jd")]
    pub time: String,

    /// Start of the transit window (same time standard)
    #[arg(long)]
    pub ingress: Option<f64>,

    /// End of the transit window
    #[arg(long)]
    pub egress: Option<f64>,

    /// Lower clip limit for normalized differential flux
    #[arg(long, default_value = "0.0")]
    pub flux_min: f64,

    /// Upper clip limit for normalized differential flux
    #[arg(long, default_value = "1.2")]
    pub flux_max: f64,

    /// File-name prefix (defaults to the target name)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

pub fn run(args: &LightcurveArgs) -> Result<()> {
    let time: TimeStandard = args.time.parse()?;
    let config = LightCurveConfig {
        photometry: args.photometry.clone(),
        output_dir: args.output.clone(),
        prefix: args.prefix.clone(),
        target: args.target,
        comparisons: args.comparisons.clone(),
        bin_seconds: args.bin_seconds,
        time,
        ingress: args.ingress,
        egress: args.egress,
        flux_min: args.flux_min,
        flux_max: args.flux_max,
    };

    let (set, paths) = run_lightcurves(&config)
        .with_context(|| format!("Light curves failed for {}", args.photometry.display()))?;
    print_lightcurve_summary(&set, &paths);

    Ok(())
}
