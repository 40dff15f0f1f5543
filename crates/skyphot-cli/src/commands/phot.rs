use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use skyphot_core::io::field_chart::save_field_chart;
use skyphot_core::pipeline::config::{AperturePlacement, PhotometryConfig};
use skyphot_core::pipeline::run_photometry_reported;

use super::config::load_config;
use crate::progress::BarReporter;
use crate::summary::{print_catalog_table, print_photometry_summary};

#[derive(Args)]
pub struct PhotArgs {
    /// Directory of reduced science frames (overrides the config)
    pub dir: Option<PathBuf>,

    /// Photometry config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output photometry file (overrides the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Field chart PNG; defaults to the output path with a `_field.png` suffix
    #[arg(long)]
    pub chart: Option<PathBuf>,

    /// Place apertures on registered positions instead of refined centroids
    #[arg(long)]
    pub registered: bool,
}

pub fn run(args: &PhotArgs) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => load_config(path)?,
        None => PhotometryConfig::default(),
    };
    if let Some(ref dir) = args.dir {
        config.input_dir = dir.clone();
    }
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    if args.registered {
        config.centroid.placement = AperturePlacement::Registered;
    }

    print_photometry_summary(&config);

    let reporter = Arc::new(BarReporter::new());
    let run = run_photometry_reported(&config, reporter.clone())
        .with_context(|| format!("Photometry failed for {}", config.input_dir.display()))?;
    reporter.finish();

    let chart = args.chart.clone().unwrap_or_else(|| {
        let stem = config
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photometry".into());
        config.output.with_file_name(format!("{stem}_field.png"))
    });
    save_field_chart(&run.catalog.reference_image, &run.catalog.x, &run.catalog.y, &chart)
        .with_context(|| format!("Failed to write field chart {}", chart.display()))?;

    print_catalog_table(&run.catalog);
    println!("\nPhotometry saved to {}", config.output.display());
    println!("Field chart saved to {}", chart.display());

    Ok(())
}
