mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyphot", about = "Aperture photometry and differential light curves")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header values of a FITS frame
    Info(commands::info::InfoArgs),
    /// Classify a directory of FITS files into bias, flat and science frames
    Sort(commands::sort::SortArgs),
    /// Print or save the default photometry configuration
    Config(commands::config::ConfigArgs),
    /// Run aperture photometry over a directory of frames
    Phot(commands::phot::PhotArgs),
    /// Build differential light curves from a photometry file
    Lightcurve(commands::lightcurve::LightcurveArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Sort(args) => commands::sort::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Phot(args) => commands::phot::run(args),
        Commands::Lightcurve(args) => commands::lightcurve::run(args),
    }
}
