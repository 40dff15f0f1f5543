use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use skyphot_core::io::header::HeaderKeys;
use skyphot_core::io::sort::{sort_frames, SortConfig};

#[derive(Args)]
pub struct SortArgs {
    /// Directory searched recursively
    pub dir: PathBuf,

    /// Only consider files whose name starts with this prefix (e.g. a camera name)
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Header keyword holding the observation type
    #[arg(long, default_value = "OBSTYPE")]
    pub obstype_key: String,
}

pub fn run(args: &SortArgs) -> Result<()> {
    let config = SortConfig {
        obstype_key: args.obstype_key.clone(),
        file_prefix: args.prefix.clone(),
        ..SortConfig::default()
    };
    let sorted = sort_frames(&args.dir, &config, &HeaderKeys::default())?;

    println!("Bias frames:  {}", sorted.bias.len());
    println!("Flat frames:  {}", sorted.flats.len());
    let targets = sorted.targets();
    println!("Found {} target files:", sorted.science.len());
    for (label, frames) in &targets {
        let first = frames[0];
        println!(
            "  {} x{}, ra: {}, dec: {}",
            label,
            frames.len(),
            first.ra.as_deref().unwrap_or("?"),
            first.dec.as_deref().unwrap_or("?")
        );
    }

    Ok(())
}
