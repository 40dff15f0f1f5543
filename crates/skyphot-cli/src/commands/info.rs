use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use skyphot_core::io::fits::{header_text, hdu_shape, FitsFile};
use skyphot_core::io::header::{read_identifiers, HeaderKeys};

use super::config::load_config;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS frame
    pub file: PathBuf,

    /// Photometry config file (TOML) supplying header keyword names
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let keys = match args.config {
        Some(ref path) => load_config(path)?.header_keys,
        None => HeaderKeys::default(),
    };
    let primary = FitsFile::open(&args.file)
        .and_then(|f| f.primary())
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    println!("File:        {}", args.file.display());
    match hdu_shape(&primary)?.as_slice() {
        [h, w] => println!("Dimensions:  {}x{}", w, h),
        other => println!("Shape:       {:?}", other),
    }
    let bitpix = header_text(&primary, "BITPIX").unwrap_or_else(|| "(missing)".into());
    println!("BITPIX:      {}", bitpix);

    let show = |label: &str, key: &str| {
        let value = header_text(&primary, key).unwrap_or_else(|| "(missing)".into());
        println!("{:<13}{}  [{}]", format!("{label}:"), value, key);
    };
    show("Exposure", &keys.exposure);
    show("Gain", &keys.gain);
    show("Binning", &keys.bin_factor);
    show("Airmass", &keys.airmass);
    show("JD", &keys.jd);
    show("HJD", &keys.hjd);
    show("BJD", &keys.bjd);

    let ids = read_identifiers(&primary, &keys);
    println!("Filter:      {}", ids.filter_name());
    for (label, value) in [
        ("Object", &ids.object),
        ("RA", &ids.ra),
        ("Dec", &ids.dec),
        ("Telescope", &ids.telescope),
        ("Instrument", &ids.instrument),
        ("Observer", &ids.observer),
        ("Date", &ids.date_obs),
    ] {
        if let Some(v) = value {
            println!("{:<13}{}", format!("{label}:"), v);
        }
    }

    Ok(())
}
