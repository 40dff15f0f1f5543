//! The standard set of light curves for one target and its comparisons.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndarray::{Array1, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::background::BackgroundSetting;
use crate::consts::{BY_ITSELF_FLUX_LIMITS, DEFAULT_BIN_SECONDS, DEFAULT_FLUX_CLIP_LOWER, DEFAULT_FLUX_CLIP_UPPER};
use crate::error::{PhotometryError, Result};
use crate::grid::MeasurementGrid;
use crate::io::fits::{f64_extension, insert_finite, write_fits, Hdu};
use crate::io::output::read_photometry;
use crate::stats::{nan_max, nan_median, nan_min, nan_std};

use super::binning::{bin_to_duration, exposure_blocks, finite_mask, ExposureBlock};
use super::differential::{differential_photometry, normalize_series};
use super::optimizer::{lowest_residual_setting, select_best, select_best_in_setting, Selection};

/// Which frame time the light curves are plotted against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeStandard {
    #[default]
    Jd,
    Hjd,
    Bjd,
}

impl TimeStandard {
    fn column<'g>(&self, grid: &'g MeasurementGrid) -> &'g Array1<f64> {
        match self {
            Self::Jd => &grid.jd,
            Self::Hjd => &grid.hjd,
            Self::Bjd => &grid.bjd,
        }
    }
}

impl fmt::Display for TimeStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jd => write!(f, "JD"),
            Self::Hjd => write!(f, "HJD"),
            Self::Bjd => write!(f, "BJD"),
        }
    }
}

impl FromStr for TimeStandard {
    type Err = PhotometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jd" => Ok(Self::Jd),
            "hjd" => Ok(Self::Hjd),
            "bjd" => Ok(Self::Bjd),
            other => Err(PhotometryError::Config(format!("unknown time standard '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCurveConfig {
    pub photometry: PathBuf,
    pub output_dir: PathBuf,
    /// File-name prefix; the target name from the photometry file when unset.
    pub prefix: Option<String>,
    pub target: usize,
    pub comparisons: Vec<usize>,
    pub bin_seconds: f64,
    pub time: TimeStandard,
    pub ingress: Option<f64>,
    pub egress: Option<f64>,
    /// Normalized differential flux outside `[flux_min, flux_max]` is discarded.
    pub flux_min: f64,
    pub flux_max: f64,
}

impl Default for LightCurveConfig {
    fn default() -> Self {
        Self {
            photometry: PathBuf::from("photometry.fits"),
            output_dir: PathBuf::from("."),
            prefix: None,
            target: 0,
            comparisons: Vec::new(),
            bin_seconds: DEFAULT_BIN_SECONDS,
            time: TimeStandard::default(),
            ingress: None,
            egress: None,
            flux_min: DEFAULT_FLUX_CLIP_LOWER,
            flux_max: DEFAULT_FLUX_CLIP_UPPER,
        }
    }
}

/// One finished light curve.
#[derive(Clone, Debug)]
pub struct LightCurveProduct {
    pub name: String,
    pub time: Vec<f64>,
    pub flux: Vec<f64>,
    pub flux_err: Vec<f64>,
    pub time_bin: Vec<f64>,
    pub flux_bin: Vec<f64>,
    /// Best cell within the lowest-residual setting; used for the series.
    pub selection: Option<Selection>,
    /// Best cell over the whole grid, for reference.
    pub global_best: Option<Selection>,
    pub radius: f64,
    pub setting: Option<BackgroundSetting>,
    /// Fractional RMS of the binned out-of-transit flux.
    pub frms: f64,
}

#[derive(Clone, Debug)]
pub struct LightCurveSet {
    pub lowest_residual_setting: usize,
    pub products: Vec<LightCurveProduct>,
}

/// Out-of-transit frames: before `ingress` or after `egress`.
///
/// A missing bound defaults to the first/last finite time; when no frame
/// falls outside the window every frame is used.
pub fn out_of_transit_mask(time: &[f64], ingress: Option<f64>, egress: Option<f64>) -> Vec<bool> {
    let lower = ingress.unwrap_or_else(|| nan_min(time));
    let upper = egress.unwrap_or_else(|| nan_max(time));
    let mask: Vec<bool> = time.iter().map(|&t| t < lower || t > upper).collect();
    if mask.iter().any(|&m| m) {
        mask
    } else {
        vec![true; time.len()]
    }
}

/// Fractional RMS: sample standard deviation over median.
pub fn fractional_rms(values: &[f64]) -> f64 {
    let median = nan_median(values);
    if median.is_finite() && median != 0.0 {
        nan_std(values, 1) / median
    } else {
        f64::NAN
    }
}

struct ProductContext<'a> {
    config: &'a LightCurveConfig,
    grid: &'a MeasurementGrid,
    time: Vec<f64>,
    norm_mask: Vec<bool>,
    blocks: Vec<ExposureBlock>,
    lowest: usize,
}

impl ProductContext<'_> {
    fn assemble(&self, name: String, flux: ArrayView3<'_, f64>, flux_err: ArrayView3<'_, f64>, limits: (f64, f64)) -> LightCurveProduct {
        let global_best = select_best(flux, &self.norm_mask);
        let selection = select_best_in_setting(flux, &self.norm_mask, self.lowest);
        let n = self.time.len();

        let (series, series_err) = match selection {
            Some(sel) => (
                flux.slice(ndarray::s![sel.radius_index, sel.setting_index, ..]).to_vec(),
                flux_err
                    .slice(ndarray::s![sel.radius_index, sel.setting_index, ..])
                    .to_vec(),
            ),
            None => {
                warn!(product = %name, "No finite signal-to-noise in the selected setting");
                (vec![f64::NAN; n], vec![f64::NAN; n])
            }
        };

        let (lower, upper) = limits;
        let clipped: Vec<f64> = series
            .iter()
            .map(|&v| if v < lower || v > upper { f64::NAN } else { v })
            .collect();

        let keep = finite_mask(&clipped);
        let duration = self.config.bin_seconds;
        let time_bin = bin_to_duration(&self.time, &keep, &self.blocks, duration);
        let flux_bin = bin_to_duration(&clipped, &keep, &self.blocks, duration);

        let binned_oot = out_of_transit_mask(&time_bin, self.config.ingress, self.config.egress);
        let oot_values: Vec<f64> = flux_bin
            .iter()
            .zip(&binned_oot)
            .filter(|&(_, &m)| m)
            .map(|(&v, _)| v)
            .collect();
        let frms = fractional_rms(&oot_values);

        let radius = selection.map_or(f64::NAN, |s| self.grid.radii[s.radius_index]);
        let setting = selection.map(|s| self.grid.settings[s.setting_index]);
        info!(
            product = %name,
            snr = selection.map_or(f64::NAN, |s| s.snr),
            radius,
            frms,
            bins = flux_bin.len(),
            "Light curve ready"
        );

        LightCurveProduct {
            name,
            time: self.time.clone(),
            flux: series,
            flux_err: series_err,
            time_bin,
            flux_bin,
            selection,
            global_best,
            radius,
            setting,
            frms,
        }
    }

    fn differential(&self, name: String, target: usize, comparisons: &[usize]) -> Result<LightCurveProduct> {
        let curve = differential_photometry(
            self.grid.flux.view(),
            self.grid.flux_err.view(),
            target,
            comparisons,
            &self.norm_mask,
        )?;
        let limits = (self.config.flux_min, self.config.flux_max);
        Ok(self.assemble(name, curve.flux.view(), curve.flux_err.view(), limits))
    }

    fn by_itself(&self, name: String, object: usize) -> LightCurveProduct {
        let flux = self.grid.flux.index_axis(Axis(1), object);
        let err = self.grid.flux_err.index_axis(Axis(1), object);
        let (norm_flux, norm_err) = normalize_series(flux, err, &self.norm_mask);
        self.assemble(name, norm_flux.view(), norm_err.view(), BY_ITSELF_FLUX_LIMITS)
    }
}

/// Build every standard light curve for `config.target`.
pub fn build_products(grid: &MeasurementGrid, config: &LightCurveConfig) -> Result<LightCurveSet> {
    grid.check_shape()?;
    let lowest = lowest_residual_setting(grid.residual_bkg.view())
        .ok_or_else(|| PhotometryError::Config("photometry file has no background settings".into()))?;
    info!(setting = %grid.settings[lowest], "Lowest background residual");

    let time = config.time.column(grid).to_vec();
    let ctx = ProductContext {
        config,
        grid,
        norm_mask: out_of_transit_mask(&time, config.ingress, config.egress),
        blocks: exposure_blocks(&grid.exposure.to_vec()),
        time,
        lowest,
    };

    let target = config.target;
    let comps = &config.comparisons;
    let mut products = vec![
        ctx.differential("comparison_mean".into(), target, comps)?,
        ctx.by_itself("target_by_itself".into(), target),
    ];
    for &c in comps {
        products.push(ctx.by_itself(format!("comparison_{c}_by_itself"), c));
        products.push(ctx.differential(format!("comparison_{c}"), target, &[c])?);
        if comps.len() > 1 {
            let others: Vec<usize> = comps.iter().copied().filter(|&o| o != c).collect();
            products.push(ctx.differential(format!("comparison_{c}_vs_other_comps"), c, &others)?);
        }
    }

    Ok(LightCurveSet {
        lowest_residual_setting: lowest,
        products,
    })
}

/// Write one product as `<prefix>_<name>.fits` in `dir`.
pub fn write_product(dir: &Path, prefix: &str, time: TimeStandard, product: &LightCurveProduct) -> Result<PathBuf> {
    let path = dir.join(format!("{prefix}_{}.fits", product.name));

    let mut primary = Hdu::empty();
    primary.insert("LCNAME", product.name.as_str());
    primary.insert("TIMESYS", time.to_string().as_str());
    insert_finite(&mut primary, "APRAD", product.radius);
    insert_finite(&mut primary, "SNR", product.selection.map_or(f64::NAN, |s| s.snr));
    insert_finite(&mut primary, "FRMS", product.frms);
    if let Some(setting) = product.setting {
        primary.insert("BKGBOX", setting.box_width as i32);
        primary.insert("BKGFILT", setting.filter_width as i32);
    }

    let extensions = [
        ("TIME", &product.time),
        ("REL_FLUX", &product.flux),
        ("REL_FLUX_ERR", &product.flux_err),
        ("TIME_BIN", &product.time_bin),
        ("REL_FLUX_BIN", &product.flux_bin),
    ]
    .into_iter()
    .map(|(name, values)| f64_extension(name, &Array1::from(values.clone())))
    .collect();
    write_fits(&path, primary, extensions)?;
    Ok(path)
}

/// Read a photometry file, build every product and write them to `output_dir`.
pub fn run_lightcurves(config: &LightCurveConfig) -> Result<(LightCurveSet, Vec<PathBuf>)> {
    let file = read_photometry(&config.photometry)?;
    let set = build_products(&file.grid, config)?;

    let prefix = config
        .prefix
        .clone()
        .or_else(|| file.identifiers.object.clone())
        .unwrap_or_else(|| "lightcurve".into())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    std::fs::create_dir_all(&config.output_dir)?;
    let paths = set
        .products
        .iter()
        .map(|p| write_product(&config.output_dir, &prefix, config.time, p))
        .collect::<Result<Vec<_>>>()?;
    info!(products = paths.len(), dir = %config.output_dir.display(), "Wrote light curves");
    Ok((set, paths))
}
