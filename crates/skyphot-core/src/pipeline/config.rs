use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::background::{setting_axis, BackgroundSetting};
use crate::consts::*;
use crate::error::{PhotometryError, Result};
use crate::io::header::HeaderKeys;

/// Everything the frame loop needs; loadable from TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometryConfig {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    pub file_extension: String,
    pub background: BackgroundConfig,
    pub apertures: ApertureConfig,
    pub empty_apertures: EmptyApertureConfig,
    pub catalog: CatalogConfig,
    pub centroid: CentroidConfig,
    /// Arcsec per unbinned pixel.
    pub platescale: f64,
    pub header_keys: HeaderKeys,
}

impl Default for PhotometryConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output: PathBuf::from("photometry.fits"),
            file_extension: "fits".into(),
            background: BackgroundConfig::default(),
            apertures: ApertureConfig::default(),
            empty_apertures: EmptyApertureConfig::default(),
            catalog: CatalogConfig::default(),
            centroid: CentroidConfig::default(),
            platescale: DEFAULT_PLATESCALE,
            header_keys: HeaderKeys::default(),
        }
    }
}

impl PhotometryConfig {
    /// Reject configurations the frame loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let settings = self.background.settings();
        if settings.is_empty() {
            return Err(PhotometryError::Config("no background settings configured".into()));
        }
        for s in &settings {
            s.validate()?;
        }
        BackgroundSetting::square(self.catalog.box_size, self.catalog.filter_width).validate()?;
        if !(self.apertures.step > 0.0) {
            return Err(PhotometryError::Config(format!(
                "aperture step must be positive, got {}",
                self.apertures.step
            )));
        }
        if self.apertures.radii().is_empty() {
            return Err(PhotometryError::Config(format!(
                "aperture range {}..{} is empty",
                self.apertures.start, self.apertures.stop
            )));
        }
        if !(self.empty_apertures.margin >= 0.0 && self.empty_apertures.margin < 0.5) {
            return Err(PhotometryError::Config(format!(
                "empty aperture margin must be in [0, 0.5), got {}",
                self.empty_apertures.margin
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub box_sizes: Vec<usize>,
    pub filter_widths: Vec<usize>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            box_sizes: vec![16, 32, 64],
            filter_widths: vec![1, 2, 3, 4, 5],
        }
    }
}

impl BackgroundConfig {
    /// Flattened setting axis, box size outer.
    pub fn settings(&self) -> Vec<BackgroundSetting> {
        setting_axis(&self.box_sizes, &self.filter_widths)
    }
}

/// Aperture radii `start, start + step, ...` below `stop`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApertureConfig {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for ApertureConfig {
    fn default() -> Self {
        Self {
            start: 2.0,
            stop: 6.0,
            step: 0.1,
        }
    }
}

impl ApertureConfig {
    pub fn radii(&self) -> Vec<f64> {
        if !(self.step > 0.0) || self.stop <= self.start {
            return Vec::new();
        }
        let n = ((self.stop - self.start) / self.step - 1e-9).ceil() as usize;
        (0..n).map(|i| self.start + i as f64 * self.step).collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmptyApertureConfig {
    pub count: usize,
    pub radius: f64,
    /// Fraction of each frame dimension kept clear at both edges.
    pub margin: f64,
    pub seed: u64,
}

impl Default for EmptyApertureConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_EMPTY_APERTURE_COUNT,
            radius: DEFAULT_EMPTY_APERTURE_RADIUS,
            margin: DEFAULT_EMPTY_APERTURE_MARGIN,
            seed: DEFAULT_EMPTY_APERTURE_SEED,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog detection threshold in units of global RMS.
    pub detection_threshold: f64,
    pub box_size: usize,
    pub filter_width: usize,
    /// Threshold of the per-frame star mask for empty apertures.
    pub mask_threshold: f64,
    pub min_area: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            box_size: CATALOG_BOX_SIZE,
            filter_width: CATALOG_FILTER_WIDTH,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

/// Which positions the star apertures are centred on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AperturePlacement {
    /// Windowed-centroid positions.
    #[default]
    Refined,
    /// Catalog positions shifted by the registration offset only.
    Registered,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CentroidConfig {
    pub reference_radius: f64,
    pub flux_fraction: f64,
    pub subpix: usize,
    /// Half-flux radius to window sigma.
    pub window_scale: f64,
    pub placement: AperturePlacement,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            reference_radius: DEFAULT_FLUX_RADIUS_REFERENCE,
            flux_fraction: HALF_FLUX_FRACTION,
            subpix: DEFAULT_SUBPIX,
            window_scale: WINDOW_SIGMA_SCALE,
            placement: AperturePlacement::Refined,
        }
    }
}
