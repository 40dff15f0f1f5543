use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::background::{Background, BackgroundSetting};
use crate::detection::SourceExtractor;
use crate::error::{PhotometryError, Result};
use crate::frame::Frame;
use crate::photometry::{flux_radius, winpos};

use super::config::{CentroidConfig, EmptyApertureConfig, PhotometryConfig};

/// Stars detected on the reference frame. An entry's index is its identity
/// in every grid array.
#[derive(Clone, Debug)]
pub struct Catalog {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub half_flux_radius: Vec<f64>,
    /// Radius and centroid flags of the reference measurement.
    pub flags: Vec<u16>,
    /// Background-subtracted reference image at the catalog setting.
    pub reference_image: Array2<f32>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Per-object half-flux radius and windowed centroid on a background-subtracted image.
pub(crate) struct Refinement {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub half_flux_radius: Vec<f64>,
    pub flags: Vec<u16>,
}

pub(crate) fn refine_positions(image: &Array2<f32>, xs: &[f64], ys: &[f64], cfg: &CentroidConfig) -> Refinement {
    let radii = flux_radius(image, xs, ys, cfg.reference_radius, cfg.flux_fraction, cfg.subpix);
    let sigmas: Vec<f64> = radii.iter().map(|r| r.radius * cfg.window_scale).collect();
    let centroids = winpos(image, xs, ys, &sigmas);

    Refinement {
        x: centroids.iter().map(|c| c.x).collect(),
        y: centroids.iter().map(|c| c.y).collect(),
        half_flux_radius: radii.iter().map(|r| r.radius).collect(),
        flags: radii.iter().zip(&centroids).map(|(r, c)| r.flag | c.flag).collect(),
    }
}

/// Detect and refine the catalog stars on the reference frame.
pub fn build_catalog(frame: &Frame, config: &PhotometryConfig, extractor: &dyn SourceExtractor) -> Result<Catalog> {
    let setting = BackgroundSetting::square(config.catalog.box_size, config.catalog.filter_width);
    let background = Background::estimate(&frame.data, setting)?;
    let subtracted = background.subtract_from(&frame.data);

    let extraction = extractor.extract(&subtracted, config.catalog.detection_threshold, background.global_rms);
    if extraction.objects.is_empty() {
        return Err(PhotometryError::EmptyCatalog);
    }
    let xs: Vec<f64> = extraction.objects.iter().map(|o| o.x).collect();
    let ys: Vec<f64> = extraction.objects.iter().map(|o| o.y).collect();

    let refined = refine_positions(&subtracted, &xs, &ys, &config.centroid);
    let failed = refined.flags.iter().filter(|&&f| f != 0).count();
    info!(
        stars = xs.len(),
        flagged = failed,
        global_rms = background.global_rms,
        "Built object catalog"
    );

    Ok(Catalog {
        x: refined.x,
        y: refined.y,
        half_flux_radius: refined.half_flux_radius,
        flags: refined.flags,
        reference_image: subtracted,
    })
}

/// Randomly placed empty-sky apertures, uniform within the frame minus the
/// configured edge margin. Deterministic for a given seed.
pub fn empty_apertures(width: usize, height: usize, cfg: &EmptyApertureConfig) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut sample = |len: usize| {
        let lo = cfg.margin * len as f64;
        let hi = (1.0 - cfg.margin) * len as f64;
        if hi > lo {
            rng.gen_range(lo..hi)
        } else {
            lo
        }
    };
    let mut xs = Vec::with_capacity(cfg.count);
    let mut ys = Vec::with_capacity(cfg.count);
    for _ in 0..cfg.count {
        xs.push(sample(width));
        ys.push(sample(height));
    }
    debug!(count = cfg.count, radius = cfg.radius, "Placed empty apertures");
    (xs, ys)
}
