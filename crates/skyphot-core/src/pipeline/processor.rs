use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use crate::align::Registration;
use crate::background::{Background, BackgroundSetting};
use crate::detection::SourceExtractor;
use crate::error::{PhotometryError, Result};
use crate::frame::{Frame, FrameIdentifiers, RegistrationOffset};
use crate::grid::{FrameRecord, MeasurementGrid, SettingMeasurement};
use crate::photometry::{sum_circle_grid, sum_circles, ApertureOptions};
use crate::stats::nan_mean;

use super::catalog::{build_catalog, empty_apertures, refine_positions, Catalog, Refinement};
use super::config::{AperturePlacement, PhotometryConfig};
use super::types::FrameState;

/// Background model of one setting plus everything measured before refinement.
struct SweptSetting {
    background: Background,
    subtracted: Array2<f32>,
    residual_bkg: Vec<f64>,
}

/// Reference-frame products shared by every later frame.
struct Reference {
    image: Array2<f32>,
    catalog: Catalog,
    empty_x: Vec<f64>,
    empty_y: Vec<f64>,
    identifiers: FrameIdentifiers,
}

/// Drives each frame through registration, the background sweep, centroid
/// refinement and aperture summing, and owns the measurement grid while doing so.
pub struct FrameProcessor<'a> {
    config: &'a PhotometryConfig,
    registration: &'a dyn Registration,
    extractor: &'a dyn SourceExtractor,
    radii: Vec<f64>,
    settings: Vec<BackgroundSetting>,
    n_frames: usize,
    reference: Option<Reference>,
    grid: Option<MeasurementGrid>,
    state: FrameState,
}

impl<'a> FrameProcessor<'a> {
    pub fn new(
        config: &'a PhotometryConfig,
        n_frames: usize,
        registration: &'a dyn Registration,
        extractor: &'a dyn SourceExtractor,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            radii: config.apertures.radii(),
            settings: config.background.settings(),
            config,
            registration,
            extractor,
            n_frames,
            reference: None,
            grid: None,
            state: FrameState::AwaitingReference,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// The grid filled so far; `None` until the reference frame is processed.
    pub fn grid(&self) -> Option<&MeasurementGrid> {
        self.grid.as_ref()
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.reference.as_ref().map(|r| &r.catalog)
    }

    fn transition(&mut self, frame: usize, next: FrameState) {
        debug!(frame, from = %self.state, to = %next, "Frame state");
        self.state = next;
    }

    /// Reduce one frame. Frame 0 must come first and becomes the reference.
    pub fn process(&mut self, index: usize, frame: &Frame) -> Result<()> {
        if index >= self.n_frames {
            return Err(PhotometryError::FrameIndexOutOfRange {
                index,
                total: self.n_frames,
            });
        }

        let offset = if self.reference.is_none() {
            self.seed_reference(frame)?;
            RegistrationOffset::default()
        } else {
            self.transition(index, FrameState::Registering);
            let reference = self.reference_ref()?;
            let offset = self.registration.measure_offset(&reference.image, &frame.data)?;
            debug!(frame = index, dx = offset.dx, dy = offset.dy, "Registration offset");
            offset
        };

        let reference = self.reference_ref()?;
        let x_registered: Vec<f64> = reference.catalog.x.iter().map(|x| x - offset.dx).collect();
        let y_registered: Vec<f64> = reference.catalog.y.iter().map(|y| y - offset.dy).collect();

        self.transition(index, FrameState::BackgroundSweep);
        let swept = self.sweep_backgrounds(frame)?;

        self.transition(index, FrameState::Refining);
        let config = self.config;
        let centroid = &config.centroid;
        let refined: Vec<Refinement> = swept
            .par_iter()
            .map(|s| refine_positions(&s.subtracted, &x_registered, &y_registered, centroid))
            .collect();

        self.transition(index, FrameState::Summing);
        let measurements = self.sum_apertures(frame, &swept, &refined, &x_registered, &y_registered)?;

        let grid = self.grid.as_mut().ok_or(PhotometryError::EmptyCatalog)?;
        for (setting, m) in measurements.iter().enumerate() {
            grid.store_setting(index, setting, frame.header.exposure, m)?;
        }
        let last = refined.last().ok_or_else(|| PhotometryError::Config("no background settings configured".into()))?;
        grid.store_frame(
            index,
            &FrameRecord {
                jd: frame.header.jd,
                hjd: frame.header.hjd,
                bjd: frame.header.bjd,
                exposure: frame.header.exposure,
                airmass: frame.header.airmass,
                offset,
                x: last.x.clone(),
                y: last.y.clone(),
                x_registered,
                y_registered,
            },
        )?;
        grid.check_shape()?;

        self.transition(index, FrameState::Stored);
        Ok(())
    }

    /// Release the grid, catalog and reference identifiers.
    pub fn finish(self) -> Result<(MeasurementGrid, Catalog, FrameIdentifiers)> {
        match (self.grid, self.reference) {
            (Some(grid), Some(reference)) => Ok((grid, reference.catalog, reference.identifiers)),
            _ => Err(PhotometryError::EmptyCatalog),
        }
    }

    fn reference_ref(&self) -> Result<&Reference> {
        self.reference.as_ref().ok_or(PhotometryError::EmptyCatalog)
    }

    fn seed_reference(&mut self, frame: &Frame) -> Result<()> {
        let catalog = build_catalog(frame, self.config, self.extractor)?;
        let (empty_x, empty_y) = empty_apertures(frame.width(), frame.height(), &self.config.empty_apertures);
        let grid = MeasurementGrid::new(
            self.radii.clone(),
            self.settings.clone(),
            catalog.x.clone(),
            catalog.y.clone(),
            empty_x.len(),
            self.n_frames,
        )?;
        self.grid = Some(grid);
        self.reference = Some(Reference {
            image: frame.data.clone(),
            catalog,
            empty_x,
            empty_y,
            identifiers: frame.header.identifiers.clone(),
        });
        Ok(())
    }

    fn sweep_backgrounds(&self, frame: &Frame) -> Result<Vec<SweptSetting>> {
        let reference = self.reference_ref()?;
        let empty_radii = vec![self.config.empty_apertures.radius; reference.empty_x.len()];
        let mask_threshold = self.config.catalog.mask_threshold;

        self.settings
            .par_iter()
            .map(|&setting| {
                let background = Background::estimate(&frame.data, setting)?;
                let subtracted = background.subtract_from(&frame.data);
                let stars = self.extractor.extract(&subtracted, mask_threshold, background.global_rms);
                let residual = sum_circles(
                    &subtracted,
                    &reference.empty_x,
                    &reference.empty_y,
                    &empty_radii,
                    &ApertureOptions {
                        rms: background.global_rms,
                        gain: frame.header.gain,
                        mask: Some(&stars.segmentation),
                        subpix: self.config.centroid.subpix,
                    },
                )?;
                debug!(%setting, global_rms = background.global_rms, masked = stars.objects.len(), "Background setting");
                Ok(SweptSetting {
                    background,
                    subtracted,
                    residual_bkg: residual.iter().map(|r| r.flux).collect(),
                })
            })
            .collect()
    }

    fn sum_apertures(
        &self,
        frame: &Frame,
        swept: &[SweptSetting],
        refined: &[Refinement],
        x_registered: &[f64],
        y_registered: &[f64],
    ) -> Result<Vec<SettingMeasurement>> {
        let fwhm_scale = frame.header.bin_factor * self.config.platescale;
        swept
            .par_iter()
            .zip(refined.par_iter())
            .map(|(s, r)| {
                let refined_placement = self.config.centroid.placement == AperturePlacement::Refined;
                let (xs, ys) = if refined_placement {
                    (r.x.as_slice(), r.y.as_slice())
                } else {
                    (x_registered, y_registered)
                };
                let opts = ApertureOptions {
                    rms: s.background.global_rms,
                    gain: frame.header.gain,
                    mask: None,
                    subpix: self.config.centroid.subpix,
                };
                let stars = sum_circle_grid(&s.subtracted, xs, ys, &self.radii, &opts)?;
                let sky = sum_circle_grid(s.background.back(), xs, ys, &self.radii, &opts)?;

                // Centroid flags only describe apertures placed at refined positions.
                let mut flags = stars.flags;
                if refined_placement {
                    for mut row in flags.rows_mut() {
                        for (f, &object_flag) in row.iter_mut().zip(&r.flags) {
                            *f |= object_flag;
                        }
                    }
                }

                Ok(SettingMeasurement {
                    flux: stars.flux,
                    flux_err: stars.flux_err,
                    flags,
                    bkg_flux: sky.flux,
                    bkg_flux_err: sky.flux_err,
                    residual_bkg: s.residual_bkg.clone(),
                    mean_fwhm: nan_mean(&r.half_flux_radius) * fwhm_scale,
                })
            })
            .collect()
    }
}
