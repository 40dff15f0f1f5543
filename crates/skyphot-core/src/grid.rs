//! Pre-sized measurement arrays filled by the frame loop.
//!
//! Axis order for the four-dimensional arrays is
//! `[radius, object, setting, frame]`.

use ndarray::{s, Array1, Array2, Array3, Array4, Dimension};

use crate::background::BackgroundSetting;
use crate::error::{PhotometryError, Result};
use crate::frame::RegistrationOffset;

/// Lengths of every axis of the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub radii: usize,
    pub objects: usize,
    pub settings: usize,
    pub empty_apertures: usize,
    pub frames: usize,
}

/// Aperture results of one background setting on one frame, raw counts.
#[derive(Clone, Debug)]
pub struct SettingMeasurement {
    /// `(n_radii, n_objects)`
    pub flux: Array2<f64>,
    pub flux_err: Array2<f64>,
    pub flags: Array2<u16>,
    /// Background image summed in the star apertures.
    pub bkg_flux: Array2<f64>,
    pub bkg_flux_err: Array2<f64>,
    /// Flux in each empty-sky aperture.
    pub residual_bkg: Vec<f64>,
    /// Mean FWHM in arcsec.
    pub mean_fwhm: f64,
}

/// Per-frame scalars and positions.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    pub jd: f64,
    pub hjd: f64,
    pub bjd: f64,
    pub exposure: f64,
    pub airmass: f64,
    pub offset: RegistrationOffset,
    /// Refined positions.
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Catalog positions shifted by the registration offset.
    pub x_registered: Vec<f64>,
    pub y_registered: Vec<f64>,
}

/// The full reduction result: measurement arrays plus the physical values of
/// their axes.
#[derive(Clone, Debug)]
pub struct MeasurementGrid {
    pub radii: Vec<f64>,
    pub settings: Vec<BackgroundSetting>,
    pub catalog_x: Vec<f64>,
    pub catalog_y: Vec<f64>,

    pub flux: Array4<f64>,
    pub flux_err: Array4<f64>,
    pub flags: Array4<u16>,
    pub bkg_flux: Array4<f64>,
    pub bkg_flux_err: Array4<f64>,
    /// `[setting, empty aperture, frame]`
    pub residual_bkg: Array3<f64>,

    /// `[object, frame]`
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub x_unrefined: Array2<f64>,
    pub y_unrefined: Array2<f64>,
    /// `[setting, frame]`
    pub mean_fwhm: Array2<f64>,

    pub jd: Array1<f64>,
    pub hjd: Array1<f64>,
    pub bjd: Array1<f64>,
    pub shift_x: Array1<f64>,
    pub shift_y: Array1<f64>,
    pub exposure: Array1<f64>,
    pub airmass: Array1<f64>,
}

impl MeasurementGrid {
    /// Allocate a NaN-filled grid for the given axes.
    pub fn new(
        radii: Vec<f64>,
        settings: Vec<BackgroundSetting>,
        catalog_x: Vec<f64>,
        catalog_y: Vec<f64>,
        empty_apertures: usize,
        frames: usize,
    ) -> Result<Self> {
        if catalog_x.len() != catalog_y.len() {
            return Err(PhotometryError::GridShapeMismatch {
                array: "CATALOG_Y",
                expected: vec![catalog_x.len()],
                actual: vec![catalog_y.len()],
            });
        }
        let (r, o, s, f) = (radii.len(), catalog_x.len(), settings.len(), frames);
        let grid4 = || Array4::from_elem((r, o, s, f), f64::NAN);
        Ok(Self {
            flux: grid4(),
            flux_err: grid4(),
            flags: Array4::zeros((r, o, s, f)),
            bkg_flux: grid4(),
            bkg_flux_err: grid4(),
            residual_bkg: Array3::from_elem((s, empty_apertures, f), f64::NAN),
            x: Array2::from_elem((o, f), f64::NAN),
            y: Array2::from_elem((o, f), f64::NAN),
            x_unrefined: Array2::from_elem((o, f), f64::NAN),
            y_unrefined: Array2::from_elem((o, f), f64::NAN),
            mean_fwhm: Array2::from_elem((s, f), f64::NAN),
            jd: Array1::from_elem(f, f64::NAN),
            hjd: Array1::from_elem(f, f64::NAN),
            bjd: Array1::from_elem(f, f64::NAN),
            shift_x: Array1::from_elem(f, f64::NAN),
            shift_y: Array1::from_elem(f, f64::NAN),
            exposure: Array1::from_elem(f, f64::NAN),
            airmass: Array1::from_elem(f, f64::NAN),
            radii,
            settings,
            catalog_x,
            catalog_y,
        })
    }

    /// Axis lengths implied by the axis values.
    pub fn shape(&self) -> GridShape {
        GridShape {
            radii: self.radii.len(),
            objects: self.catalog_x.len(),
            settings: self.settings.len(),
            empty_apertures: self.residual_bkg.dim().1,
            frames: self.jd.len(),
        }
    }

    pub fn n_frames(&self) -> usize {
        self.jd.len()
    }

    pub fn n_objects(&self) -> usize {
        self.catalog_x.len()
    }

    /// Verify that every array agrees with the axis lengths.
    pub fn check_shape(&self) -> Result<()> {
        let g = self.shape();
        let four = [g.radii, g.objects, g.settings, g.frames];
        let obj_frame = [g.objects, g.frames];
        let frame = [g.frames];

        expect_dim("OBJ_FLUX", self.flux.raw_dim(), &four)?;
        expect_dim("OBJ_FLUX_ERR", self.flux_err.raw_dim(), &four)?;
        expect_dim("OBJ_FLUX_FLAGS", self.flags.raw_dim(), &four)?;
        expect_dim("OBJ_BKG_APP_FLUX", self.bkg_flux.raw_dim(), &four)?;
        expect_dim("OBJ_BKG_APP_FLUX_ERR", self.bkg_flux_err.raw_dim(), &four)?;
        expect_dim(
            "RESIDUAL_BKG_FLUX",
            self.residual_bkg.raw_dim(),
            &[g.settings, g.empty_apertures, g.frames],
        )?;
        expect_dim("OBJ_CCD_X", self.x.raw_dim(), &obj_frame)?;
        expect_dim("OBJ_CCD_Y", self.y.raw_dim(), &obj_frame)?;
        expect_dim("OBJ_CCD_X_UNREFINED", self.x_unrefined.raw_dim(), &obj_frame)?;
        expect_dim("OBJ_CCD_Y_UNREFINED", self.y_unrefined.raw_dim(), &obj_frame)?;
        expect_dim("MEAN_OBJ_FWHM", self.mean_fwhm.raw_dim(), &[g.settings, g.frames])?;
        expect_dim("CATALOG_Y", ndarray::Ix1(self.catalog_y.len()), &[g.objects])?;
        for (name, arr) in [
            ("HJD", &self.hjd),
            ("BJD", &self.bjd),
            ("FRAME_SHIFT_X", &self.shift_x),
            ("FRAME_SHIFT_Y", &self.shift_y),
            ("EXPOSURE_TIME", &self.exposure),
            ("AIRMASS", &self.airmass),
        ] {
            expect_dim(name, arr.raw_dim(), &frame)?;
        }
        Ok(())
    }

    /// Store one setting's apertures for one frame, dividing every flux by
    /// the exposure time.
    pub fn store_setting(
        &mut self,
        frame: usize,
        setting: usize,
        exposure: f64,
        m: &SettingMeasurement,
    ) -> Result<()> {
        let g = self.shape();
        self.check_index(frame, setting)?;
        let per_object = [g.radii, g.objects];
        expect_dim("OBJ_FLUX", m.flux.raw_dim(), &per_object)?;
        expect_dim("OBJ_FLUX_ERR", m.flux_err.raw_dim(), &per_object)?;
        expect_dim("OBJ_FLUX_FLAGS", m.flags.raw_dim(), &per_object)?;
        expect_dim("OBJ_BKG_APP_FLUX", m.bkg_flux.raw_dim(), &per_object)?;
        expect_dim("OBJ_BKG_APP_FLUX_ERR", m.bkg_flux_err.raw_dim(), &per_object)?;
        expect_dim(
            "RESIDUAL_BKG_FLUX",
            ndarray::Ix1(m.residual_bkg.len()),
            &[g.empty_apertures],
        )?;

        let rate = |a: &Array2<f64>| a.mapv(|v| v / exposure);
        self.flux.slice_mut(s![.., .., setting, frame]).assign(&rate(&m.flux));
        self.flux_err
            .slice_mut(s![.., .., setting, frame])
            .assign(&rate(&m.flux_err));
        self.flags.slice_mut(s![.., .., setting, frame]).assign(&m.flags);
        self.bkg_flux
            .slice_mut(s![.., .., setting, frame])
            .assign(&rate(&m.bkg_flux));
        self.bkg_flux_err
            .slice_mut(s![.., .., setting, frame])
            .assign(&rate(&m.bkg_flux_err));
        for (dst, &v) in self
            .residual_bkg
            .slice_mut(s![setting, .., frame])
            .iter_mut()
            .zip(&m.residual_bkg)
        {
            *dst = v / exposure;
        }
        self.mean_fwhm[[setting, frame]] = m.mean_fwhm;
        Ok(())
    }

    /// Store the per-frame scalars and the positions used for the frame.
    pub fn store_frame(&mut self, frame: usize, record: &FrameRecord) -> Result<()> {
        self.check_index(frame, 0)?;
        let n = [self.n_objects()];
        for (name, v) in [
            ("OBJ_CCD_X", &record.x),
            ("OBJ_CCD_Y", &record.y),
            ("OBJ_CCD_X_UNREFINED", &record.x_registered),
            ("OBJ_CCD_Y_UNREFINED", &record.y_registered),
        ] {
            expect_dim(name, ndarray::Ix1(v.len()), &n)?;
        }

        self.jd[frame] = record.jd;
        self.hjd[frame] = record.hjd;
        self.bjd[frame] = record.bjd;
        self.exposure[frame] = record.exposure;
        self.airmass[frame] = record.airmass;
        self.shift_x[frame] = record.offset.dx;
        self.shift_y[frame] = record.offset.dy;
        assign_column(&mut self.x, frame, &record.x);
        assign_column(&mut self.y, frame, &record.y);
        assign_column(&mut self.x_unrefined, frame, &record.x_registered);
        assign_column(&mut self.y_unrefined, frame, &record.y_registered);
        Ok(())
    }

    /// `(radius, setting, frame)` view of one object's flux.
    pub fn object_flux(&self, object: usize) -> ndarray::ArrayView3<'_, f64> {
        self.flux.index_axis(ndarray::Axis(1), object)
    }

    fn check_index(&self, frame: usize, setting: usize) -> Result<()> {
        if frame >= self.n_frames() {
            return Err(PhotometryError::FrameIndexOutOfRange {
                index: frame,
                total: self.n_frames(),
            });
        }
        if setting >= self.settings.len().max(1) {
            return Err(PhotometryError::GridShapeMismatch {
                array: "VARIABLES_BKG_PARAMS",
                expected: vec![self.settings.len()],
                actual: vec![setting + 1],
            });
        }
        Ok(())
    }
}

fn assign_column(dst: &mut Array2<f64>, frame: usize, values: &[f64]) {
    for (d, &v) in dst.column_mut(frame).iter_mut().zip(values) {
        *d = v;
    }
}

fn expect_dim<D: Dimension>(array: &'static str, dim: D, expected: &[usize]) -> Result<()> {
    let actual = dim.slice().to_vec();
    if actual != expected {
        return Err(PhotometryError::GridShapeMismatch {
            array,
            expected: expected.to_vec(),
            actual,
        });
    }
    Ok(())
}
