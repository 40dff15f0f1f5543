//! Multi-extension FITS file holding a complete measurement grid.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, Dimension};
use tracing::info;

use crate::background::BackgroundSetting;
use crate::error::{PhotometryError, Result};
use crate::frame::FrameIdentifiers;
use crate::grid::MeasurementGrid;
use crate::io::fits::{f64_extension, header_text, i32_extension, write_fits, FitsFile, Hdu};

pub const OBJ_FLUX: &str = "OBJ_FLUX";
pub const OBJ_FLUX_ERR: &str = "OBJ_FLUX_ERR";
pub const OBJ_FLUX_FLAGS: &str = "OBJ_FLUX_FLAGS";
pub const OBJ_BKG_APP_FLUX: &str = "OBJ_BKG_APP_FLUX";
pub const OBJ_BKG_APP_FLUX_ERR: &str = "OBJ_BKG_APP_FLUX_ERR";
pub const RESIDUAL_BKG_FLUX: &str = "RESIDUAL_BKG_FLUX";
pub const OBJ_CCD_X: &str = "OBJ_CCD_X";
pub const OBJ_CCD_Y: &str = "OBJ_CCD_Y";
pub const OBJ_CCD_X_UNREFINED: &str = "OBJ_CCD_X_UNREFINED";
pub const OBJ_CCD_Y_UNREFINED: &str = "OBJ_CCD_Y_UNREFINED";
pub const MEAN_OBJ_FWHM: &str = "MEAN_OBJ_FWHM";
pub const JD: &str = "JD";
pub const HJD: &str = "HJD";
pub const BJD: &str = "BJD";
pub const FRAME_SHIFT_X: &str = "FRAME_SHIFT_X";
pub const FRAME_SHIFT_Y: &str = "FRAME_SHIFT_Y";
pub const EXPOSURE_TIME: &str = "EXPOSURE_TIME";
pub const AIRMASS: &str = "AIRMASS";
pub const VARIABLES_APERTURE_RADII: &str = "VARIABLES_APERTURE_RADII";
pub const VARIABLES_BKG_PARAMS: &str = "VARIABLES_BKG_PARAMS";
pub const CATALOG_X: &str = "CATALOG_X";
pub const CATALOG_Y: &str = "CATALOG_Y";

/// A reduction run as persisted on disk.
#[derive(Clone, Debug)]
pub struct PhotometryFile {
    pub grid: MeasurementGrid,
    pub identifiers: FrameIdentifiers,
}

fn insert_identifiers(hdu: &mut Hdu, ids: &FrameIdentifiers) {
    let fields = [
        ("OBJECT", &ids.object),
        ("TELESCOP", &ids.telescope),
        ("INSTRUME", &ids.instrument),
        ("OBSERVER", &ids.observer),
        ("DATE-OBS", &ids.date_obs),
        ("RA", &ids.ra),
        ("DEC", &ids.dec),
        ("FILTERA", &ids.filter_a),
        ("FILTERB", &ids.filter_b),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            hdu.insert(key, v.as_str());
        }
    }
    hdu.insert("FILTER", ids.filter_name().as_str());
}

/// Write every grid array and axis as a named extension.
pub fn write_photometry(path: &Path, grid: &MeasurementGrid, identifiers: &FrameIdentifiers) -> Result<()> {
    grid.check_shape()?;

    let mut primary = Hdu::empty();
    insert_identifiers(&mut primary, identifiers);
    primary.insert("NFRAMES", grid.n_frames() as i32);
    primary.insert("NOBJECTS", grid.n_objects() as i32);

    let mut params = Array2::<i32>::zeros((grid.settings.len(), 4));
    for (mut row, s) in params.outer_iter_mut().zip(&grid.settings) {
        row[0] = s.box_width as i32;
        row[1] = s.box_height as i32;
        row[2] = s.filter_width as i32;
        row[3] = s.filter_height as i32;
    }

    let extensions = vec![
        f64_extension(OBJ_FLUX, &grid.flux),
        f64_extension(OBJ_FLUX_ERR, &grid.flux_err),
        i32_extension(OBJ_FLUX_FLAGS, &grid.flags.mapv(i32::from)),
        f64_extension(OBJ_BKG_APP_FLUX, &grid.bkg_flux),
        f64_extension(OBJ_BKG_APP_FLUX_ERR, &grid.bkg_flux_err),
        f64_extension(RESIDUAL_BKG_FLUX, &grid.residual_bkg),
        f64_extension(OBJ_CCD_X, &grid.x),
        f64_extension(OBJ_CCD_Y, &grid.y),
        f64_extension(OBJ_CCD_X_UNREFINED, &grid.x_unrefined),
        f64_extension(OBJ_CCD_Y_UNREFINED, &grid.y_unrefined),
        f64_extension(MEAN_OBJ_FWHM, &grid.mean_fwhm),
        f64_extension(JD, &grid.jd),
        f64_extension(HJD, &grid.hjd),
        f64_extension(BJD, &grid.bjd),
        f64_extension(FRAME_SHIFT_X, &grid.shift_x),
        f64_extension(FRAME_SHIFT_Y, &grid.shift_y),
        f64_extension(EXPOSURE_TIME, &grid.exposure),
        f64_extension(AIRMASS, &grid.airmass),
        f64_extension(VARIABLES_APERTURE_RADII, &Array1::from(grid.radii.clone())),
        i32_extension(VARIABLES_BKG_PARAMS, &params),
        f64_extension(CATALOG_X, &Array1::from(grid.catalog_x.clone())),
        f64_extension(CATALOG_Y, &Array1::from(grid.catalog_y.clone())),
    ];
    write_fits(path, primary, extensions)?;

    info!(path = %path.display(), frames = grid.n_frames(), "Wrote photometry file");
    Ok(())
}

fn named<D: Dimension>(file: &FitsFile, name: &'static str) -> Result<ndarray::Array<f64, D>> {
    let data: ArrayD<f64> = file.read_extension(name)?;
    let shape = data.shape().to_vec();
    data.into_dimensionality::<D>()
        .map_err(|_| PhotometryError::GridShapeMismatch {
            array: name,
            expected: vec![D::NDIM.unwrap_or(0)],
            actual: shape,
        })
}

fn vector(file: &FitsFile, name: &'static str) -> Result<Vec<f64>> {
    Ok(named::<ndarray::Ix1>(file, name)?.to_vec())
}

/// Read a file written by [`write_photometry`]; every array shape is validated.
pub fn read_photometry(path: &Path) -> Result<PhotometryFile> {
    let reader = FitsFile::open(path)?;
    let primary = reader.primary()?;
    let text = |key: &str| header_text(&primary, key).filter(|s| !s.is_empty());
    let identifiers = FrameIdentifiers {
        object: text("OBJECT"),
        ra: text("RA"),
        dec: text("DEC"),
        filter_a: text("FILTERA"),
        filter_b: text("FILTERB"),
        telescope: text("TELESCOP"),
        instrument: text("INSTRUME"),
        observer: text("OBSERVER"),
        date_obs: text("DATE-OBS"),
    };

    let params = named::<ndarray::Ix2>(&reader, VARIABLES_BKG_PARAMS)?;
    if params.ncols() != 4 {
        return Err(PhotometryError::GridShapeMismatch {
            array: VARIABLES_BKG_PARAMS,
            expected: vec![params.nrows(), 4],
            actual: params.shape().to_vec(),
        });
    }
    let settings = params
        .outer_iter()
        .map(|row| BackgroundSetting {
            box_width: row[0] as usize,
            box_height: row[1] as usize,
            filter_width: row[2] as usize,
            filter_height: row[3] as usize,
        })
        .collect();

    let grid = MeasurementGrid {
        radii: vector(&reader, VARIABLES_APERTURE_RADII)?,
        settings,
        catalog_x: vector(&reader, CATALOG_X)?,
        catalog_y: vector(&reader, CATALOG_Y)?,
        flux: named(&reader, OBJ_FLUX)?,
        flux_err: named(&reader, OBJ_FLUX_ERR)?,
        flags: named::<ndarray::Ix4>(&reader, OBJ_FLUX_FLAGS)?.mapv(|f| f as u16),
        bkg_flux: named(&reader, OBJ_BKG_APP_FLUX)?,
        bkg_flux_err: named(&reader, OBJ_BKG_APP_FLUX_ERR)?,
        residual_bkg: named(&reader, RESIDUAL_BKG_FLUX)?,
        x: named(&reader, OBJ_CCD_X)?,
        y: named(&reader, OBJ_CCD_Y)?,
        x_unrefined: named(&reader, OBJ_CCD_X_UNREFINED)?,
        y_unrefined: named(&reader, OBJ_CCD_Y_UNREFINED)?,
        mean_fwhm: named(&reader, MEAN_OBJ_FWHM)?,
        jd: named(&reader, JD)?,
        hjd: named(&reader, HJD)?,
        bjd: named(&reader, BJD)?,
        shift_x: named(&reader, FRAME_SHIFT_X)?,
        shift_y: named(&reader, FRAME_SHIFT_Y)?,
        exposure: named(&reader, EXPOSURE_TIME)?,
        airmass: named(&reader, AIRMASS)?,
    };
    grid.check_shape()?;
    Ok(PhotometryFile { grid, identifiers })
}
