use ndarray::Array2;

use skyphot_core::background::BackgroundSetting;
use skyphot_core::error::PhotometryError;
use skyphot_core::grid::{GridShape, MeasurementGrid, SettingMeasurement};

fn grid() -> MeasurementGrid {
    MeasurementGrid::new(
        vec![2.0, 3.0, 4.0],
        vec![BackgroundSetting::square(16, 1), BackgroundSetting::square(16, 3)],
        vec![10.0, 20.0],
        vec![12.0, 22.0],
        5,
        4,
    )
    .unwrap()
}

fn measurement(n_rad: usize, n_obj: usize, n_empty: usize, flux: f64) -> SettingMeasurement {
    SettingMeasurement {
        flux: Array2::from_elem((n_rad, n_obj), flux),
        flux_err: Array2::from_elem((n_rad, n_obj), 3.0),
        flags: Array2::zeros((n_rad, n_obj)),
        bkg_flux: Array2::from_elem((n_rad, n_obj), 6.0),
        bkg_flux_err: Array2::from_elem((n_rad, n_obj), 1.5),
        residual_bkg: vec![2.0; n_empty],
        mean_fwhm: 1.8,
    }
}

#[test]
fn test_new_grid_is_nan_filled() {
    let g = grid();
    assert_eq!(
        g.shape(),
        GridShape {
            radii: 3,
            objects: 2,
            settings: 2,
            empty_apertures: 5,
            frames: 4,
        }
    );
    g.check_shape().unwrap();
    assert_eq!(g.flux.dim(), (3, 2, 2, 4));
    assert_eq!(g.residual_bkg.dim(), (2, 5, 4));
    assert!(g.flux.iter().all(|v| v.is_nan()));
    assert!(g.flags.iter().all(|&f| f == 0));
    assert!(g.jd.iter().all(|v| v.is_nan()));
}

#[test]
fn test_mismatched_catalog_is_rejected() {
    let err = MeasurementGrid::new(vec![2.0], vec![BackgroundSetting::square(16, 1)], vec![1.0, 2.0], vec![1.0], 1, 1)
        .unwrap_err();
    assert!(matches!(err, PhotometryError::GridShapeMismatch { .. }));
}

#[test]
fn test_store_setting_divides_by_exposure() {
    let mut g = grid();
    g.store_setting(1, 1, 20.0, &measurement(3, 2, 5, 400.0)).unwrap();

    assert_eq!(g.flux[[0, 0, 1, 1]], 20.0);
    assert_eq!(g.flux[[2, 1, 1, 1]], 20.0);
    assert_eq!(g.flux_err[[1, 0, 1, 1]], 0.15);
    assert_eq!(g.bkg_flux[[1, 0, 1, 1]], 0.3);
    assert_eq!(g.residual_bkg[[1, 4, 1]], 0.1);
    assert_eq!(g.mean_fwhm[[1, 1]], 1.8);
    // Other cells untouched.
    assert!(g.flux[[0, 0, 0, 1]].is_nan());
    assert!(g.flux[[0, 0, 1, 0]].is_nan());
    g.check_shape().unwrap();
}

#[test]
fn test_object_flux_view() {
    let mut g = grid();
    g.store_setting(0, 0, 1.0, &measurement(3, 2, 5, 7.0)).unwrap();
    let view = g.object_flux(1);
    assert_eq!(view.dim(), (3, 2, 4));
    assert_eq!(view[[2, 0, 0]], 7.0);
}

#[test]
fn test_out_of_range_indices_are_errors() {
    let mut g = grid();
    let m = measurement(3, 2, 5, 1.0);
    assert!(matches!(
        g.store_setting(4, 0, 1.0, &m),
        Err(PhotometryError::FrameIndexOutOfRange { index: 4, total: 4 })
    ));
    assert!(matches!(
        g.store_setting(0, 2, 1.0, &m),
        Err(PhotometryError::GridShapeMismatch { .. })
    ));
}

#[test]
fn test_wrong_measurement_shape_is_rejected() {
    let mut g = grid();
    assert!(matches!(
        g.store_setting(0, 0, 1.0, &measurement(2, 2, 5, 1.0)),
        Err(PhotometryError::GridShapeMismatch { array: "OBJ_FLUX", .. })
    ));
    assert!(matches!(
        g.store_setting(0, 0, 1.0, &measurement(3, 2, 4, 1.0)),
        Err(PhotometryError::GridShapeMismatch {
            array: "RESIDUAL_BKG_FLUX",
            ..
        })
    ));
}

#[test]
fn test_corrupted_array_fails_shape_check() {
    let mut g = grid();
    g.mean_fwhm = Array2::zeros((1, 4));
    assert!(g.check_shape().is_err());
}
