mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use common::add_uniform_noise;
use skyphot_core::background::{setting_axis, Background, BackgroundSetting};
use skyphot_core::error::PhotometryError;

// ---------------------------------------------------------------------------
// Setting axis
// ---------------------------------------------------------------------------

#[test]
fn test_setting_axis_is_box_major() {
    let settings = setting_axis(&[16, 32], &[1, 3]);
    let flat: Vec<(usize, usize)> = settings.iter().map(|s| (s.box_width, s.filter_width)).collect();
    assert_eq!(flat, vec![(16, 1), (16, 3), (32, 1), (32, 3)]);
    assert!(settings.iter().all(|s| s.box_width == s.box_height && s.filter_width == s.filter_height));
}

#[test]
fn test_setting_display() {
    assert_eq!(BackgroundSetting::square(32, 3).to_string(), "box 32x32, filter 3x3");
}

#[test]
fn test_zero_filter_width_is_rejected() {
    let data = Array2::<f32>::from_elem((32, 32), 10.0);
    let err = Background::estimate(&data, BackgroundSetting::square(16, 0)).unwrap_err();
    assert!(matches!(
        err,
        PhotometryError::InvalidBackgroundSetting { filter_width: 0, .. }
    ));
    assert!(BackgroundSetting::square(0, 3).validate().is_err());
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

#[test]
fn test_flat_noisy_sky() {
    let mut data = Array2::<f32>::from_elem((64, 64), 100.0);
    add_uniform_noise(&mut data, 5.0, 7);

    let bkg = Background::estimate(&data, BackgroundSetting::square(16, 3)).unwrap();
    let expected_rms = 5.0 / 3f64.sqrt();
    assert_abs_diff_eq!(bkg.global_back, 100.0, epsilon = 0.75);
    assert_abs_diff_eq!(bkg.global_rms, expected_rms, epsilon = 0.3);
    assert_eq!(bkg.back().dim(), (64, 64));
    for &v in bkg.back().iter() {
        assert!((v - 100.0).abs() < 2.0, "background {v} too far from 100");
    }
}

#[test]
fn test_linear_gradient_is_reproduced_between_box_centres() {
    let data = Array2::from_shape_fn((64, 64), |(_, col)| 50.0 + 0.5 * col as f32);
    let bkg = Background::estimate(&data, BackgroundSetting::square(16, 1)).unwrap();

    for col in 8..=55 {
        let v = bkg.back()[[20, col]];
        assert_abs_diff_eq!(v, data[[20, col]], epsilon = 1e-3);
    }
}

#[test]
fn test_subtraction_leaves_star_on_zero_sky() {
    let mut data = Array2::<f32>::from_elem((64, 64), 250.0);
    data[[30, 30]] += 1000.0;
    let bkg = Background::estimate(&data, BackgroundSetting::square(16, 1)).unwrap();
    let sub = bkg.subtract_from(&data);
    assert_abs_diff_eq!(sub[[10, 10]], 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(sub[[30, 30]], 1000.0, epsilon = 1e-3);
}

#[test]
fn test_median_filter_removes_isolated_box() {
    let mut data = Array2::<f32>::from_elem((64, 64), 100.0);
    for row in 16..32 {
        for col in 16..32 {
            data[[row, col]] = 1100.0;
        }
    }

    let unfiltered = Background::estimate(&data, BackgroundSetting::square(16, 1)).unwrap();
    assert!(unfiltered.back()[[23, 23]] > 1000.0);

    let filtered = Background::estimate(&data, BackgroundSetting::square(16, 3)).unwrap();
    assert_abs_diff_eq!(filtered.back()[[23, 23]], 100.0, epsilon = 1e-3);
}

#[test]
fn test_nan_pixels_are_ignored() {
    let mut data = Array2::<f32>::from_elem((32, 32), 42.0);
    for col in 0..32 {
        data[[5, col]] = f32::NAN;
    }
    let bkg = Background::estimate(&data, BackgroundSetting::square(16, 1)).unwrap();
    assert_abs_diff_eq!(bkg.global_back, 42.0, epsilon = 1e-9);
    assert!(bkg.back().iter().all(|v| v.is_finite()));
}
