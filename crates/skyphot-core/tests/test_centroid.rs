mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use common::{render_stars, Star};
use skyphot_core::consts::WINDOW_SIGMA_SCALE;
use skyphot_core::photometry::flags::{CENTROID_DIVERGED, RADIUS_FAILED};
use skyphot_core::photometry::{flux_radius, winpos};

/// Half-flux radius of a circular Gaussian: sigma * sqrt(2 ln 2).
fn gaussian_hfr(sigma: f64) -> f64 {
    sigma * (2.0 * 2f64.ln()).sqrt()
}

// ---------------------------------------------------------------------------
// Half-flux radius
// ---------------------------------------------------------------------------

#[test]
fn test_half_flux_radius_of_gaussian() {
    let star = Star::new(20.3, 17.6, 1.5, 1000.0);
    let image = render_stars(48, 48, 0.0, &[star]);

    let r = flux_radius(&image, &[star.x], &[star.y], 10.0, 0.5, 10);
    assert_eq!(r[0].flag, 0);
    assert_abs_diff_eq!(r[0].radius, gaussian_hfr(1.5), epsilon = 0.1);
}

#[test]
fn test_wider_star_has_larger_radius() {
    let narrow = Star::new(12.0, 12.0, 1.2, 1000.0);
    let wide = Star::new(36.0, 36.0, 2.4, 1000.0);
    let image = render_stars(48, 48, 0.0, &[narrow, wide]);

    let r = flux_radius(&image, &[narrow.x, wide.x], &[narrow.y, wide.y], 10.0, 0.5, 5);
    assert!(r[1].radius > 1.6 * r[0].radius);
}

#[test]
fn test_empty_sky_fails_radius() {
    let image = Array2::<f32>::zeros((32, 32));
    let r = flux_radius(&image, &[16.0], &[16.0], 10.0, 0.5, 5);
    assert!(r[0].radius.is_nan());
    assert_ne!(r[0].flag & RADIUS_FAILED, 0);
}

// ---------------------------------------------------------------------------
// Windowed centroid
// ---------------------------------------------------------------------------

#[test]
fn test_winpos_converges_to_true_centre() {
    let star = Star::new(20.3, 17.6, 1.5, 1000.0);
    let image = render_stars(48, 48, 0.0, &[star]);
    let sigma = gaussian_hfr(1.5) * WINDOW_SIGMA_SCALE;

    let c = winpos(&image, &[21.0], &[17.0], &[sigma]);
    assert_eq!(c[0].flag, 0);
    assert_abs_diff_eq!(c[0].x, star.x, epsilon = 0.02);
    assert_abs_diff_eq!(c[0].y, star.y, epsilon = 0.02);
    assert!(c[0].flux > 0.0);
}

#[test]
fn test_winpos_on_empty_sky_keeps_input_position() {
    let image = Array2::<f32>::zeros((32, 32));
    let c = winpos(&image, &[10.5], &[12.5], &[1.0]);
    assert_eq!(c[0].flag, CENTROID_DIVERGED);
    assert_eq!((c[0].x, c[0].y), (10.5, 12.5));
}

#[test]
fn test_winpos_rejects_nan_sigma() {
    let star = Star::new(16.0, 16.0, 1.5, 1000.0);
    let image = render_stars(32, 32, 0.0, &[star]);
    let c = winpos(&image, &[16.0], &[16.0], &[f64::NAN]);
    assert_eq!(c[0].flag, CENTROID_DIVERGED);
    assert_eq!(c[0].x, 16.0);
}
