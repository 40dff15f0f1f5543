use approx::assert_abs_diff_eq;
use tempfile::tempdir;

use skyphot_core::background::BackgroundSetting;
use skyphot_core::error::PhotometryError;
use skyphot_core::frame::FrameIdentifiers;
use skyphot_core::grid::MeasurementGrid;
use skyphot_core::io::fits::{header_f64, header_text, FitsFile};
use skyphot_core::io::output::write_photometry;
use skyphot_core::lightcurve::products::{fractional_rms, out_of_transit_mask};
use skyphot_core::lightcurve::{build_products, run_lightcurves, LightCurveConfig, TimeStandard};

const JD0: f64 = 2460000.0;
const STEP: f64 = 30.0 / 86400.0;
const N_FRAMES: usize = 8;
/// Frames 3 and 4 are in transit.
const DEPTH: f64 = 0.95;

fn in_transit(frame: usize) -> bool {
    frame == 3 || frame == 4
}

/// Two radii, two settings, a target (0) and two comparisons (1, 2).
///
/// The target scatter grows with radius so the smaller radius wins, and the
/// second setting has the lower background residual.
fn transit_grid() -> MeasurementGrid {
    let mut grid = MeasurementGrid::new(
        vec![3.0, 5.0],
        vec![BackgroundSetting::square(16, 1), BackgroundSetting::square(32, 1)],
        vec![10.0, 20.0, 30.0],
        vec![10.0, 20.0, 30.0],
        4,
        N_FRAMES,
    )
    .unwrap();

    for f in 0..N_FRAMES {
        let wiggle = if f % 2 == 0 { 1.0 } else { -1.0 };
        let dip = if in_transit(f) { DEPTH } else { 1.0 };
        for (r, scatter) in [0.001, 0.01].into_iter().enumerate() {
            for s in 0..2 {
                let values = [
                    500.0 * dip * (1.0 + scatter * wiggle),
                    1000.0,
                    2000.0 * (1.0 + 0.0005 * wiggle),
                ];
                for (o, v) in values.into_iter().enumerate() {
                    grid.flux[[r, o, s, f]] = v;
                    grid.flux_err[[r, o, s, f]] = v.sqrt();
                }
            }
        }
        for e in 0..4 {
            grid.residual_bkg[[0, e, f]] = 1.0;
            grid.residual_bkg[[1, e, f]] = 0.5;
        }
        grid.jd[f] = JD0 + f as f64 * STEP;
        grid.bjd[f] = grid.jd[f] + 0.003;
        grid.exposure[f] = 30.0;
        grid.airmass[f] = 1.1;
    }
    grid
}

fn transit_config() -> LightCurveConfig {
    LightCurveConfig {
        target: 0,
        comparisons: vec![1, 2],
        bin_seconds: 30.0,
        ingress: Some(JD0 + 2.5 * STEP),
        egress: Some(JD0 + 4.5 * STEP),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Out-of-transit mask and scatter
// ---------------------------------------------------------------------------

#[test]
fn test_out_of_transit_mask() {
    let time = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_eq!(
        out_of_transit_mask(&time, Some(2.5), Some(3.5)),
        vec![true, true, false, true, true]
    );
    // Egress defaults to the last time.
    assert_eq!(
        out_of_transit_mask(&time, Some(3.5), None),
        vec![true, true, true, false, false]
    );
}

#[test]
fn test_mask_without_baseline_uses_every_frame() {
    let time = [1.0, 2.0, 3.0];
    assert_eq!(out_of_transit_mask(&time, None, None), vec![true; 3]);
    assert_eq!(out_of_transit_mask(&time, Some(0.0), Some(10.0)), vec![true; 3]);
}

#[test]
fn test_fractional_rms() {
    assert_abs_diff_eq!(fractional_rms(&[9.0, 10.0, 11.0]), 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(fractional_rms(&[9.0, f64::NAN, 10.0, 11.0]), 0.1, epsilon = 1e-12);
    assert!(fractional_rms(&[-1.0, 0.0, 1.0]).is_nan());
    assert!(fractional_rms(&[f64::NAN, f64::NAN]).is_nan());
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[test]
fn test_products_in_standard_order() {
    let set = build_products(&transit_grid(), &transit_config()).unwrap();
    let names: Vec<&str> = set.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "comparison_mean",
            "target_by_itself",
            "comparison_1_by_itself",
            "comparison_1",
            "comparison_1_vs_other_comps",
            "comparison_2_by_itself",
            "comparison_2",
            "comparison_2_vs_other_comps",
        ]
    );
}

#[test]
fn test_single_comparison_has_no_cross_product() {
    let config = LightCurveConfig {
        comparisons: vec![2],
        ..transit_config()
    };
    let set = build_products(&transit_grid(), &config).unwrap();
    let names: Vec<&str> = set.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        ["comparison_mean", "target_by_itself", "comparison_2_by_itself", "comparison_2"]
    );
}

#[test]
fn test_selection_uses_lowest_residual_setting() {
    let set = build_products(&transit_grid(), &transit_config()).unwrap();
    assert_eq!(set.lowest_residual_setting, 1);

    let mean = &set.products[0];
    let selection = mean.selection.unwrap();
    assert_eq!(selection.setting_index, 1);
    assert_eq!(selection.radius_index, 0);
    assert_eq!(mean.radius, 3.0);
    assert_eq!(mean.setting, Some(BackgroundSetting::square(32, 1)));

    // Both settings hold identical values; the first one wins globally.
    let global = mean.global_best.unwrap();
    assert_eq!((global.radius_index, global.setting_index), (0, 0));
    assert_abs_diff_eq!(global.snr, selection.snr, epsilon = 1e-9);
}

#[test]
fn test_comparison_mean_recovers_depth() {
    let set = build_products(&transit_grid(), &transit_config()).unwrap();
    let mean = &set.products[0];
    assert_eq!(mean.flux.len(), N_FRAMES);
    assert_eq!(mean.flux_err.len(), N_FRAMES);
    for (f, &v) in mean.flux.iter().enumerate() {
        let expected = if in_transit(f) { DEPTH } else { 1.0 };
        assert_abs_diff_eq!(v, expected, epsilon = 3e-3);
        assert!(mean.flux_err[f] > 0.0);
    }
    // One exposure per bin.
    assert_eq!(mean.flux_bin.len(), N_FRAMES);
    assert!(mean.frms > 0.0 && mean.frms < 5e-3);
}

#[test]
fn test_differential_clip_limits_apply_to_differential_bins() {
    let config = LightCurveConfig {
        flux_max: 0.97,
        ..transit_config()
    };
    let set = build_products(&transit_grid(), &config).unwrap();

    let mean = &set.products[0];
    assert_eq!(mean.flux_bin.len(), N_FRAMES - 2);
    assert_eq!(mean.time_bin.len(), N_FRAMES - 2);
    // Unbinned series keeps every frame.
    assert!(mean.flux.iter().all(|v| v.is_finite()));
    assert!(!mean.time_bin.contains(&(JD0 + 3.0 * STEP)));

    // Single-object curves use their own wide limits.
    let target_alone = &set.products[1];
    assert_eq!(target_alone.flux_bin.len(), N_FRAMES);
}

#[test]
fn test_single_object_curves_clip_outside_wide_limits() {
    let mut grid = transit_grid();
    // Frame 6 of the target reads 200x its baseline in every cell.
    for r in 0..2 {
        for s in 0..2 {
            grid.flux[[r, 0, s, 6]] *= 200.0;
        }
    }
    let set = build_products(&grid, &transit_config()).unwrap();
    let target_alone = &set.products[1];
    assert_eq!(target_alone.name, "target_by_itself");
    // Kept unbinned, dropped from the bins.
    assert!(target_alone.flux[6] > 99.0);
    assert_eq!(target_alone.flux_bin.len(), N_FRAMES - 1);
    assert!(!target_alone.time_bin.contains(&(JD0 + 6.0 * STEP)));

    let comp_alone = &set.products[2];
    assert_eq!(comp_alone.flux_bin.len(), N_FRAMES);
}

#[test]
fn test_time_standard_selects_column() {
    let config = LightCurveConfig {
        time: TimeStandard::Bjd,
        ..transit_config()
    };
    let set = build_products(&transit_grid(), &config).unwrap();
    assert_abs_diff_eq!(set.products[0].time[0], JD0 + 0.003, epsilon = 1e-9);
}

#[test]
fn test_invalid_target_is_an_error() {
    let config = LightCurveConfig {
        target: 7,
        ..transit_config()
    };
    assert!(build_products(&transit_grid(), &config).is_err());

    let config = LightCurveConfig {
        comparisons: vec![0, 1],
        ..transit_config()
    };
    assert!(build_products(&transit_grid(), &config).is_err());

    let config = LightCurveConfig {
        comparisons: vec![2, 1, 2],
        ..transit_config()
    };
    assert!(matches!(
        build_products(&transit_grid(), &config),
        Err(PhotometryError::InvalidSelection(_))
    ));
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn test_run_lightcurves_names_files_after_object() {
    let dir = tempdir().unwrap();
    let photometry = dir.path().join("phot.fits");
    let identifiers = FrameIdentifiers {
        object: Some("HAT P 7".into()),
        ..Default::default()
    };
    write_photometry(&photometry, &transit_grid(), &identifiers).unwrap();

    let config = LightCurveConfig {
        photometry: photometry.clone(),
        output_dir: dir.path().join("curves"),
        time: TimeStandard::Bjd,
        ..transit_config()
    };
    let (set, paths) = run_lightcurves(&config).unwrap();
    assert_eq!(paths.len(), set.products.len());
    assert!(paths.iter().all(|p| p.exists()));
    assert!(paths[0].ends_with("HAT_P_7_comparison_mean.fits"));

    let file = FitsFile::open(&paths[0]).unwrap();
    let header = file.primary().unwrap();
    assert_eq!(header_text(&header, "TIMESYS").as_deref(), Some("BJD"));
    assert_eq!(header_f64(&header, "APRAD"), Some(3.0));
    assert_eq!(header_f64(&header, "BKGBOX"), Some(32.0));
    let time = file.read_extension("TIME").unwrap();
    assert_eq!(time.len(), N_FRAMES);
    assert_abs_diff_eq!(time[&[0][..]], JD0 + 0.003, epsilon = 1e-9);
}

#[test]
fn test_explicit_prefix_wins() {
    let dir = tempdir().unwrap();
    let photometry = dir.path().join("phot.fits");
    write_photometry(&photometry, &transit_grid(), &FrameIdentifiers::default()).unwrap();

    let config = LightCurveConfig {
        photometry,
        output_dir: dir.path().to_path_buf(),
        prefix: Some("night one".into()),
        ..transit_config()
    };
    let (_, paths) = run_lightcurves(&config).unwrap();
    assert!(paths[1].ends_with("night_one_target_by_itself.fits"));
}
