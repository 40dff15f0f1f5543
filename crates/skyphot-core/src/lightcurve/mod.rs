//! Differential light curves from a completed measurement grid.

pub mod binning;
pub mod differential;
pub mod optimizer;
pub mod products;

pub use binning::{bin_block, bin_to_duration, exposure_blocks, points_per_bin, ExposureBlock};
pub use differential::{differential_photometry, normalize_series, DifferentialLightCurve};
pub use optimizer::{lowest_residual_setting, select_best, select_best_in_setting, signal_to_noise, Selection};
pub use products::{build_products, run_lightcurves, LightCurveConfig, LightCurveProduct, LightCurveSet, TimeStandard};
