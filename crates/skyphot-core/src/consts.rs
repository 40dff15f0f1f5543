/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Background box size used to build the object catalog from the reference frame.
pub const CATALOG_BOX_SIZE: usize = 32;

/// Background filter width used to build the object catalog.
pub const CATALOG_FILTER_WIDTH: usize = 3;

/// Detection threshold (in units of global RMS) for catalog sources.
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 7.0;

/// Detection threshold for the per-frame star mask used by empty-sky apertures.
/// Deliberately low so star wings are masked too.
pub const DEFAULT_MASK_THRESHOLD: f64 = 1.0;

/// Minimum connected pixel count for an extracted source.
pub const DEFAULT_MIN_AREA: usize = 5;

/// Radius (px) within which the total flux for the half-flux radius is measured.
pub const DEFAULT_FLUX_RADIUS_REFERENCE: f64 = 10.0;

/// Enclosed-flux fraction defining the half-flux radius.
pub const HALF_FLUX_FRACTION: f64 = 0.5;

/// Sub-pixel sampling factor for aperture boundary pixels.
pub const DEFAULT_SUBPIX: usize = 10;

/// Ratio between a Gaussian FWHM and the windowed-centroid sigma (1 / 2.3548).
pub const WINDOW_SIGMA_SCALE: f64 = 0.424;

/// Windowed centroid: window radius in units of sigma.
pub const WINPOS_NSIG: f64 = 4.0;

/// Windowed centroid: maximum iterations.
pub const WINPOS_MAX_ITER: usize = 16;

/// Windowed centroid: convergence threshold on the step length (px).
pub const WINPOS_STEP_MIN: f64 = 2e-4;

/// Number of cumulative annuli used to locate the half-flux radius.
pub const FLUX_RADIUS_BINS: usize = 64;

/// Sigma-clipping threshold for background mesh statistics.
pub const BACKGROUND_CLIP_SIGMA: f64 = 3.0;

/// Maximum sigma-clipping iterations per background box.
pub const BACKGROUND_CLIP_ITERATIONS: usize = 10;

/// Default number of randomly placed empty-sky apertures.
pub const DEFAULT_EMPTY_APERTURE_COUNT: usize = 100;

/// Default radius (px) of the empty-sky apertures.
pub const DEFAULT_EMPTY_APERTURE_RADIUS: f64 = 4.0;

/// Fraction of the frame excluded at each edge when placing empty apertures.
pub const DEFAULT_EMPTY_APERTURE_MARGIN: f64 = 0.05;

/// Seed for the empty aperture generator.
pub const DEFAULT_EMPTY_APERTURE_SEED: u64 = 0x5AA0;

/// Default plate scale (arcsec / unbinned pixel).
pub const DEFAULT_PLATESCALE: f64 = 0.167;

/// Default light-curve bin duration in seconds.
pub const DEFAULT_BIN_SECONDS: f64 = 600.0;

/// Default normalized-flux clip limits for differential light curves.
pub const DEFAULT_FLUX_CLIP_LOWER: f64 = 0.0;
pub const DEFAULT_FLUX_CLIP_UPPER: f64 = 1.2;

/// Normalized-flux limits applied to single-object light curves.
pub const BY_ITSELF_FLUX_LIMITS: (f64, f64) = (0.0, 99.0);
