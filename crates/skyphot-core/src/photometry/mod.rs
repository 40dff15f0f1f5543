//! Circular-aperture photometry and per-object centroid refinement.

pub mod aperture;
pub mod centroid;
pub mod flags;

pub use aperture::{sum_circle_grid, sum_circles, ApertureGrid, ApertureOptions, ApertureSum};
pub use centroid::{flux_radius, winpos, HalfFluxRadius, WindowedCentroid};

/// Half the diagonal of a unit pixel.
pub(crate) const HALF_DIAGONAL: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Inclusive pixel index range covering `[centre - reach, centre + reach]`,
/// clamped to `0..len`. The flag is true when clamping cut the range.
pub(crate) fn pixel_span(centre: f64, reach: f64, len: usize) -> (usize, usize, bool) {
    let lo = (centre - reach).ceil();
    let hi = (centre + reach).floor();
    let truncated = lo < 0.0 || hi > len as f64 - 1.0;
    let lo = lo.max(0.0) as usize;
    let hi = hi.min(len as f64 - 1.0).max(-1.0);
    if hi < lo as f64 {
        return (1, 0, truncated);
    }
    (lo, hi as usize, truncated)
}
