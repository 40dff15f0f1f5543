use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::DEFAULT_SUBPIX;
use crate::error::{PhotometryError, Result};

use super::flags::{APER_ALLMASKED, APER_HASMASKED, APER_NONFINITE, APER_TRUNC};
use super::{pixel_span, HALF_DIAGONAL};

/// Noise model and masking shared by every aperture in one call.
#[derive(Clone, Copy, Debug)]
pub struct ApertureOptions<'a> {
    /// Per-pixel background noise (ADU).
    pub rms: f64,
    /// Electrons per ADU; non-positive disables the Poisson term.
    pub gain: f64,
    /// Pixels with a non-zero label are excluded.
    pub mask: Option<&'a Array2<u32>>,
    /// Sub-samples per axis for boundary pixels.
    pub subpix: usize,
}

impl Default for ApertureOptions<'_> {
    fn default() -> Self {
        Self {
            rms: 0.0,
            gain: 0.0,
            mask: None,
            subpix: DEFAULT_SUBPIX,
        }
    }
}

/// Result of one circular aperture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApertureSum {
    pub flux: f64,
    pub flux_err: f64,
    pub flag: u16,
}

/// Aperture results for every (radius, object) pair, shape `(n_radii, n_objects)`.
#[derive(Clone, Debug)]
pub struct ApertureGrid {
    pub flux: Array2<f64>,
    pub flux_err: Array2<f64>,
    pub flags: Array2<u16>,
}

/// Fraction of the unit pixel centred at `(dx, dy)` that lies inside radius `r`,
/// sampled on a `subpix x subpix` grid.
pub(crate) fn pixel_overlap(dx: f64, dy: f64, r: f64, subpix: usize) -> f64 {
    let s = subpix.max(1);
    let step = 1.0 / s as f64;
    let r2 = r * r;
    let mut inside = 0usize;
    for sy in 0..s {
        let oy = dy - 0.5 + (sy as f64 + 0.5) * step;
        for sx in 0..s {
            let ox = dx - 0.5 + (sx as f64 + 0.5) * step;
            if ox * ox + oy * oy < r2 {
                inside += 1;
            }
        }
    }
    inside as f64 / (s * s) as f64
}

fn sum_circle(image: &Array2<f32>, x: f64, y: f64, r: f64, opts: &ApertureOptions<'_>) -> ApertureSum {
    if !(x.is_finite() && y.is_finite() && r.is_finite()) || r <= 0.0 {
        return ApertureSum {
            flux: f64::NAN,
            flux_err: f64::NAN,
            flag: APER_NONFINITE,
        };
    }

    let (h, w) = image.dim();
    let reach = r + HALF_DIAGONAL;
    let inner2 = if r > HALF_DIAGONAL {
        (r - HALF_DIAGONAL).powi(2)
    } else {
        0.0
    };
    let outer2 = reach * reach;

    let (col_lo, col_hi, trunc_x) = pixel_span(x, reach, w);
    let (row_lo, row_hi, trunc_y) = pixel_span(y, reach, h);
    let mut flag = if trunc_x || trunc_y { APER_TRUNC } else { 0 };

    let mut flux = 0.0f64;
    let mut area = 0.0f64;
    let mut masked_area = 0.0f64;
    for row in row_lo..=row_hi {
        let dy = row as f64 - y;
        for col in col_lo..=col_hi {
            let dx = col as f64 - x;
            let d2 = dx * dx + dy * dy;
            if d2 >= outer2 {
                continue;
            }
            let overlap = if d2 > inner2 {
                pixel_overlap(dx, dy, r, opts.subpix)
            } else {
                1.0
            };
            if overlap <= 0.0 {
                continue;
            }
            area += overlap;

            let masked = opts.mask.is_some_and(|m| m[[row, col]] != 0);
            let v = image[[row, col]];
            if !v.is_finite() {
                flag |= APER_NONFINITE;
                masked_area += overlap;
            } else if masked {
                masked_area += overlap;
            } else {
                flux += overlap * v as f64;
            }
        }
    }

    let unmasked = area - masked_area;
    if masked_area > 0.0 {
        if unmasked <= 0.0 {
            return ApertureSum {
                flux: 0.0,
                flux_err: 0.0,
                flag: flag | APER_HASMASKED | APER_ALLMASKED,
            };
        }
        flag |= APER_HASMASKED;
    }

    let mut variance = unmasked * opts.rms * opts.rms;
    if masked_area > 0.0 {
        let scale = area / unmasked;
        flux *= scale;
        variance *= scale;
    }
    if opts.gain > 0.0 && flux > 0.0 {
        variance += flux / opts.gain;
    }

    ApertureSum {
        flux,
        flux_err: variance.sqrt(),
        flag,
    }
}

fn check_mask(image: &Array2<f32>, opts: &ApertureOptions<'_>) -> Result<()> {
    if let Some(mask) = opts.mask {
        if mask.dim() != image.dim() {
            return Err(PhotometryError::ApertureShape(format!(
                "mask is {:?} but image is {:?}",
                mask.dim(),
                image.dim()
            )));
        }
    }
    Ok(())
}

/// Sum flux in circular apertures, one radius per position.
///
/// `xs`, `ys` and `radii` must have equal length; tile the radii to request
/// several apertures per object.
pub fn sum_circles(
    image: &Array2<f32>,
    xs: &[f64],
    ys: &[f64],
    radii: &[f64],
    opts: &ApertureOptions<'_>,
) -> Result<Vec<ApertureSum>> {
    if xs.len() != ys.len() || xs.len() != radii.len() {
        return Err(PhotometryError::ApertureShape(format!(
            "{} x positions, {} y positions, {} radii",
            xs.len(),
            ys.len(),
            radii.len()
        )));
    }
    check_mask(image, opts)?;

    Ok(xs
        .par_iter()
        .zip(ys.par_iter())
        .zip(radii.par_iter())
        .map(|((&x, &y), &r)| sum_circle(image, x, y, r, opts))
        .collect())
}

/// Sum every radius at every object position.
pub fn sum_circle_grid(
    image: &Array2<f32>,
    xs: &[f64],
    ys: &[f64],
    radii: &[f64],
    opts: &ApertureOptions<'_>,
) -> Result<ApertureGrid> {
    let n_obj = xs.len();
    let n_rad = radii.len();
    if ys.len() != n_obj {
        return Err(PhotometryError::ApertureShape(format!(
            "{} x positions, {} y positions",
            n_obj,
            ys.len()
        )));
    }

    let tiled_x: Vec<f64> = radii.iter().flat_map(|_| xs.iter().copied()).collect();
    let tiled_y: Vec<f64> = radii.iter().flat_map(|_| ys.iter().copied()).collect();
    let tiled_r: Vec<f64> = radii
        .iter()
        .flat_map(|&r| std::iter::repeat(r).take(n_obj))
        .collect();

    let sums = sum_circles(image, &tiled_x, &tiled_y, &tiled_r, opts)?;

    let mut grid = ApertureGrid {
        flux: Array2::zeros((n_rad, n_obj)),
        flux_err: Array2::zeros((n_rad, n_obj)),
        flags: Array2::zeros((n_rad, n_obj)),
    };
    for (i, s) in sums.iter().enumerate() {
        let idx = [i / n_obj.max(1), i % n_obj.max(1)];
        grid.flux[idx] = s.flux;
        grid.flux_err[idx] = s.flux_err;
        grid.flags[idx] = s.flag;
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_of_interior_and_exterior_pixels() {
        assert_eq!(pixel_overlap(0.0, 0.0, 3.0, 10), 1.0);
        assert_eq!(pixel_overlap(5.0, 5.0, 3.0, 10), 0.0);
        let edge = pixel_overlap(3.0, 0.0, 3.0, 10);
        assert!(edge > 0.4 && edge < 0.6);
    }
}
