use ndarray::{Array3, ArrayView3, ArrayView4, Axis, Zip};

use crate::error::{PhotometryError, Result};
use crate::stats::nan_median;

/// Target-versus-ensemble series, each of shape `(radius, setting, frame)`.
#[derive(Clone, Debug)]
pub struct DifferentialLightCurve {
    /// Relative flux normalized to a unit out-of-transit median.
    pub flux: Array3<f64>,
    pub flux_err: Array3<f64>,
    /// Relative flux before normalization.
    pub ratio: Array3<f64>,
    pub target_flux: Array3<f64>,
    /// Inverse-variance weighted comparison flux and its error.
    pub comparison_flux: Array3<f64>,
    pub comparison_err: Array3<f64>,
}

fn missing_if_zero(v: f64) -> f64 {
    if v == 0.0 {
        f64::NAN
    } else {
        v
    }
}

/// Inverse-variance weighted mean of `(flux, err)` pairs; pairs with a
/// non-finite value or a non-positive error are skipped.
pub fn weighted_mean(pairs: impl IntoIterator<Item = (f64, f64)>) -> (f64, f64) {
    let mut sum_w = 0.0;
    let mut sum_wf = 0.0;
    for (f, e) in pairs {
        let (f, e) = (missing_if_zero(f), missing_if_zero(e));
        if !(f.is_finite() && e.is_finite()) {
            continue;
        }
        let w = 1.0 / (e * e);
        sum_w += w;
        sum_wf += w * f;
    }
    if sum_w > 0.0 && sum_w.is_finite() {
        (sum_wf / sum_w, (1.0 / sum_w).sqrt())
    } else {
        (f64::NAN, f64::NAN)
    }
}

fn check_selection(n_objects: usize, n_frames: usize, target: usize, comparisons: &[usize], norm_mask: &[bool]) -> Result<()> {
    if target >= n_objects {
        return Err(PhotometryError::InvalidSelection(format!(
            "target {target} is not in the catalog of {n_objects} stars"
        )));
    }
    if comparisons.is_empty() {
        return Err(PhotometryError::InvalidSelection("no comparison stars given".into()));
    }
    if let Some(&c) = comparisons.iter().find(|&&c| c >= n_objects || c == target) {
        return Err(PhotometryError::InvalidSelection(format!(
            "comparison {c} is out of range or equal to the target"
        )));
    }
    for (i, &c) in comparisons.iter().enumerate() {
        if comparisons[..i].contains(&c) {
            return Err(PhotometryError::InvalidSelection(format!("comparison {c} is listed twice")));
        }
    }
    if norm_mask.len() != n_frames {
        return Err(PhotometryError::InvalidSelection(format!(
            "normalization mask covers {} frames, grid has {n_frames}",
            norm_mask.len()
        )));
    }
    Ok(())
}

/// Divide each `(radius, setting)` series by its median over the masked frames.
///
/// A zero or non-finite median makes the whole series NaN.
pub fn normalize_series(flux: ArrayView3<'_, f64>, flux_err: ArrayView3<'_, f64>, norm_mask: &[bool]) -> (Array3<f64>, Array3<f64>) {
    let mut out_flux = flux.mapv(missing_if_zero);
    let mut out_err = flux_err.mapv(missing_if_zero);
    Zip::from(out_flux.lanes_mut(Axis(2)))
        .and(out_err.lanes_mut(Axis(2)))
        .for_each(|mut f, mut e| {
            let baseline: Vec<f64> = f
                .iter()
                .zip(norm_mask)
                .filter(|&(_, &m)| m)
                .map(|(&v, _)| v)
                .collect();
            let median = nan_median(&baseline);
            let scale = if median.is_finite() && median != 0.0 {
                median
            } else {
                f64::NAN
            };
            f.mapv_inplace(|v| v / scale);
            e.mapv_inplace(|v| v / scale);
        });
    (out_flux, out_err)
}

/// Differential photometry of `target` against the inverse-variance weighted
/// ensemble of `comparisons`.
///
/// `flux` and `flux_err` are `[radius, object, setting, frame]` grids; zeros
/// count as missing. `norm_mask` selects the frames defining the baseline.
pub fn differential_photometry(
    flux: ArrayView4<'_, f64>,
    flux_err: ArrayView4<'_, f64>,
    target: usize,
    comparisons: &[usize],
    norm_mask: &[bool],
) -> Result<DifferentialLightCurve> {
    let (n_rad, n_obj, n_set, n_frames) = flux.dim();
    if flux_err.dim() != flux.dim() {
        return Err(PhotometryError::GridShapeMismatch {
            array: "OBJ_FLUX_ERR",
            expected: flux.shape().to_vec(),
            actual: flux_err.shape().to_vec(),
        });
    }
    check_selection(n_obj, n_frames, target, comparisons, norm_mask)?;

    let shape = (n_rad, n_set, n_frames);
    let target_flux = flux.index_axis(Axis(1), target).mapv(missing_if_zero);
    let target_err = flux_err.index_axis(Axis(1), target).mapv(missing_if_zero);

    let mut comparison_flux = Array3::from_elem(shape, f64::NAN);
    let mut comparison_err = Array3::from_elem(shape, f64::NAN);
    Zip::indexed(&mut comparison_flux)
        .and(&mut comparison_err)
        .for_each(|(r, s, f), cf, ce| {
            let (mean, err) = weighted_mean(
                comparisons
                    .iter()
                    .map(|&c| (flux[[r, c, s, f]], flux_err[[r, c, s, f]])),
            );
            *cf = mean;
            *ce = err;
        });

    let ratio = &target_flux / &comparison_flux;
    let mut ratio_err = Array3::from_elem(shape, f64::NAN);
    Zip::from(&mut ratio_err)
        .and(&ratio)
        .and(&target_flux)
        .and(&target_err)
        .and(&comparison_flux)
        .and(&comparison_err)
        .for_each(|out, &q, &t, &te, &c, &ce| {
            *out = q * ((te / t).powi(2) + (ce / c).powi(2)).sqrt();
        });

    let (flux_norm, err_norm) = normalize_series(ratio.view(), ratio_err.view(), norm_mask);

    Ok(DifferentialLightCurve {
        flux: flux_norm,
        flux_err: err_norm,
        ratio,
        target_flux,
        comparison_flux,
        comparison_err,
    })
}
