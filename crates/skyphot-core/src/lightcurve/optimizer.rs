//! Choose the (aperture radius, background setting) cell with the best
//! out-of-transit signal-to-noise.

use ndarray::{Array2, ArrayView3, Axis};
use tracing::debug;

use crate::stats::{nan_mean, nan_std};

/// Winning grid cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub radius_index: usize,
    pub setting_index: usize,
    pub snr: f64,
}

/// Signal (mean) over noise (sample standard deviation) of the masked frames
/// for every `(radius, setting)` cell of a `(radius, setting, frame)` grid.
///
/// Non-finite frames are ignored; a zero or non-finite noise gives NaN.
pub fn signal_to_noise(flux: ArrayView3<'_, f64>, norm_mask: &[bool]) -> Array2<f64> {
    let (n_rad, n_set, _) = flux.dim();
    let mut snr = Array2::from_elem((n_rad, n_set), f64::NAN);
    for ((r, s), out) in snr.indexed_iter_mut() {
        let lane = flux.slice(ndarray::s![r, s, ..]);
        let baseline: Vec<f64> = lane
            .iter()
            .zip(norm_mask)
            .filter(|&(_, &m)| m)
            .map(|(&v, _)| v)
            .collect();
        let signal = nan_mean(&baseline);
        let noise = nan_std(&baseline, 1);
        *out = if noise.is_finite() && noise > 0.0 {
            signal / noise
        } else {
            f64::NAN
        };
    }
    snr
}

/// First strict maximum in radius-major, setting-minor order.
fn argmax(snr: &Array2<f64>, settings: impl Fn(usize) -> bool) -> Option<Selection> {
    let mut best: Option<Selection> = None;
    for ((r, s), &v) in snr.indexed_iter() {
        if !v.is_finite() || !settings(s) {
            continue;
        }
        if best.map_or(true, |b| v > b.snr) {
            best = Some(Selection {
                radius_index: r,
                setting_index: s,
                snr: v,
            });
        }
    }
    best
}

/// Best cell over the whole grid. `None` when every cell is NaN.
pub fn select_best(flux: ArrayView3<'_, f64>, norm_mask: &[bool]) -> Option<Selection> {
    argmax(&signal_to_noise(flux, norm_mask), |_| true)
}

/// Best radius within one background setting.
pub fn select_best_in_setting(flux: ArrayView3<'_, f64>, norm_mask: &[bool], setting: usize) -> Option<Selection> {
    argmax(&signal_to_noise(flux, norm_mask), |s| s == setting)
}

/// Residual empty-sky flux per setting, summed over apertures and frames
/// with non-finite values ignored. `residual` is `[setting, empty aperture, frame]`.
pub fn residual_sums(residual: ArrayView3<'_, f64>) -> Vec<f64> {
    residual
        .axis_iter(Axis(0))
        .map(|s| s.iter().filter(|v| v.is_finite()).sum())
        .collect()
}

/// Setting with the smallest summed residual. Ties keep the first setting.
pub fn lowest_residual_setting(residual: ArrayView3<'_, f64>) -> Option<usize> {
    let sums = residual_sums(residual);
    debug!(?sums, "Residual background per setting");
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in sums.iter().enumerate() {
        if best.map_or(true, |(_, b)| v < b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}
