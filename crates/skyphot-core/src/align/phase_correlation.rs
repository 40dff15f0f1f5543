use ndarray::{Array2, ArrayView1, Axis};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{PhotometryError, Result};
use crate::frame::RegistrationOffset;

use super::subpixel::refine_peak_paraboloid;
use super::Registration;

/// FFT phase-correlation registration with paraboloid sub-pixel refinement.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseCorrelation;

impl Registration for PhaseCorrelation {
    fn measure_offset(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
    ) -> Result<RegistrationOffset> {
        compute_offset(reference, target)
    }
}

/// Measure the drift of `target` relative to `reference`.
///
/// A frame compared with itself is exactly zero-offset.
pub fn compute_offset(reference: &Array2<f32>, target: &Array2<f32>) -> Result<RegistrationOffset> {
    let (h, w) = reference.dim();
    let (th, tw) = target.dim();
    if h != th || w != tw {
        return Err(PhotometryError::Registration(format!(
            "frame size mismatch: {}x{} vs {}x{}",
            w, h, tw, th
        )));
    }
    if h == 0 || w == 0 {
        return Err(PhotometryError::Registration("empty frame".into()));
    }
    if reference == target {
        return Ok(RegistrationOffset::default());
    }

    let mut planner = FftPlanner::new();
    let forward = (planner.plan_fft_forward(w), planner.plan_fft_forward(h));
    let inverse = (planner.plan_fft_inverse(w), planner.plan_fft_inverse(h));

    let ref_fft = fft2d(&apply_hann(reference), &forward);
    let tgt_fft = fft2d(&apply_hann(target), &forward);

    let mut cross = normalized_cross_power(&ref_fft, &tgt_fft);
    fft2d_in_place(&mut cross, &inverse);
    let scale = 1.0 / (h * w) as f64;
    let correlation = cross.mapv(|c| c.re * scale);

    let (peak_row, peak_col) = find_peak(&correlation);

    // Wrap-around: peaks past the midpoint are negative shifts.
    let dy = if peak_row > h / 2 {
        peak_row as f64 - h as f64
    } else {
        peak_row as f64
    };
    let dx = if peak_col > w / 2 {
        peak_col as f64 - w as f64
    } else {
        peak_col as f64
    };

    let (sub_dy, sub_dx) = refine_peak_paraboloid(&correlation, peak_row, peak_col);

    Ok(RegistrationOffset {
        dx: dx + sub_dx,
        dy: dy + sub_dy,
    })
}

type FftPair = (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>);

fn apply_hann(data: &Array2<f32>) -> Array2<f64> {
    let (h, w) = data.dim();
    let hann = |i: usize, n: usize| 0.5 * (1.0 - (std::f64::consts::TAU * i as f64 / n as f64).cos());
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / (h * w) as f64;

    Array2::from_shape_fn((h, w), |(row, col)| {
        (data[[row, col]] as f64 - mean) * hann(row, h) * hann(col, w)
    })
}

fn fft2d(data: &Array2<f64>, plans: &FftPair) -> Array2<Complex<f64>> {
    let mut result = data.mapv(|v| Complex::new(v, 0.0));
    fft2d_in_place(&mut result, plans);
    result
}

/// Row transforms followed by column transforms with the given (row, column) plans.
fn fft2d_in_place(data: &mut Array2<Complex<f64>>, plans: &FftPair) {
    let (row_plan, col_plan) = plans;
    for axis in [Axis(1), Axis(0)] {
        let plan = if axis == Axis(1) { row_plan } else { col_plan };
        for mut lane in data.lanes_mut(axis) {
            let mut buffer = lane.to_vec();
            plan.process(&mut buffer);
            lane.assign(&ArrayView1::from(&buffer));
        }
    }
}

fn normalized_cross_power(
    ref_fft: &Array2<Complex<f64>>,
    tgt_fft: &Array2<Complex<f64>>,
) -> Array2<Complex<f64>> {
    let mut result = Array2::<Complex<f64>>::zeros(ref_fft.dim());
    ndarray::Zip::from(&mut result)
        .and(ref_fft)
        .and(tgt_fft)
        .for_each(|out, &r, &t| {
            let cross = r * t.conj();
            let mag = cross.norm();
            *out = if mag > 1e-12 {
                cross / mag
            } else {
                Complex::new(0.0, 0.0)
            };
        });
    result
}

fn find_peak(data: &Array2<f64>) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_val = f64::NEG_INFINITY;
    for ((row, col), &v) in data.indexed_iter() {
        if v > best_val {
            best_val = v;
            best = (row, col);
        }
    }
    best
}
