use ndarray::{Array2, Zip};

use crate::consts::{BACKGROUND_CLIP_ITERATIONS, BACKGROUND_CLIP_SIGMA, PARALLEL_PIXEL_THRESHOLD};
use crate::stats::{median_in_place, nan_mean};

use super::BackgroundSetting;

/// Coarse per-box background and RMS values.
#[derive(Clone, Debug)]
pub struct BackgroundMesh {
    /// Per-box background level, shape = (boxes_y, boxes_x)
    pub back: Array2<f64>,
    /// Per-box clipped RMS, shape = (boxes_y, boxes_x)
    pub rms: Array2<f64>,
    centres_x: Vec<f64>,
    centres_y: Vec<f64>,
}

impl BackgroundMesh {
    pub fn build(data: &Array2<f32>, setting: &BackgroundSetting) -> Self {
        let (h, w) = data.dim();
        let bw = setting.box_width;
        let bh = setting.box_height;
        let nx = w.div_ceil(bw).max(1);
        let ny = h.div_ceil(bh).max(1);

        let mut back = Array2::<f64>::from_elem((ny, nx), f64::NAN);
        let mut rms = Array2::<f64>::from_elem((ny, nx), f64::NAN);
        let mut buffer = Vec::with_capacity(bw * bh);

        for by in 0..ny {
            let rows = by * bh..((by + 1) * bh).min(h);
            for bx in 0..nx {
                let cols = bx * bw..((bx + 1) * bw).min(w);
                let area = rows.len() * cols.len();

                buffer.clear();
                for row in rows.clone() {
                    for col in cols.clone() {
                        let v = data[[row, col]];
                        if v.is_finite() {
                            buffer.push(v as f64);
                        }
                    }
                }
                if area == 0 || buffer.len() * 2 < area {
                    continue;
                }
                let (mode, sigma) = clipped_mode(&mut buffer);
                back[[by, bx]] = mode;
                rms[[by, bx]] = sigma;
            }
        }

        fill_undefined(&mut back);
        fill_undefined(&mut rms);

        let back = median_filter(&back, setting.filter_height, setting.filter_width);
        let rms = median_filter(&rms, setting.filter_height, setting.filter_width);

        Self {
            back,
            rms,
            centres_x: box_centres(w, bw, nx),
            centres_y: box_centres(h, bh, ny),
        }
    }

    /// (global background, global RMS): medians over the mesh.
    pub fn global_stats(&self) -> (f64, f64) {
        let mut back: Vec<f64> = self.back.iter().copied().collect();
        let mut rms: Vec<f64> = self.rms.iter().copied().collect();
        (median_in_place(&mut back), median_in_place(&mut rms))
    }

    /// Bilinear interpolation of the mesh to full resolution.
    pub fn interpolate(&self, dim: (usize, usize)) -> Array2<f32> {
        let (h, w) = dim;
        let col_weights: Vec<(usize, usize, f64)> =
            (0..w).map(|x| bracket(&self.centres_x, x as f64)).collect();
        let row_weights: Vec<(usize, usize, f64)> =
            (0..h).map(|y| bracket(&self.centres_y, y as f64)).collect();

        let sample = |row: usize, col: usize| -> f32 {
            let (y0, y1, ty) = row_weights[row];
            let (x0, x1, tx) = col_weights[col];
            let top = self.back[[y0, x0]] * (1.0 - tx) + self.back[[y0, x1]] * tx;
            let bottom = self.back[[y1, x0]] * (1.0 - tx) + self.back[[y1, x1]] * tx;
            (top * (1.0 - ty) + bottom * ty) as f32
        };

        let mut result = Array2::<f32>::zeros((h, w));
        let zip = Zip::indexed(&mut result);
        if h * w >= PARALLEL_PIXEL_THRESHOLD {
            zip.par_for_each(|(row, col), v| *v = sample(row, col));
        } else {
            zip.for_each(|(row, col), v| *v = sample(row, col));
        }
        result
    }
}

/// Sigma-clipped mode estimate and RMS of one box.
fn clipped_mode(values: &mut Vec<f64>) -> (f64, f64) {
    let mut mean = 0.0;
    let mut sigma = 0.0;
    let mut median = 0.0;

    for _ in 0..BACKGROUND_CLIP_ITERATIONS {
        let n = values.len();
        if n == 0 {
            break;
        }
        mean = values.iter().sum::<f64>() / n as f64;
        sigma = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
        median = median_in_place(values);

        let lo = median - BACKGROUND_CLIP_SIGMA * sigma;
        let hi = median + BACKGROUND_CLIP_SIGMA * sigma;
        let before = values.len();
        values.retain(|&v| v >= lo && v <= hi);
        if values.len() == before || values.is_empty() {
            break;
        }
    }

    let mode = if sigma > 0.0 && ((mean - median) / sigma).abs() < 0.3 {
        2.5 * median - 1.5 * mean
    } else {
        median
    };
    (mode, sigma)
}

/// Replace NaN boxes with the mean of the defined ones (zero if none are).
fn fill_undefined(mesh: &mut Array2<f64>) {
    let values: Vec<f64> = mesh.iter().copied().collect();
    let fill = nan_mean(&values);
    let fill = if fill.is_finite() { fill } else { 0.0 };
    mesh.mapv_inplace(|v| if v.is_finite() { v } else { fill });
}

/// Median filter over an `fh x fw` window, clamped at the mesh edges.
fn median_filter(mesh: &Array2<f64>, fh: usize, fw: usize) -> Array2<f64> {
    if fh <= 1 && fw <= 1 {
        return mesh.clone();
    }
    let (ny, nx) = mesh.dim();
    let mut window = Vec::with_capacity(fh * fw);
    Array2::from_shape_fn((ny, nx), |(y, x)| {
        window.clear();
        for wy in 0..fh {
            let yy = (y + wy).saturating_sub(fh / 2).min(ny - 1);
            for wx in 0..fw {
                let xx = (x + wx).saturating_sub(fw / 2).min(nx - 1);
                window.push(mesh[[yy, xx]]);
            }
        }
        median_in_place(&mut window)
    })
}

fn box_centres(len: usize, size: usize, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let start = i * size;
            let end = ((i + 1) * size).min(len).max(start + 1);
            (start + end - 1) as f64 / 2.0
        })
        .collect()
}

/// Interpolation bracket (lower index, upper index, weight of upper) for `pos`.
fn bracket(centres: &[f64], pos: f64) -> (usize, usize, f64) {
    let last = centres.len() - 1;
    if pos <= centres[0] {
        return (0, 0, 0.0);
    }
    if pos >= centres[last] {
        return (last, last, 0.0);
    }
    let upper = centres.partition_point(|&c| c <= pos);
    let lower = upper - 1;
    let t = (pos - centres[lower]) / (centres[upper] - centres[lower]);
    (lower, upper, t)
}
