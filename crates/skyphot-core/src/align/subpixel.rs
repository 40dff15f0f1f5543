use ndarray::Array2;

/// Refine a correlation peak by fitting a parabola through it and its two
/// neighbours along each axis.
///
/// The correlation surface is periodic, so neighbours wrap around the edges;
/// a peak at index 0 (small shifts) still gets refined.
///
/// Returns (delta_row, delta_col) as fractional pixel offsets from the integer peak.
pub fn refine_peak_paraboloid(
    correlation: &Array2<f64>,
    peak_row: usize,
    peak_col: usize,
) -> (f64, f64) {
    let (h, w) = correlation.dim();
    if h < 3 || w < 3 {
        return (0.0, 0.0);
    }

    let up = (peak_row + h - 1) % h;
    let down = (peak_row + 1) % h;
    let left = (peak_col + w - 1) % w;
    let right = (peak_col + 1) % w;

    let centre = correlation[[peak_row, peak_col]];
    let delta_row = parabola_vertex(
        correlation[[up, peak_col]],
        centre,
        correlation[[down, peak_col]],
    );
    let delta_col = parabola_vertex(
        correlation[[peak_row, left]],
        centre,
        correlation[[peak_row, right]],
    );

    (delta_row.clamp(-0.5, 0.5), delta_col.clamp(-0.5, 0.5))
}

fn parabola_vertex(prev: f64, curr: f64, next: f64) -> f64 {
    let curvature = prev - 2.0 * curr + next;
    if curvature.abs() > 1e-12 {
        (prev - next) / (2.0 * curvature)
    } else {
        0.0
    }
}
