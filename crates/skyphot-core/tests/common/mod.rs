#![allow(dead_code)]

use std::path::Path;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skyphot_core::frame::{Frame, FrameHeader};
use skyphot_core::io::fits::{image_hdu, write_fits, Hdu};

/// A point source: column, row, Gaussian sigma (px), peak amplitude (ADU).
#[derive(Clone, Copy, Debug)]
pub struct Star {
    pub x: f64,
    pub y: f64,
    pub sigma: f64,
    pub amplitude: f64,
}

impl Star {
    pub fn new(x: f64, y: f64, sigma: f64, amplitude: f64) -> Self {
        Self {
            x,
            y,
            sigma,
            amplitude,
        }
    }

    /// Integrated flux of the Gaussian profile.
    pub fn total_flux(&self) -> f64 {
        std::f64::consts::TAU * self.sigma * self.sigma * self.amplitude
    }
}

/// Render Gaussian stars on a flat sky, without noise.
pub fn render_stars(width: usize, height: usize, sky: f64, stars: &[Star]) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(row, col)| {
        let mut v = sky;
        for s in stars {
            let dx = col as f64 - s.x;
            let dy = row as f64 - s.y;
            v += s.amplitude * (-(dx * dx + dy * dy) / (2.0 * s.sigma * s.sigma)).exp();
        }
        v as f32
    })
}

/// Add uniform noise in `[-amplitude, amplitude)`; rms is `amplitude / sqrt(3)`.
pub fn add_uniform_noise(data: &mut Array2<f32>, amplitude: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    data.mapv_inplace(|v| v + rng.gen_range(-amplitude..amplitude) as f32);
}

/// Noisy star field on a sky of 100 ADU.
pub fn star_field(width: usize, height: usize, stars: &[Star], noise: f64, seed: u64) -> Array2<f32> {
    let mut data = render_stars(width, height, 100.0, stars);
    add_uniform_noise(&mut data, noise, seed);
    data
}

/// In-memory frame with a 30 s exposure starting at `jd`.
pub fn synthetic_frame(data: Array2<f32>, jd: f64) -> Frame {
    let mut header = FrameHeader::with_exposure(30.0);
    header.jd = jd;
    header.hjd = jd + 0.001;
    header.bjd = jd + 0.002;
    Frame::new(data, header)
}

/// Primary HDU carrying the header cards the reduction reads; no EXPOSURE
/// card when `exposure` is `None`.
pub fn frame_hdu(data: &Array2<f32>, exposure: Option<f64>, jd: f64, object: &str) -> Hdu {
    let mut hdu = image_hdu(data);
    if let Some(exposure) = exposure {
        hdu.insert("EXPOSURE", exposure);
    }
    hdu.insert("PREAMP", 2.0);
    hdu.insert("VBIN", 1);
    hdu.insert("AIRMASS", 1.2);
    hdu.insert("JD", jd);
    hdu.insert("OBJECT", object);
    hdu.insert("FILTERA", "V");
    hdu.insert("FILTERB", "Empty");
    hdu
}

/// Write a single-HDU FITS frame.
pub fn write_fits_frame(path: &Path, data: &Array2<f32>, exposure: f64, jd: f64, object: &str) {
    write_fits(path, frame_hdu(data, Some(exposure), jd, object), Vec::new()).unwrap();
}

/// Index of the catalog entry closest to `(x, y)`.
pub fn nearest(xs: &[f64], ys: &[f64], x: f64, y: f64) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, (&cx, &cy)) in xs.iter().zip(ys).enumerate() {
        let d = (cx - x).powi(2) + (cy - y).powi(2);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}
