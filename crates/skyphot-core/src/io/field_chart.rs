use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;
use ndarray::Array2;

use crate::error::Result;
use crate::stats::{nan_mean, nan_std};

pub const RING_RADIUS: i32 = 8;
pub const RING_COLOUR: Rgb<u8> = Rgb([255, 64, 64]);
pub const LABEL_COLOUR: Rgb<u8> = Rgb([255, 220, 64]);
const LABEL_SCALE: u32 = 1;

/// 5x7 bitmap digits, one row per byte, most significant of the low five
/// bits on the left.
fn digit_pattern(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        _ => return None,
    };
    Some(rows)
}

/// Draw `text` with its top-left corner at `(x, y)`; pixels off the image
/// are dropped.
fn draw_label(img: &mut RgbImage, x: i32, y: i32, text: &str, colour: Rgb<u8>, scale: u32) {
    let step = scale as i32;
    for (i, c) in text.chars().enumerate() {
        let Some(pattern) = digit_pattern(c) else {
            continue;
        };
        let left = x + i as i32 * 6 * step;
        for (row, bits) in pattern.iter().enumerate() {
            for col in 0..5 {
                if bits & (1 << (4 - col)) != 0 {
                    let rect = Rect::at(left + col * step, y + row as i32 * step).of_size(scale, scale);
                    draw_filled_rect_mut(img, rect, colour);
                }
            }
        }
    }
}

/// Save a stretched 8-bit PNG of `data` with a ring around each position,
/// labelled with its catalog index.
///
/// The stretch maps `[mean - 1 sigma, mean + 2 sigma]` onto the full grey range.
pub fn save_field_chart(data: &Array2<f32>, xs: &[f64], ys: &[f64], path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let values: Vec<f64> = data.iter().map(|&v| v as f64).collect();
    let mean = nan_mean(&values);
    let std = nan_std(&values, 0);
    let lo = mean - std;
    let span = (3.0 * std).max(f64::EPSILON);

    let mut img = RgbImage::new(w as u32, h as u32);
    for ((row, col), &v) in data.indexed_iter() {
        let level = if v.is_finite() {
            (((v as f64 - lo) / span).clamp(0.0, 1.0) * 255.0) as u8
        } else {
            0
        };
        img.put_pixel(col as u32, row as u32, Rgb([level; 3]));
    }

    for (index, (&x, &y)) in xs.iter().zip(ys).enumerate() {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let centre = (x.round() as i32, y.round() as i32);
        draw_hollow_circle_mut(&mut img, centre, RING_RADIUS, RING_COLOUR);
        draw_label(
            &mut img,
            centre.0 + RING_RADIUS + 2,
            centre.1 - RING_RADIUS,
            &index.to_string(),
            LABEL_COLOUR,
            LABEL_SCALE,
        );
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
