//! Synthetic images for tests. None of these hash to the zero sentinel.

use image::{ImageBuffer, Rgb, RgbImage};
use std::f32::consts::PI;
use std::path::Path;

/// Smooth 2D wave defined in normalised coordinates, so the same parameters at
/// different sizes give visually the same picture.
pub fn wave_image(width: u32, height: u32, frequency: f32, phase: f32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        let u = x as f32 / width as f32;
        let v = y as f32 / height as f32;
        let value = (2.0 * PI * frequency * u + phase).sin() * (2.0 * PI * v + phase).cos();
        let intensity = (128.0 + 100.0 * value) as u8;
        Rgb([intensity, intensity, intensity])
    })
}

/// Constant grey except for one horizontal eighth, which darkens left to right.
pub fn band_gradient_image(width: u32, height: u32, band: u32) -> RgbImage {
    let band_height = height / 8;
    ImageBuffer::from_fn(width, height, |x, y| {
        if y / band_height == band {
            let intensity = 200u32.saturating_sub(x * 3) as u8;
            Rgb([intensity, intensity, intensity])
        } else {
            Rgb([100, 100, 100])
        }
    })
}

pub fn write_wave(path: &Path, width: u32, height: u32, frequency: f32, phase: f32) {
    wave_image(width, height, frequency, phase)
        .save(path)
        .unwrap();
}
