use serde::Serialize;

use crate::types::Frame;

/// Trait for accessing pixel intensities from an image.
pub trait ImageAccess {
    /// Luminance at (x, y). Returns 0 for out-of-bounds pixels.
    fn get_pixel(&self, x: i32, y: i32) -> u8;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Single-channel luminance buffer, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { data, width, height }
    }

    /// Convert an RGBA frame with BT.601 weights, flooring the result.
    ///
    /// Alpha is ignored. The caller is expected to have checked
    /// [`Frame::is_valid`]; a short buffer yields black for missing pixels.
    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_fn(frame.width, frame.height, |x, y| {
            let i = (y as usize * frame.width as usize + x as usize) * Frame::CHANNELS;
            match frame.pixels.get(i..i + 3) {
                Some(&[r, g, b]) => luma(r, g, b),
                _ => 0,
            }
        })
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn statistics(&self) -> ImageStatistics {
        ImageStatistics::from_pixels(&self.data)
    }
}

impl ImageAccess for GrayImage {
    fn get_pixel(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).floor() as u8
}

/// Global luminance statistics, attached to detections as diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ImageStatistics {
    pub mean: f32,
    pub variance: f32,
    pub min: u8,
    pub max: u8,
    /// `max - min`
    pub contrast: u8,
    /// Same as `mean`.
    pub brightness: f32,
}

impl ImageStatistics {
    pub fn from_pixels(pixels: &[u8]) -> Self {
        if pixels.is_empty() {
            return Self::default();
        }

        let n = pixels.len() as f64;
        let mut sum = 0u64;
        let mut min = u8::MAX;
        let mut max = u8::MIN;
        for &p in pixels {
            sum += p as u64;
            min = min.min(p);
            max = max.max(p);
        }
        let mean = sum as f64 / n;
        let variance = pixels
            .iter()
            .map(|&p| {
                let d = p as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        Self {
            mean: mean as f32,
            variance: variance as f32,
            min,
            max,
            contrast: max - min,
            brightness: mean as f32,
        }
    }
}
