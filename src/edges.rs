//! Binary edge map from a 3×3 Sobel gradient magnitude.
//!
//!   Gx = [-1 0 1; -2 0 2; -1 0 1]
//!   Gy = [-1 -2 -1; 0 0 0; 1 2 1]
//!
//! A pixel is an edge when `sqrt(Gx² + Gy²)` strictly exceeds the threshold.
//! The one-pixel border is never evaluated and stays 0.

use tracing::debug;

use crate::config::EdgeConfig;
use crate::image::ImageAccess;

pub const EDGE: u8 = 255;

/// Binary `width × height` map holding 0 or [`EDGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMap {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl EdgeMap {
    fn blank(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize],
            width,
            height,
        }
    }

    /// Build a map from an edge predicate, mostly useful for synthetic input.
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> bool,
    {
        let mut map = Self::blank(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    let i = map.index(x, y);
                    map.data[i] = EDGE;
                }
            }
        }
        map
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_edge(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.data[self.index(x, y)] == EDGE
    }

    pub fn edge_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == EDGE).count()
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[derive(Debug, Clone)]
pub struct EdgeDetector {
    threshold: f32,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(&EdgeConfig::default())
    }
}

impl EdgeDetector {
    pub fn new(config: &EdgeConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }

    pub fn detect<I: ImageAccess>(&self, image: &I) -> EdgeMap {
        let (w, h) = (image.width(), image.height());
        let mut map = EdgeMap::blank(w, h);
        if w < 3 || h < 3 {
            return map;
        }

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let (gx, gy) = sobel_at(image, x as i32, y as i32);
                let magnitude = ((gx * gx + gy * gy) as f32).sqrt();
                if magnitude > self.threshold {
                    let i = map.index(x, y);
                    map.data[i] = EDGE;
                }
            }
        }

        debug!(width = w, height = h, edges = map.edge_count(), "edge map computed");
        map
    }
}

#[inline]
fn sobel_at<I: ImageAccess>(image: &I, x: i32, y: i32) -> (i32, i32) {
    let p = |dx: i32, dy: i32| image.get_pixel(x + dx, y + dy) as i32;

    let gx = -p(-1, -1) + p(1, -1) - 2 * p(-1, 0) + 2 * p(1, 0) - p(-1, 1) + p(1, 1);
    let gy = -p(-1, -1) - 2 * p(0, -1) - p(1, -1) + p(-1, 1) + 2 * p(0, 1) + p(1, 1);
    (gx, gy)
}
