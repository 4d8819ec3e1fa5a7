use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An axis-aligned bounding box stored by its inclusive extremes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub const fn new(min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Smallest box containing every point, or `None` for an empty set.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bbox = Self::new(x0 as f32, x0 as f32, y0 as f32, y0 as f32);
        for (x, y) in iter {
            let (x, y) = (x as f32, y as f32);
            bbox.min_x = bbox.min_x.min(x);
            bbox.max_x = bbox.max_x.max(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_y = bbox.max_y.max(y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Point at fractional offsets from the horizontal centre and the top edge.
    ///
    /// `dx` is a fraction of the box width (negative is image-left), `fy` a
    /// fraction of the box height measured down from `min_y`.
    pub fn proportional_point(&self, dx: f32, fy: f32) -> Point {
        Point::new(
            self.center().x + dx * self.width(),
            self.min_y + fy * self.height(),
        )
    }
}

/// One RGBA camera frame handed over by the frame-acquisition side.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA bytes, four per pixel.
    pub pixels: Vec<u8>,
    /// Capture time relative to an arbitrary session epoch.
    pub timestamp: Duration,
}

impl Frame {
    pub const CHANNELS: usize = 4;

    pub fn new(width: u32, height: u32, pixels: Vec<u8>, timestamp: Duration) -> Self {
        Self {
            width,
            height,
            pixels,
            timestamp,
        }
    }

    /// Build a frame from a per-pixel RGBA generator.
    pub fn from_fn<F>(width: u32, height: u32, timestamp: Duration, f: F) -> Self
    where
        F: Fn(u32, u32) -> [u8; 4],
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * Self::CHANNELS);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, pixels, timestamp)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// A frame is usable when it has area and a full RGBA buffer.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() >= self.pixel_count() * Self::CHANNELS
    }
}

/// Which view of the subject a measurement pass captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStep {
    Front,
    Side,
}

impl std::fmt::Display for CaptureStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStep::Front => f.write_str("front"),
            CaptureStep::Side => f.write_str("side"),
        }
    }
}

impl std::str::FromStr for CaptureStep {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(CaptureStep::Front),
            "side" => Ok(CaptureStep::Side),
            other => Err(format!("unknown capture step: {other}")),
        }
    }
}
