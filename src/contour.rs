//! Connected-component extraction over an [`EdgeMap`].
//!
//! Pixels are scanned in raster order. Each unvisited edge pixel seeds an
//! iterative 8-connected flood fill driven by an explicit stack, so memory is
//! bounded by the component size rather than the call stack.

use tracing::debug;

use crate::config::ContourConfig;
use crate::edges::EdgeMap;
use crate::error::{Error, Result};
use crate::types::BoundingBox;

const NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// One connected edge component, in visit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<(u32, u32)>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points.iter().copied())
    }
}

#[derive(Debug, Clone)]
pub struct ContourTracer {
    min_points: usize,
    keep: usize,
}

impl Default for ContourTracer {
    fn default() -> Self {
        Self::new(&ContourConfig::default())
    }
}

impl ContourTracer {
    pub fn new(config: &ContourConfig) -> Self {
        Self {
            min_points: config.min_points,
            keep: config.keep,
        }
    }

    /// Largest qualifying components, biggest first.
    ///
    /// Components with fewer than `min_points` points are discarded; if none
    /// survive, returns [`Error::InsufficientContour`] carrying the size of
    /// the largest component seen.
    pub fn trace(&self, edges: &EdgeMap) -> Result<Vec<Contour>> {
        let (w, h) = (edges.width(), edges.height());
        let mut visited = vec![false; w as usize * h as usize];
        let mut stack = Vec::new();
        let mut contours = Vec::new();
        let mut largest = 0;

        for y in 0..h {
            for x in 0..w {
                let seed = y as usize * w as usize + x as usize;
                if visited[seed] || !edges.is_edge(x, y) {
                    continue;
                }

                visited[seed] = true;
                stack.push((x, y));
                let mut points = Vec::new();

                while let Some((cx, cy)) = stack.pop() {
                    points.push((cx, cy));
                    for (dx, dy) in NEIGHBORS {
                        let nx = cx as i32 + dx;
                        let ny = cy as i32 + dy;
                        if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                            continue;
                        }
                        let (nx, ny) = (nx as u32, ny as u32);
                        let i = ny as usize * w as usize + nx as usize;
                        if !visited[i] && edges.is_edge(nx, ny) {
                            visited[i] = true;
                            stack.push((nx, ny));
                        }
                    }
                }

                largest = largest.max(points.len());
                if points.len() >= self.min_points {
                    contours.push(Contour { points });
                }
            }
        }

        let found = contours.len();
        contours.sort_by(|a, b| b.len().cmp(&a.len()));
        contours.truncate(self.keep);
        debug!(found, kept = contours.len(), largest, "contours traced");

        if contours.is_empty() {
            return Err(Error::InsufficientContour { largest });
        }
        Ok(contours)
    }
}
