//! Human-presence scoring from four independent shape heuristics.
//!
//! | Cue       | Band (fraction of height) | Weight |
//! |-----------|---------------------------|--------|
//! | head      | top 30%                   | 0.3    |
//! | shoulders | 20% to 40%                | 0.2    |
//! | torso     | 30% to 80%                | 0.3    |
//! | legs      | 60% to 100%               | 0.2    |
//!
//! The confidence is the sum of the passing weights, capped at 1.0. Dwell
//! time is not enforced here; see [`crate::session::CaptureSession`].

use std::collections::BTreeMap;
use std::f32::consts::PI;

use serde::Serialize;
use tracing::debug;

use crate::config::{PresenceConfig, Range};
use crate::error::ErrorKind;
use crate::image::ImageAccess;
use crate::types::Point;

/// Coarse label for how well the subject is being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl TrackingQuality {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence > 0.8 {
            TrackingQuality::Excellent
        } else if confidence > 0.6 {
            TrackingQuality::Good
        } else if confidence > 0.3 {
            TrackingQuality::Fair
        } else {
            TrackingQuality::Poor
        }
    }
}

/// Per-frame presence diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyAnalysis {
    pub has_human: bool,
    pub confidence: f32,
    pub quality: TrackingQuality,
    /// Sparse named points found by the heuristics (`head`, `shoulders`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<BTreeMap<&'static str, Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorKind>,
}

impl BodyAnalysis {
    /// Analysis for a frame that could not be scored at all.
    pub fn failed(reason: ErrorKind) -> Self {
        Self {
            has_human: false,
            confidence: 0.0,
            quality: TrackingQuality::Poor,
            keypoints: None,
            error_reason: Some(reason),
        }
    }

    pub fn with_error(mut self, reason: ErrorKind) -> Self {
        self.error_reason = Some(reason);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PresenceClassifier {
    config: PresenceConfig,
}

impl Default for PresenceClassifier {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}

impl PresenceClassifier {
    pub fn new(config: PresenceConfig) -> Self {
        Self { config }
    }

    pub fn classify<I: ImageAccess>(&self, image: &I) -> BodyAnalysis {
        let c = &self.config;
        let h = image.height() as f32;
        let mut score = 0.0;
        let mut keypoints = BTreeMap::new();

        let head = self.find_head(image);
        if let Some(center) = head {
            score += c.head_weight;
            keypoints.insert("head", center);
        }

        let shoulders = self.find_shoulder_line(image);
        if let Some(y) = shoulders {
            score += c.shoulder_weight;
            keypoints.insert("shoulders", Point::new(image.width() as f32 / 2.0, y as f32));
        }

        let torso = self.vertical_strength(image, c.torso_band.min * h, c.torso_band.max * h);
        if torso > c.torso_threshold {
            score += c.torso_weight;
        }

        let legs = self.vertical_strength(image, c.leg_band.min * h, c.leg_band.max * h);
        if legs > c.leg_threshold {
            score += c.leg_weight;
        }

        let confidence = f32::min(score, 1.0);
        let has_human = confidence > c.detection_threshold;
        debug!(
            head = head.is_some(),
            shoulders = shoulders.is_some(),
            torso,
            legs,
            confidence,
            has_human,
            "presence scored"
        );

        BodyAnalysis {
            has_human,
            confidence,
            quality: TrackingQuality::from_confidence(confidence),
            keypoints: (!keypoints.is_empty()).then_some(keypoints),
            error_reason: None,
        }
    }

    /// First candidate centre whose ring of probes mostly differs from it.
    fn find_head<I: ImageAccess>(&self, image: &I) -> Option<Point> {
        let c = &self.config;
        let (w, h) = (image.width(), image.height());
        let end_y = (h as f32 * c.head_band_end).floor() as u32;
        let step = c.head_grid_step.max(1);

        for y in (0..end_y).step_by(step) {
            for x in (c.head_margin..w.saturating_sub(c.head_margin)).step_by(step) {
                let center = image.get_pixel(x as i32, y as i32);
                let differing = (0..c.head_probes)
                    .filter(|&k| {
                        let angle = 2.0 * PI * k as f32 / c.head_probes as f32;
                        let px = (x as f32 + c.head_radius * angle.cos()).floor() as i32;
                        let py = (y as f32 + c.head_radius * angle.sin()).floor() as i32;
                        if px < 0 || py < 0 || px >= w as i32 || py >= h as i32 {
                            return false;
                        }
                        center.abs_diff(image.get_pixel(px, py)) > c.head_luma_diff
                    })
                    .count();

                if differing * 2 > c.head_probes {
                    return Some(Point::new(x as f32, y as f32));
                }
            }
        }
        None
    }

    /// First row in the shoulder band dominated by near-equal neighbours.
    fn find_shoulder_line<I: ImageAccess>(&self, image: &I) -> Option<u32> {
        let c = &self.config;
        let (w, h) = (image.width(), image.height());
        if w < 2 {
            return None;
        }
        let Range { min, max } = c.shoulder_band;
        let start = (h as f32 * min).floor() as u32;
        let end = (h as f32 * max).floor() as u32;
        let pairs = (w - 1) as f32;

        (start..end.min(h)).step_by(c.shoulder_row_step.max(1)).find(|&y| {
            let flat = (0..w - 1)
                .filter(|&x| {
                    let a = image.get_pixel(x as i32, y as i32);
                    let b = image.get_pixel(x as i32 + 1, y as i32);
                    a.abs_diff(b) < c.shoulder_luma_diff
                })
                .count();
            flat as f32 > c.shoulder_ratio * pairs
        })
    }

    /// Mean fraction of near-equal vertical pairs over the sampled columns.
    fn vertical_strength<I: ImageAccess>(&self, image: &I, start_y: f32, end_y: f32) -> f32 {
        let c = &self.config;
        let w = image.width() as f32;
        let start = start_y.floor() as i32;
        let end = end_y.floor() as i32;
        let span = end - start;
        if span <= 0 {
            return 0.0;
        }

        let col_start = (w * c.column_band.min).floor() as u32;
        let col_end = (w * c.column_band.max).floor() as u32;
        let mut total = 0.0;
        let mut columns = 0;

        for x in (col_start..col_end).step_by(c.column_step.max(1)) {
            let steady = (start..end - 1)
                .filter(|&y| {
                    let a = image.get_pixel(x as i32, y);
                    let b = image.get_pixel(x as i32, y + 1);
                    a.abs_diff(b) < c.vertical_luma_diff
                })
                .count();
            total += steady as f32 / span as f32;
            columns += 1;
        }

        if columns == 0 {
            0.0
        } else {
            total / columns as f32
        }
    }
}
