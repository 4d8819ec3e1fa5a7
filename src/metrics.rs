//! Body metrics from landmark geometry.
//!
//! Pixel distances between landmarks are converted to centimetres with a
//! ratio anchored on the shoulder width:
//!
//! ```text
//! pixel_to_cm = reference_shoulder / shoulder_px × scale_factor × (height / reference_height)
//! ```
//!
//! Lengths (shoulders, arm, inseam) follow directly. Circumferences come from
//! fixed anthropometric ratios:
//!
//! | Quantity | Base                   | Front multiplier         | Side multiplier                |
//! |----------|------------------------|--------------------------|--------------------------------|
//! | chest    | 2.5 × shoulders        | 0.95 + torso_ratio × 0.1 | 1.1 × (0.9 + torso_ratio × 0.2)|
//! | waist    | 0.85 × chest           | 0.95 + height_ratio × 0.05 | 0.9 + height_ratio × 0.1     |
//! | hips     | 0.95 × chest           | 0.95 + height_ratio × 0.05 | 0.9 + height_ratio × 0.1     |
//! | neck     | 0.25 × shoulders       | 0.9 + head_ratio × 0.2   | same                           |
//!
//! where `torso_ratio = torso_cm / height`, `height_ratio = height / 175` and
//! `head_ratio = head_cm / 25`.

use serde::Serialize;
use tracing::debug;

use crate::config::MeasurementConfig;
use crate::landmarks::{BodyLandmarks, LandmarkIndex};
use crate::types::CaptureStep;

/// Raw pixel distances between landmark pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelDistances {
    pub shoulder_width: f32,
    pub left_arm: f32,
    pub right_arm: f32,
    pub left_inseam: f32,
    pub right_inseam: f32,
    /// Vertical shoulder to hip distance.
    pub torso_height: f32,
    /// Vertical nose to shoulder distance.
    pub head_height: f32,
}

impl PixelDistances {
    pub fn from_landmarks(landmarks: &BodyLandmarks) -> Self {
        use LandmarkIndex::*;

        let p = |i: LandmarkIndex| landmarks[i].point();
        Self {
            shoulder_width: (landmarks[RightShoulder].x - landmarks[LeftShoulder].x).abs(),
            left_arm: p(LeftShoulder).distance(&p(LeftWrist)),
            right_arm: p(RightShoulder).distance(&p(RightWrist)),
            left_inseam: p(LeftHip).distance(&p(LeftAnkle)),
            right_inseam: p(RightHip).distance(&p(RightAnkle)),
            torso_height: (landmarks[LeftShoulder].y - landmarks[LeftHip].y).abs(),
            head_height: (landmarks[Nose].y - landmarks[LeftShoulder].y).abs(),
        }
    }
}

/// Unvalidated measurements in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMetrics {
    pub height: f32,
    pub chest: f32,
    pub waist: f32,
    pub hips: f32,
    pub shoulders: f32,
    pub inseam: f32,
    pub arm_length: f32,
    pub neck: f32,
    pub pixel_to_cm: f32,
    pub distances: PixelDistances,
}

#[derive(Debug, Clone)]
pub struct MeasurementCalculator {
    config: MeasurementConfig,
}

impl Default for MeasurementCalculator {
    fn default() -> Self {
        Self::new(MeasurementConfig::default())
    }
}

impl MeasurementCalculator {
    pub fn new(config: MeasurementConfig) -> Self {
        Self { config }
    }

    /// The user-supplied height, or the configured default.
    pub fn resolve_height(&self, height_cm: Option<f32>) -> f32 {
        match height_cm {
            Some(h) if h.is_finite() && h > 0.0 => h,
            _ => self.config.default_height_cm,
        }
    }

    pub fn pixel_to_cm(&self, shoulder_px: f32, height: f32, scale_factor: f32) -> Option<f32> {
        if !(shoulder_px.is_finite() && shoulder_px > 0.0) {
            return None;
        }
        let c = &self.config;
        Some(c.reference_shoulder_cm / shoulder_px * scale_factor * (height / c.reference_height_cm))
    }

    /// Metrics for one capture step.
    ///
    /// Returns `None` when the landmarks have no usable shoulder width.
    pub fn calculate(
        &self,
        landmarks: &BodyLandmarks,
        step: CaptureStep,
        height_cm: Option<f32>,
        scale_factor: f32,
    ) -> Option<BodyMetrics> {
        let c = &self.config;
        let height = self.resolve_height(height_cm);
        let distances = PixelDistances::from_landmarks(landmarks);
        let ratio = self.pixel_to_cm(distances.shoulder_width, height, scale_factor)?;

        let shoulders = distances.shoulder_width * ratio;
        let arm_length = (distances.left_arm + distances.right_arm) / 2.0 * ratio;
        let inseam = (distances.left_inseam + distances.right_inseam) / 2.0 * ratio;
        let torso = distances.torso_height * ratio;
        let head = distances.head_height * ratio;

        let torso_ratio = torso / height;
        let height_ratio = height / c.reference_height_cm;
        let head_ratio = head / c.reference_head_cm;

        let base_chest = shoulders * c.chest_to_shoulder;
        let (chest, lower_factor) = match step {
            CaptureStep::Front => (
                base_chest * (0.95 + torso_ratio * 0.1),
                0.95 + height_ratio * 0.05,
            ),
            CaptureStep::Side => (
                base_chest * c.side_depth_factor * (0.9 + torso_ratio * 0.2),
                0.9 + height_ratio * 0.1,
            ),
        };
        let waist = chest * c.waist_to_chest * lower_factor;
        let hips = chest * c.hips_to_chest * lower_factor;
        let neck = shoulders * c.neck_to_shoulder * (0.9 + head_ratio * 0.2);

        debug!(%step, pixel_to_cm = ratio, shoulders, chest, "metrics calculated");

        Some(BodyMetrics {
            height,
            chest,
            waist,
            hips,
            shoulders,
            inseam,
            arm_length,
            neck,
            pixel_to_cm: ratio,
            distances,
        })
    }
}
