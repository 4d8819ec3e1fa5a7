//! Multi-frame calibration pass.
//!
//! A [`CalibrationSession`] collects up to `sample_count` observations. Frames
//! where a human was detected with enough confidence and landmarks were placed
//! become [`CalibrationSample`]s; [`CalibrationSession::finish`] turns them
//! into a [`CalibrationResult`] or fails without publishing anything.
//! Dropping the session between samples cancels the pass; only `finish`
//! can produce a result.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CalibrationConfig;
use crate::error::{Error, Result};
use crate::landmarks::{BodyLandmarks, LandmarkIndex};
use crate::presence::BodyAnalysis;
use crate::types::Point;

/// Discrete posture bucket used to measure pose consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseClass {
    Standing,
    Leaning,
    Unknown,
}

impl PoseClass {
    /// Level shoulders read as standing, tilted ones as leaning.
    pub fn classify(landmarks: &BodyLandmarks, level_tolerance: f32) -> Self {
        let ls = landmarks[LandmarkIndex::LeftShoulder];
        let rs = landmarks[LandmarkIndex::RightShoulder];
        if !ls.is_present() || !rs.is_present() {
            return PoseClass::Unknown;
        }

        let width = (rs.x - ls.x).abs();
        if (ls.y - rs.y).abs() < level_tolerance * width {
            PoseClass::Standing
        } else {
            PoseClass::Leaning
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSample {
    pub timestamp: Duration,
    pub landmarks: BodyLandmarks,
    pub confidence: f32,
    pub pose: PoseClass,
}

impl CalibrationSample {
    pub fn new(timestamp: Duration, landmarks: BodyLandmarks, level_tolerance: f32) -> Self {
        Self {
            timestamp,
            confidence: sample_confidence(&landmarks),
            pose: PoseClass::classify(&landmarks, level_tolerance),
            landmarks,
        }
    }
}

/// Mean confidence of the anchor landmarks, with a bonus when the shoulders
/// and hips are all present.
fn sample_confidence(landmarks: &BodyLandmarks) -> f32 {
    use LandmarkIndex::*;

    let mut confidence =
        landmarks.mean_confidence(&[Nose, LeftShoulder, RightShoulder, LeftHip, RightHip, LeftAnkle, RightAnkle]);
    let frame_complete = [LeftShoulder, RightShoulder, LeftHip, RightHip]
        .iter()
        .all(|&i| landmarks[i].is_present());
    if frame_complete {
        confidence += 0.2;
    }
    confidence.min(1.0)
}

/// Pinhole estimate derived from the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraParams {
    pub focal_length: f32,
    pub principal_point: Point,
    pub distortion: [f32; 5],
}

impl CameraParams {
    pub fn estimate(width: u32, height: u32) -> Self {
        Self {
            focal_length: 0.7 * width as f32,
            principal_point: Point::new(width as f32 / 2.0, height as f32 / 2.0),
            distortion: [0.0; 5],
        }
    }
}

/// Published outcome of a successful calibration pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationResult {
    pub scale_factor: f32,
    pub confidence: f32,
    pub pose_stability: f32,
    pub avg_pose_confidence: f32,
    pub camera_params: CameraParams,
    pub sample_count: usize,
}

#[derive(Debug)]
pub struct CalibrationSession {
    config: CalibrationConfig,
    frame_size: (u32, u32),
    samples: Vec<CalibrationSample>,
    observed: usize,
}

impl CalibrationSession {
    pub fn new(config: CalibrationConfig, frame_width: u32, frame_height: u32) -> Self {
        Self {
            samples: Vec::with_capacity(config.sample_count),
            config,
            frame_size: (frame_width, frame_height),
            observed: 0,
        }
    }

    /// Record one detection. Returns whether it was kept as a sample.
    ///
    /// Observations past `sample_count` are ignored.
    pub fn observe(&mut self, analysis: &BodyAnalysis, landmarks: &BodyLandmarks, timestamp: Duration) -> bool {
        if self.is_complete() {
            return false;
        }
        self.observed += 1;

        let accepted = analysis.has_human
            && analysis.confidence > self.config.min_sample_confidence
            && !landmarks.is_sentinel();
        if accepted {
            self.samples
                .push(CalibrationSample::new(timestamp, *landmarks, self.config.level_tolerance));
        }
        debug!(
            observed = self.observed,
            accepted,
            samples = self.samples.len(),
            "calibration frame"
        );
        accepted
    }

    pub fn is_complete(&self) -> bool {
        self.observed >= self.config.sample_count
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }

    pub fn finish(self) -> Result<CalibrationResult> {
        let c = &self.config;
        let n = self.samples.len();
        if n < c.min_samples {
            warn!(valid = n, required = c.min_samples, "calibration failed: too few samples");
            return Err(Error::InsufficientCalibrationSamples {
                valid: n,
                required: c.min_samples,
            });
        }

        let pose_stability = pose_stability(&self.samples);
        let avg_pose_confidence = self.samples.iter().map(|s| s.confidence).sum::<f32>() / n as f32;
        let confidence = (avg_pose_confidence + pose_stability) / 2.0;

        if confidence <= c.min_confidence {
            warn!(confidence, required = c.min_confidence, "calibration failed: low confidence");
            return Err(Error::LowCalibrationConfidence {
                confidence,
                required: c.min_confidence,
            });
        }

        let (w, h) = self.frame_size;
        let result = CalibrationResult {
            scale_factor: c.scale_range.clamp(pose_stability),
            confidence,
            pose_stability,
            avg_pose_confidence,
            camera_params: CameraParams::estimate(w, h),
            sample_count: n,
        };
        info!(
            samples = n,
            scale_factor = result.scale_factor,
            confidence,
            "calibration complete"
        );
        Ok(result)
    }
}

/// One minus the normalised count of distinct pose classes; zero below two samples.
fn pose_stability(samples: &[CalibrationSample]) -> f32 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let distinct = samples.iter().map(|s| s.pose).collect::<HashSet<_>>().len();
    let spread = (distinct - 1) as f32 / (n - 1).max(1) as f32;
    (1.0 - spread).clamp(0.0, 1.0)
}
