//! Frame to measurement pipeline.
//!
//! ```text
//! Frame -> GrayImage -> PresenceClassifier -> EdgeDetector -> ContourTracer
//!       -> LandmarkExtractor -> MeasurementCalculator -> Validator
//! ```
//!
//! Every intermediate buffer is created and dropped inside one call, so no
//! state carries over between frames. The only long-lived input is an
//! optional [`CalibrationResult`] that the caller passes in by reference.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calibration::{CalibrationResult, CalibrationSession};
use crate::config::{CalibrationConfig, Config};
use crate::contour::ContourTracer;
use crate::edges::EdgeDetector;
use crate::error::{Error, ErrorKind, Result};
use crate::image::{GrayImage, ImageStatistics};
use crate::landmarks::{BodyLandmarks, LandmarkExtractor, LandmarkIndex};
use crate::metrics::MeasurementCalculator;
use crate::presence::{BodyAnalysis, PresenceClassifier};
use crate::types::{CaptureStep, Frame};
use crate::validation::{MeasurementReport, MeasurementSet, ValidationEvent, Validator};

/// Outcome of one detection cycle.
///
/// `landmarks` is either fully populated or the all-zero sentinel; it is
/// always the sentinel when `analysis.has_human` is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub analysis: BodyAnalysis,
    pub landmarks: BodyLandmarks,
    pub stats: ImageStatistics,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub timestamp: Duration,
}

impl Detection {
    fn failed(frame: &Frame, analysis: BodyAnalysis, stats: ImageStatistics, error: &Error) -> Self {
        Self {
            analysis: analysis.with_error(error.kind()),
            landmarks: BodyLandmarks::sentinel(),
            stats,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
        }
    }

    pub fn is_success(&self) -> bool {
        self.analysis.error_reason.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct BodyDetector {
    edges: EdgeDetector,
    contours: ContourTracer,
    presence: PresenceClassifier,
    extractor: LandmarkExtractor,
    calculator: MeasurementCalculator,
    validator: Validator,
    calibration: CalibrationConfig,
    uncalibrated_confidence: f32,
}

impl Default for BodyDetector {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl BodyDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            edges: EdgeDetector::new(&config.edges),
            contours: ContourTracer::new(&config.contours),
            presence: PresenceClassifier::new(config.presence.clone()),
            extractor: LandmarkExtractor::new(),
            calculator: MeasurementCalculator::new(config.measurement.clone()),
            validator: Validator::new(config.validation.clone(), config.landmarks.clone()),
            calibration: config.calibration.clone(),
            uncalibrated_confidence: config.measurement.uncalibrated_confidence,
        }
    }

    /// Run detection, failing unless landmarks were placed.
    pub fn detect(&self, frame: &Frame) -> Result<Detection> {
        match self.process(frame) {
            (detection, None) => Ok(detection),
            (_, Some(err)) => Err(err),
        }
    }

    /// Run detection, reporting failures through `analysis.error_reason`
    /// with sentinel landmarks instead of an error.
    pub fn analyze(&self, frame: &Frame) -> Detection {
        self.process(frame).0
    }

    fn process(&self, frame: &Frame) -> (Detection, Option<Error>) {
        if !frame.is_valid() {
            let err = Error::NoFrame(format!(
                "{}x{} frame with {} bytes",
                frame.width,
                frame.height,
                frame.pixels.len()
            ));
            debug!(%err, "frame rejected");
            let analysis = BodyAnalysis::failed(ErrorKind::NoFrame);
            let detection = Detection::failed(frame, analysis, ImageStatistics::default(), &err);
            return (detection, Some(err));
        }

        let gray = GrayImage::from_frame(frame);
        let stats = gray.statistics();
        let analysis = self.presence.classify(&gray);
        if !analysis.has_human {
            let err = Error::NoHumanDetected {
                confidence: analysis.confidence,
            };
            return (Detection::failed(frame, analysis, stats, &err), Some(err));
        }

        let edges = self.edges.detect(&gray);
        let contour = match self.contours.trace(&edges) {
            Ok(contours) => contours.into_iter().next(),
            Err(err) => return (Detection::failed(frame, analysis, stats, &err), Some(err)),
        };
        let Some(contour) = contour else {
            let err = Error::InsufficientContour { largest: 0 };
            return (Detection::failed(frame, analysis, stats, &err), Some(err));
        };

        let landmarks = self.extractor.extract_from_contour(&contour, analysis.confidence);
        info!(
            confidence = analysis.confidence,
            contour = contour.len(),
            "human detected"
        );

        let detection = Detection {
            analysis,
            landmarks,
            stats,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
        };
        (detection, None)
    }

    /// Measurements for one capture step.
    ///
    /// Without a calibration the default scale factor is used and the
    /// calibration term of every confidence drops to the uncalibrated value.
    /// Landmarks without a usable shoulder width produce an empty set.
    pub fn estimate(
        &self,
        landmarks: &BodyLandmarks,
        step: CaptureStep,
        height_cm: Option<f32>,
        calibration: Option<&CalibrationResult>,
    ) -> MeasurementReport {
        let (scale, calibration_confidence) = match calibration {
            Some(c) => (c.scale_factor, c.confidence),
            None => (1.0, self.uncalibrated_confidence),
        };

        let Some(metrics) = self.calculator.calculate(landmarks, step, height_cm, scale) else {
            let valid = landmarks.valid_count(0.0);
            warn!(%step, valid, "landmarks unusable for measurement");
            return MeasurementReport {
                set: MeasurementSet::empty(),
                events: vec![ValidationEvent::LandmarkQuality {
                    valid,
                    total: LandmarkIndex::COUNT,
                }],
            };
        };

        let report = self.validator.validate(&metrics, landmarks, calibration_confidence);
        info!(
            %step,
            chest = report.set.chest.value,
            waist = report.set.waist.value,
            events = report.events.len(),
            "measurements estimated"
        );
        report
    }

    /// Detect and estimate in one call.
    pub fn measure(
        &self,
        frame: &Frame,
        step: CaptureStep,
        height_cm: Option<f32>,
        calibration: Option<&CalibrationResult>,
    ) -> Result<MeasurementReport> {
        let detection = self.detect(frame)?;
        Ok(self.estimate(&detection.landmarks, step, height_cm, calibration))
    }

    /// Start a caller-driven calibration pass for frames of the given size.
    pub fn calibration_session(&self, width: u32, height: u32) -> CalibrationSession {
        CalibrationSession::new(self.calibration.clone(), width, height)
    }

    /// Feed one frame into a calibration pass.
    pub fn observe(&self, session: &mut CalibrationSession, frame: &Frame) -> bool {
        let detection = self.analyze(frame);
        session.observe(&detection.analysis, &detection.landmarks, frame.timestamp)
    }

    /// Run a full calibration pass over `frames`, stopping once enough have
    /// been observed.
    pub fn calibrate<'a, I>(&self, frames: I) -> Result<CalibrationResult>
    where
        I: IntoIterator<Item = &'a Frame>,
    {
        let mut frames = frames.into_iter().peekable();
        let (w, h) = frames.peek().map(|f| (f.width, f.height)).unwrap_or((0, 0));
        let mut session = self.calibration_session(w, h);

        for frame in frames {
            if session.is_complete() {
                break;
            }
            self.observe(&mut session, frame);
        }
        session.finish()
    }
}
