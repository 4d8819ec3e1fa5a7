//! Capture state machine driven by an injected clock.
//!
//! ```text
//! Idle -> Scanning -> TimedOut
//!                  -> Tracking(front) -> Tracking(side) -> Complete
//! ```
//!
//! `Scanning` runs detection on every [`CaptureSession::tick`] until a human
//! has been seen continuously for the dwell time, or the scan times out.
//! Each tracking state runs the measurement pipeline once. Every transition
//! takes `&mut self`, so at most one cycle is ever in flight.

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationResult;
use crate::config::{CaptureConfig, Config};
use crate::error::{Error, ErrorKind, Result};
use crate::pipeline::{BodyDetector, Detection};
use crate::presence::BodyAnalysis;
use crate::types::{CaptureStep, Frame};
use crate::validation::{MeasurementSet, ValidationEvent};

/// Monotonic time source for the capture loop.
pub trait FrameClock {
    fn now(&self) -> Duration;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock advanced by hand, for replaying recorded frames and for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum CaptureState {
    Idle,
    Scanning,
    /// The scan gave up; carries the last recoverable failure seen.
    TimedOut(Option<ErrorKind>),
    Tracking(CaptureStep),
    Complete,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => f.write_str("idle"),
            CaptureState::Scanning => f.write_str("scanning"),
            CaptureState::TimedOut(_) => f.write_str("timed out"),
            CaptureState::Tracking(step) => write!(f, "tracking {step}"),
            CaptureState::Complete => f.write_str("complete"),
        }
    }
}

/// What a single scanning tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not scanning; the frame was ignored.
    Ignored,
    /// Frame not newer than the last processed one.
    Dropped,
    NoFrame,
    /// No usable human in this frame; the dwell timer was reset.
    Searching(BodyAnalysis),
    /// Human present but not yet for the full dwell time.
    Dwelling { held: Duration },
    /// Dwell satisfied; the session moved to `Tracking(Front)`.
    Detected(Box<Detection>),
    TimedOut(Option<ErrorKind>),
}

pub struct CaptureSession<C: FrameClock = SystemClock> {
    detector: BodyDetector,
    clock: C,
    config: CaptureConfig,
    state: CaptureState,
    height_cm: Option<f32>,
    calibration: Option<CalibrationResult>,

    scan_started: Duration,
    dwell_started: Option<Duration>,
    last_frame: Option<Duration>,
    last_error: Option<ErrorKind>,

    front: Option<MeasurementSet>,
    side: Option<MeasurementSet>,
    events: Vec<ValidationEvent>,
}

impl CaptureSession<SystemClock> {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: FrameClock> CaptureSession<C> {
    pub fn with_clock(config: &Config, clock: C) -> Self {
        Self {
            detector: BodyDetector::new(config),
            clock,
            config: config.capture.clone(),
            state: CaptureState::Idle,
            height_cm: None,
            calibration: None,
            scan_started: Duration::ZERO,
            dwell_started: None,
            last_frame: None,
            last_error: None,
            front: None,
            side: None,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn detector(&self) -> &BodyDetector {
        &self.detector
    }

    pub fn set_height(&mut self, height_cm: Option<f32>) {
        self.height_cm = height_cm;
    }

    /// Replace the active calibration wholesale.
    pub fn publish_calibration(&mut self, result: CalibrationResult) {
        info!(scale_factor = result.scale_factor, "calibration published");
        self.calibration = Some(result);
    }

    pub fn calibration(&self) -> Option<&CalibrationResult> {
        self.calibration.as_ref()
    }

    /// Begin scanning. Only valid from idle, timed out or complete.
    pub fn start_scan(&mut self) -> Result<()> {
        match self.state {
            CaptureState::Idle | CaptureState::TimedOut(_) | CaptureState::Complete => {}
            other => return Err(Error::InvalidState(other.to_string())),
        }
        self.clear_cycle();
        self.scan_started = self.clock.now();
        self.state = CaptureState::Scanning;
        debug!("scan started");
        Ok(())
    }

    pub fn tick(&mut self, frame: Option<Frame>) -> TickOutcome {
        if self.state != CaptureState::Scanning {
            return TickOutcome::Ignored;
        }
        let now = self.clock.now();

        let outcome = match frame {
            None => {
                self.last_error = Some(ErrorKind::NoFrame);
                self.dwell_started = None;
                TickOutcome::NoFrame
            }
            Some(frame) if self.is_stale(&frame) => TickOutcome::Dropped,
            Some(frame) => {
                self.last_frame = Some(frame.timestamp);
                let detection = self.detector.analyze(&frame);
                if detection.is_success() {
                    let since = *self.dwell_started.get_or_insert(now);
                    let held = now.saturating_sub(since);
                    if held >= self.config.dwell {
                        info!(held_ms = held.as_millis() as u64, "human detected, tracking front");
                        self.state = CaptureState::Tracking(CaptureStep::Front);
                        return TickOutcome::Detected(Box::new(detection));
                    }
                    TickOutcome::Dwelling { held }
                } else {
                    self.last_error = detection.analysis.error_reason;
                    self.dwell_started = None;
                    TickOutcome::Searching(detection.analysis)
                }
            }
        };

        if now.saturating_sub(self.scan_started) >= self.config.scan_timeout {
            warn!(last_error = ?self.last_error, "scan timed out");
            self.state = CaptureState::TimedOut(self.last_error);
            return TickOutcome::TimedOut(self.last_error);
        }
        outcome
    }

    fn is_stale(&self, frame: &Frame) -> bool {
        matches!(self.last_frame, Some(last) if frame.timestamp <= last)
    }

    /// Measure the current tracking step from `frame` and advance.
    ///
    /// A failed detection leaves the state unchanged so the caller can retry
    /// with the next frame.
    pub fn capture(&mut self, frame: Frame) -> Result<&MeasurementSet> {
        let step = match self.state {
            CaptureState::Tracking(step) => step,
            other => return Err(Error::InvalidState(other.to_string())),
        };
        if self.is_stale(&frame) {
            return Err(Error::NoFrame("frame is not newer than the last one".into()));
        }
        self.last_frame = Some(frame.timestamp);

        let detection = self.detector.detect(&frame)?;
        let report = self.detector.estimate(
            &detection.landmarks,
            step,
            self.height_cm,
            self.calibration.as_ref(),
        );
        self.events.extend(report.events);

        let slot = match step {
            CaptureStep::Front => {
                self.state = CaptureState::Tracking(CaptureStep::Side);
                &mut self.front
            }
            CaptureStep::Side => {
                self.state = CaptureState::Complete;
                &mut self.side
            }
        };
        debug!(%step, next = %self.state, "step captured");
        Ok(slot.insert(report.set))
    }

    /// Back to idle, discarding everything but the calibration.
    pub fn reset(&mut self) {
        self.clear_cycle();
        self.state = CaptureState::Idle;
        debug!("capture reset");
    }

    fn clear_cycle(&mut self) {
        self.dwell_started = None;
        self.last_frame = None;
        self.last_error = None;
        self.front = None;
        self.side = None;
        self.events.clear();
    }

    /// Front and side sets once the capture is complete.
    pub fn measurements(&self) -> Option<(&MeasurementSet, &MeasurementSet)> {
        match (self.state, &self.front, &self.side) {
            (CaptureState::Complete, Some(front), Some(side)) => Some((front, side)),
            _ => None,
        }
    }

    pub fn averaged(&self) -> Option<MeasurementSet> {
        self.measurements()
            .map(|(front, side)| MeasurementSet::average(front, side))
    }

    /// Validation events collected since the scan started.
    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CaptureSession<ManualClock> {
        CaptureSession::with_clock(&Config::default(), ManualClock::new())
    }

    fn blank(ms: u64) -> Frame {
        Frame::from_fn(40, 40, Duration::from_millis(ms), |x, y| {
            if (x + y) % 2 == 0 {
                [0, 0, 0, 255]
            } else {
                [200, 200, 200, 255]
            }
        })
    }

    #[test]
    fn ticks_are_ignored_when_idle() {
        let mut s = session();
        assert_eq!(s.tick(None), TickOutcome::Ignored);
        assert_eq!(s.state(), CaptureState::Idle);
    }

    #[test]
    fn scan_times_out_with_last_error() {
        let mut s = session();
        s.start_scan().unwrap();

        for i in 1..15 {
            s.clock().advance(Duration::from_secs(1));
            assert!(matches!(s.tick(Some(blank(i * 1000))), TickOutcome::Searching(_)));
        }
        s.clock().advance(Duration::from_secs(1));
        let outcome = s.tick(None);

        assert_eq!(outcome, TickOutcome::TimedOut(Some(ErrorKind::NoFrame)));
        assert_eq!(s.state(), CaptureState::TimedOut(Some(ErrorKind::NoFrame)));
        assert!(s.start_scan().is_ok());
    }

    #[test]
    fn stale_frames_are_dropped() {
        let mut s = session();
        s.start_scan().unwrap();
        s.tick(Some(blank(100)));
        assert_eq!(s.tick(Some(blank(100))), TickOutcome::Dropped);
        assert_eq!(s.tick(Some(blank(50))), TickOutcome::Dropped);
    }

    #[test]
    fn capture_requires_tracking() {
        let mut s = session();
        assert!(matches!(s.capture(blank(0)), Err(Error::InvalidState(_))));
        s.start_scan().unwrap();
        assert!(s.start_scan().is_err());
    }

    #[test]
    fn reset_keeps_calibration() {
        let mut s = session();
        s.publish_calibration(CalibrationResult {
            scale_factor: 1.0,
            confidence: 0.9,
            pose_stability: 1.0,
            avg_pose_confidence: 0.8,
            camera_params: crate::calibration::CameraParams::estimate(640, 480),
            sample_count: 30,
        });
        s.start_scan().unwrap();
        s.reset();

        assert_eq!(s.state(), CaptureState::Idle);
        assert!(s.calibration().is_some());
        assert!(s.measurements().is_none());
    }

    #[test]
    fn state_serializes_tagged() {
        let json = serde_json::to_value(CaptureState::Tracking(CaptureStep::Side)).unwrap();
        assert_eq!(json["state"], "tracking");
        assert_eq!(json["detail"], "side");
    }
}
