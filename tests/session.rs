//! Capture state machine driven by a manual clock.

use std::time::Duration;

use percent_body::{
    CaptureSession, CaptureState, CaptureStep, Config, ErrorKind, Frame, ManualClock,
    TickOutcome,
};

fn figure(ms: u64) -> Frame {
    Frame::from_fn(120, 240, Duration::from_millis(ms), |x, y| {
        let (dx, dy) = (x as f32 - 60.0, y as f32 - 30.0);
        let head = dx * dx + dy * dy <= 100.0;
        let neck = (56..64).contains(&x) && (38..48).contains(&y);
        let body = (30..90).contains(&x) && (48..236).contains(&y);
        if head || neck || body {
            [40, 40, 40, 255]
        } else {
            [220, 220, 220, 255]
        }
    })
}

fn session() -> CaptureSession<ManualClock> {
    let mut s = CaptureSession::with_clock(&Config::default(), ManualClock::new());
    s.set_height(Some(175.0));
    s
}

/// Tick once per second with a figure until detection; returns ticks used.
fn scan_until_detected(s: &mut CaptureSession<ManualClock>, start_ms: u64) -> u64 {
    for i in 0..15 {
        let outcome = s.tick(Some(figure(start_ms + i * 1000)));
        if let TickOutcome::Detected(_) = outcome {
            return i;
        }
        s.clock().advance(Duration::from_secs(1));
    }
    panic!("figure was never detected");
}

#[test]
fn full_capture_flow() {
    let mut s = session();
    s.start_scan().unwrap();

    // Dwell starts on the first detection and is satisfied two seconds later.
    let ticks = scan_until_detected(&mut s, 0);
    assert_eq!(ticks, 2);
    assert_eq!(s.state(), CaptureState::Tracking(CaptureStep::Front));

    let front = *s.capture(figure(10_000)).unwrap();
    assert_eq!(s.state(), CaptureState::Tracking(CaptureStep::Side));
    let side = *s.capture(figure(11_000)).unwrap();
    assert_eq!(s.state(), CaptureState::Complete);

    let (f, sd) = s.measurements().unwrap();
    assert_eq!(*f, front);
    assert_eq!(*sd, side);

    let avg = s.averaged().unwrap();
    assert_eq!(avg.height.value, 175.0);
    assert!((avg.chest.value - (front.chest.value + side.chest.value) / 2.0).abs() < 1e-4);
}

#[test]
fn missing_frame_resets_dwell() {
    let mut s = session();
    s.start_scan().unwrap();

    assert!(matches!(s.tick(Some(figure(0))), TickOutcome::Dwelling { .. }));
    s.clock().advance(Duration::from_secs(1));
    assert_eq!(s.tick(None), TickOutcome::NoFrame);
    s.clock().advance(Duration::from_secs(1));

    // Dwell restarts here, so this tick is not yet a detection.
    match s.tick(Some(figure(2000))) {
        TickOutcome::Dwelling { held } => assert_eq!(held, Duration::ZERO),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(s.state(), CaptureState::Scanning);
}

#[test]
fn timeout_reports_last_recoverable_error() {
    let mut s = session();
    s.start_scan().unwrap();

    let mut last = TickOutcome::Ignored;
    for _ in 0..=15 {
        last = s.tick(None);
        if matches!(last, TickOutcome::TimedOut(_)) {
            break;
        }
        s.clock().advance(Duration::from_secs(1));
    }
    assert_eq!(last, TickOutcome::TimedOut(Some(ErrorKind::NoFrame)));
    assert_eq!(s.state(), CaptureState::TimedOut(Some(ErrorKind::NoFrame)));
    assert_eq!(s.tick(Some(figure(0))), TickOutcome::Ignored);
}

#[test]
fn reset_discards_partial_results() {
    let mut s = session();
    s.start_scan().unwrap();
    scan_until_detected(&mut s, 0);
    s.capture(figure(10_000)).unwrap();

    s.reset();
    assert_eq!(s.state(), CaptureState::Idle);
    assert!(s.measurements().is_none());
    assert!(s.averaged().is_none());
    assert!(s.events().is_empty());
}

#[test]
fn failed_capture_keeps_step() {
    let mut s = session();
    s.start_scan().unwrap();
    scan_until_detected(&mut s, 0);

    let blank = Frame::from_fn(120, 240, Duration::from_millis(9_000), |_, _| [255, 255, 255, 255]);
    let err = s.capture(blank).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(s.state(), CaptureState::Tracking(CaptureStep::Front));

    assert!(s.capture(figure(10_000)).is_ok());
}

#[test]
fn published_calibration_feeds_measurements() {
    let mut s = session();
    let frames: Vec<_> = (0..30).map(|i| figure(i * 100)).collect();
    let calibration = s.detector().calibrate(&frames).unwrap();
    s.publish_calibration(calibration);

    s.start_scan().unwrap();
    scan_until_detected(&mut s, 5_000);
    let front = *s.capture(figure(20_000)).unwrap();

    assert_eq!(s.calibration(), Some(&calibration));
    assert!(front.shoulders.confidence > 0.0);
}
