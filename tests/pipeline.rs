//! End-to-end checks of the detection and measurement pipeline on synthetic
//! frames.

use std::time::Duration;

use percent_body::{
    BodyDetector, BodyLandmarks, CalibrationSession, CaptureStep, Config, ContourTracer,
    EdgeDetector, Error, ErrorKind, Frame, GrayImage, Landmark, LandmarkIndex, Measurement,
    MeasurementSet, Quantity, ValidationEvent, Validator,
};
use proptest::prelude::*;

/// Dark silhouette (head, neck, body block) on a light background.
fn figure_frame(timestamp: Duration) -> Frame {
    Frame::from_fn(120, 240, timestamp, |x, y| {
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

fn checkerboard_frame(timestamp: Duration) -> Frame {
    Frame::from_fn(120, 240, timestamp, |x, y| {
        if (x + y) % 2 == 0 {
            [0, 0, 0, 255]
        } else {
            [200, 200, 200, 255]
        }
    })
}

#[test]
fn rectangle_yields_single_contour_with_matching_box() {
    // 100 wide, 200 tall; black rows 40..=160, columns 20..=80.
    let image = GrayImage::from_fn(100, 200, |x, y| {
        if (20..=80).contains(&x) && (40..=160).contains(&y) {
            0
        } else {
            255
        }
    });

    let edges = EdgeDetector::default().detect(&image);
    let contours = ContourTracer::default().trace(&edges).unwrap();
    assert_eq!(contours.len(), 1);

    let bbox = contours[0].bounding_box().unwrap();
    assert!((bbox.min_x - 20.0).abs() <= 2.0, "min_x {}", bbox.min_x);
    assert!((bbox.max_x - 80.0).abs() <= 2.0, "max_x {}", bbox.max_x);
    assert!((bbox.min_y - 40.0).abs() <= 2.0, "min_y {}", bbox.min_y);
    assert!((bbox.max_y - 160.0).abs() <= 2.0, "max_y {}", bbox.max_y);
}

#[test]
fn shoulder_reference_gives_forty_centimetres() {
    let mut landmarks = BodyLandmarks::from_fn(|i| Landmark::new(120.0, 20.0 * i as usize as f32, 0.9));
    landmarks[LandmarkIndex::LeftShoulder].x = 100.0;
    landmarks[LandmarkIndex::RightShoulder].x = 140.0;
    landmarks[LandmarkIndex::LeftShoulder].y = 60.0;
    landmarks[LandmarkIndex::RightShoulder].y = 60.0;

    let mut session = CalibrationSession::new(Config::default().calibration, 640, 480);
    let analysis = BodyDetector::default().analyze(&figure_frame(Duration::ZERO)).analysis;
    for i in 0..30 {
        session.observe(&analysis, &landmarks, Duration::from_millis(i * 33));
    }
    let calibration = session.finish().unwrap();
    assert_eq!(calibration.scale_factor, 1.0);

    let report = BodyDetector::default().estimate(
        &landmarks,
        CaptureStep::Front,
        Some(175.0),
        Some(&calibration),
    );
    assert_eq!(report.set.shoulders.value, 40.0);
    assert_eq!(report.set.height.value, 175.0);
}

#[test]
fn out_of_range_chest_is_corrected() {
    let raw = MeasurementSet::empty()
        .with(Quantity::Height, Measurement::new(175.0, 1.0))
        .with(Quantity::Chest, Measurement::new(200.0, 0.9));
    let report = Validator::default().correct(&raw, 175.0);

    assert_eq!(report.set.chest.value, 150.0);
    assert!(report.set.chest.confidence < 0.9);
    assert!(report.set.chest.confidence > 0.0);
    assert!(report.events.contains(&ValidationEvent::MeasurementOutOfRange {
        quantity: Quantity::Chest,
        raw: 200.0,
        corrected: 150.0,
    }));
}

#[test]
fn calibration_with_three_valid_samples_fails() {
    let detector = BodyDetector::default();
    let frames: Vec<_> = (0..30u64)
        .map(|i| {
            let ts = Duration::from_millis(i * 100);
            if i < 3 {
                figure_frame(ts)
            } else {
                checkerboard_frame(ts)
            }
        })
        .collect();

    let mut session = detector.calibration_session(120, 240);
    let accepted = frames
        .iter()
        .filter(|f| detector.observe(&mut session, f))
        .count();
    assert_eq!(accepted, 3);
    assert!(session.is_complete());

    let err = session.finish().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CalibrationFailure);
    assert!(matches!(
        err,
        Error::InsufficientCalibrationSamples { valid: 3, required: 5 }
    ));

    // The one-shot helper behaves the same.
    assert!(detector.calibrate(&frames).is_err());
}

#[test]
fn no_human_means_sentinel_landmarks() {
    let detection = BodyDetector::default().analyze(&checkerboard_frame(Duration::ZERO));

    assert!(!detection.analysis.has_human);
    assert_eq!(detection.analysis.error_reason, Some(ErrorKind::NoHumanDetected));
    assert!(detection.landmarks.is_sentinel());
}

#[test]
fn user_height_is_reported_as_given() {
    let detector = BodyDetector::default();
    let detection = detector.detect(&figure_frame(Duration::ZERO)).unwrap();

    for h in [172.5, 260.0] {
        let report = detector.estimate(&detection.landmarks, CaptureStep::Front, Some(h), None);
        assert_eq!(report.set.height, Measurement::new(h, 1.0));
        assert!(!report.events.iter().any(|e| matches!(
            e,
            ValidationEvent::MeasurementOutOfRange { quantity: Quantity::Height, .. }
        )));
    }
}

#[test]
fn measure_figure_front_and_side() {
    let detector = BodyDetector::default();
    let frame = figure_frame(Duration::ZERO);

    let front = detector.measure(&frame, CaptureStep::Front, Some(180.0), None).unwrap();
    let side = detector.measure(&frame, CaptureStep::Side, Some(180.0), None).unwrap();

    assert_eq!(front.set.height.value, 180.0);
    assert_eq!(front.set.height.confidence, 1.0);
    assert!(side.set.chest.value >= front.set.chest.value);

    let validator = Validator::default();
    for set in [&front.set, &side.set, &MeasurementSet::average(&front.set, &side.set)] {
        for (quantity, m) in set.iter() {
            if let Some(range) = validator.range(quantity) {
                assert!(range.contains(m.value), "{quantity} = {}", m.value);
            }
            assert!((0.0..=1.0).contains(&m.confidence), "{quantity} confidence {}", m.confidence);
        }
    }
}

#[test]
fn custom_config_changes_ranges() {
    let config = Config::from_toml(
        r#"
        [validation.chest]
        min = 70.0
        max = 120.0
        "#,
    )
    .unwrap();
    let validator = Validator::new(config.validation, config.landmarks);
    let raw = MeasurementSet::empty()
        .with(Quantity::Height, Measurement::new(175.0, 1.0))
        .with(Quantity::Chest, Measurement::new(130.0, 0.9));

    assert_eq!(validator.correct(&raw, 175.0).set.chest.value, 120.0);
}

#[test]
fn edge_and_contour_stages_are_deterministic() {
    let image = GrayImage::from_frame(&figure_frame(Duration::ZERO));
    let detector = EdgeDetector::default();
    let tracer = ContourTracer::default();

    let a = detector.detect(&image);
    let b = detector.detect(&image);
    assert_eq!(a.as_raw(), b.as_raw());
    assert_eq!(tracer.trace(&a).unwrap(), tracer.trace(&b).unwrap());
}

proptest! {
    #[test]
    fn validated_values_always_in_range(
        values in proptest::collection::vec(prop_oneof![
            -1.0e6f32..1.0e6f32,
            Just(f32::NAN),
            Just(f32::INFINITY),
            Just(f32::NEG_INFINITY),
        ], 8),
        confidences in proptest::collection::vec(0.0f32..=1.0, 8),
        height in 100.0f32..250.0,
    ) {
        let validator = Validator::default();
        let raw = Quantity::ALL.iter().enumerate().fold(MeasurementSet::empty(), |set, (i, &q)| {
            set.with(q, Measurement::new(values[i], confidences[i]))
        });
        let report = validator.correct(&raw, height);

        for (quantity, m) in report.set.iter() {
            match validator.range(quantity) {
                Some(range) => prop_assert!(range.contains(m.value)),
                None => prop_assert_eq!(m.value.to_bits(), raw.get(quantity).value.to_bits()),
            }
            prop_assert!((0.0..=1.0).contains(&m.confidence));
        }
    }

    #[test]
    fn frames_without_a_human_yield_sentinel_landmarks(
        (width, height, pixels) in (0u32..48, 0u32..48).prop_flat_map(|(w, h)| {
            (Just(w), Just(h), proptest::collection::vec(any::<u8>(), (w * h * 4) as usize))
        }),
    ) {
        let frame = Frame::new(width, height, pixels, Duration::ZERO);
        let detection = BodyDetector::default().analyze(&frame);

        if !detection.analysis.has_human {
            prop_assert!(detection.landmarks.is_sentinel());
            prop_assert!(detection.analysis.error_reason.is_some());
        }
    }

    #[test]
    fn landmark_confidence_is_bounded(
        min_x in 0.0f32..500.0,
        width in 1.0f32..500.0,
        min_y in 0.0f32..500.0,
        height in 1.0f32..1000.0,
        confidence in -1.0f32..2.0,
    ) {
        let body = percent_body::BoundingBox::new(min_x, min_x + width, min_y, min_y + height);
        let landmarks = percent_body::LandmarkExtractor::new().extract(&body, confidence);
        for (_, l) in landmarks.iter() {
            prop_assert!((0.0..=1.0).contains(&l.confidence));
        }
    }
}
