//! Per-measurement confidence and range validation.
//!
//! Confidence weights per quantity (landmark group, bilateral symmetry,
//! calibration):
//!
//! | Quantity  | Landmarks                  | Symmetry | Calibration |
//! |-----------|----------------------------|----------|-------------|
//! | height    | fixed 1.0                  |          |             |
//! | chest     | 0.7 shoulders              |          | 0.3         |
//! | waist     | 0.6 shoulders              |          | 0.4         |
//! | hips      | 0.7 hips                   |          | 0.3         |
//! | shoulders | 0.8 shoulders              |          | 0.2         |
//! | inseam    | 0.6 knees and ankles       | 0.2      | 0.2         |
//! | armLength | 0.6 elbows and wrists      | 0.2      | 0.2         |
//! | neck      | 0.7 nose                   |          | 0.3         |
//!
//! Values outside their configured range are rescaled by
//! `height / optimal_height.midpoint()`, clamped into range, and their
//! confidence is multiplied by the out-of-range penalty. Nothing is dropped.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::config::{LandmarkConfig, Range, ValidationConfig};
use crate::error::ErrorKind;
use crate::landmarks::{BodyLandmarks, LandmarkIndex};
use crate::metrics::BodyMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Quantity {
    Height,
    Chest,
    Waist,
    Hips,
    Shoulders,
    Inseam,
    ArmLength,
    Neck,
}

impl Quantity {
    pub const ALL: [Quantity; 8] = [
        Quantity::Height,
        Quantity::Chest,
        Quantity::Waist,
        Quantity::Hips,
        Quantity::Shoulders,
        Quantity::Inseam,
        Quantity::ArmLength,
        Quantity::Neck,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Quantity::Height => "height",
            Quantity::Chest => "chest",
            Quantity::Waist => "waist",
            Quantity::Hips => "hips",
            Quantity::Shoulders => "shoulders",
            Quantity::Inseam => "inseam",
            Quantity::ArmLength => "armLength",
            Quantity::Neck => "neck",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value in centimetres with its confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Measurement {
    pub value: f32,
    pub confidence: f32,
}

impl Measurement {
    pub fn new(value: f32, confidence: f32) -> Self {
        Self { value, confidence }
    }

    /// Value in inches, to one decimal place.
    pub fn inches(&self) -> f32 {
        (self.value / 2.54 * 10.0).round() / 10.0
    }
}

/// One measurement per quantity for a single capture step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementSet {
    pub height: Measurement,
    pub chest: Measurement,
    pub waist: Measurement,
    pub hips: Measurement,
    pub shoulders: Measurement,
    pub inseam: Measurement,
    pub arm_length: Measurement,
    pub neck: Measurement,
}

impl MeasurementSet {
    /// Zero values, zero confidence.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn get(&self, quantity: Quantity) -> Measurement {
        match quantity {
            Quantity::Height => self.height,
            Quantity::Chest => self.chest,
            Quantity::Waist => self.waist,
            Quantity::Hips => self.hips,
            Quantity::Shoulders => self.shoulders,
            Quantity::Inseam => self.inseam,
            Quantity::ArmLength => self.arm_length,
            Quantity::Neck => self.neck,
        }
    }

    fn get_mut(&mut self, quantity: Quantity) -> &mut Measurement {
        match quantity {
            Quantity::Height => &mut self.height,
            Quantity::Chest => &mut self.chest,
            Quantity::Waist => &mut self.waist,
            Quantity::Hips => &mut self.hips,
            Quantity::Shoulders => &mut self.shoulders,
            Quantity::Inseam => &mut self.inseam,
            Quantity::ArmLength => &mut self.arm_length,
            Quantity::Neck => &mut self.neck,
        }
    }

    pub fn with(mut self, quantity: Quantity, measurement: Measurement) -> Self {
        *self.get_mut(quantity) = measurement;
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Quantity, Measurement)> + '_ {
        Quantity::ALL.iter().map(move |&q| (q, self.get(q)))
    }

    /// Element-wise mean of two sets. Neither input is modified.
    pub fn average(a: &MeasurementSet, b: &MeasurementSet) -> MeasurementSet {
        Quantity::ALL.iter().fold(MeasurementSet::empty(), |set, &q| {
            let (x, y) = (a.get(q), b.get(q));
            set.with(
                q,
                Measurement::new((x.value + y.value) / 2.0, (x.confidence + y.confidence) / 2.0),
            )
        })
    }
}

/// Non-fatal condition reported alongside a measurement set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ValidationEvent {
    /// A value fell outside its range and was corrected.
    MeasurementOutOfRange {
        quantity: Quantity,
        raw: f32,
        corrected: f32,
    },
    /// Too few usable landmarks; confidences were scaled down.
    LandmarkQuality { valid: usize, total: usize },
}

impl ValidationEvent {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationEvent::MeasurementOutOfRange { .. } => ErrorKind::MeasurementOutOfRange,
            ValidationEvent::LandmarkQuality { .. } => ErrorKind::LandmarkQuality,
        }
    }
}

/// A validated set and everything that happened while producing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementReport {
    pub set: MeasurementSet,
    pub events: Vec<ValidationEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    ranges: ValidationConfig,
    landmarks: LandmarkConfig,
}

impl Validator {
    pub fn new(ranges: ValidationConfig, landmarks: LandmarkConfig) -> Self {
        Self { ranges, landmarks }
    }

    /// Accepted band for `quantity`. Height is user-supplied and has none.
    pub fn range(&self, quantity: Quantity) -> Option<Range> {
        let r = &self.ranges;
        let range = match quantity {
            Quantity::Height => return None,
            Quantity::Chest => r.chest,
            Quantity::Waist => r.waist,
            Quantity::Hips => r.hips,
            Quantity::Shoulders => r.shoulders,
            Quantity::Inseam => r.inseam,
            Quantity::ArmLength => r.arm_length,
            Quantity::Neck => r.neck,
        };
        Some(range)
    }

    /// Score, downgrade for landmark quality, then range-correct.
    pub fn validate(
        &self,
        metrics: &BodyMetrics,
        landmarks: &BodyLandmarks,
        calibration_confidence: f32,
    ) -> MeasurementReport {
        let mut events = Vec::new();
        let mut set = self.score(metrics, landmarks, calibration_confidence);

        let valid = landmarks.valid_count(self.landmarks.valid_confidence);
        if valid < self.landmarks.min_valid {
            let ratio = valid as f32 / LandmarkIndex::COUNT as f32;
            warn!(valid, total = LandmarkIndex::COUNT, "landmark quality below minimum");
            for q in Quantity::ALL.iter().filter(|&&q| q != Quantity::Height) {
                set.get_mut(*q).confidence *= ratio;
            }
            events.push(ValidationEvent::LandmarkQuality {
                valid,
                total: LandmarkIndex::COUNT,
            });
        }

        let corrected = self.correct(&set, metrics.height);
        events.extend(corrected.events);
        MeasurementReport {
            set: corrected.set,
            events,
        }
    }

    /// Attach confidences to raw metric values.
    pub fn score(&self, m: &BodyMetrics, landmarks: &BodyLandmarks, calibration: f32) -> MeasurementSet {
        use LandmarkIndex::*;

        let shoulder = landmarks.mean_confidence(&[LeftShoulder, RightShoulder]);
        let arm = landmarks.mean_confidence(&[LeftElbow, RightElbow, LeftWrist, RightWrist]);
        let hip = landmarks.mean_confidence(&[LeftHip, RightHip]);
        let leg = landmarks.mean_confidence(&[LeftKnee, RightKnee, LeftAnkle, RightAnkle]);
        let head = landmarks[Nose].confidence;

        let d = &m.distances;
        let arm_symmetry = consistency(d.left_arm, d.right_arm);
        let leg_symmetry = consistency(d.left_inseam, d.right_inseam);

        let c = |v: f32| v.clamp(0.0, 1.0);
        MeasurementSet {
            height: Measurement::new(m.height, 1.0),
            chest: Measurement::new(m.chest, c(0.7 * shoulder + 0.3 * calibration)),
            waist: Measurement::new(m.waist, c(0.6 * shoulder + 0.4 * calibration)),
            hips: Measurement::new(m.hips, c(0.7 * hip + 0.3 * calibration)),
            shoulders: Measurement::new(m.shoulders, c(0.8 * shoulder + 0.2 * calibration)),
            inseam: Measurement::new(
                m.inseam,
                c(0.6 * leg + 0.2 * leg_symmetry + 0.2 * calibration),
            ),
            arm_length: Measurement::new(
                m.arm_length,
                c(0.6 * arm + 0.2 * arm_symmetry + 0.2 * calibration),
            ),
            neck: Measurement::new(m.neck, c(0.7 * head + 0.3 * calibration)),
        }
    }

    /// Clamp every derived value into its range and round to whole
    /// centimetres. Height passes through untouched at full confidence.
    pub fn correct(&self, raw: &MeasurementSet, height: f32) -> MeasurementReport {
        let penalty = self.ranges.out_of_range_penalty;
        let avg_height = self.ranges.optimal_height.midpoint();
        let mut set = *raw;
        let mut events = Vec::new();

        set.height.confidence = 1.0;
        for q in Quantity::ALL {
            let Some(range) = self.range(q) else {
                continue;
            };
            let m = set.get_mut(q);
            let raw_value = m.value;

            if !(raw_value.is_finite() && range.contains(raw_value)) {
                let corrected = if raw_value.is_finite() {
                    range.clamp(raw_value * height / avg_height)
                } else {
                    range.min
                };
                warn!(
                    quantity = q.name(),
                    raw = raw_value,
                    corrected,
                    "measurement out of range"
                );
                events.push(ValidationEvent::MeasurementOutOfRange {
                    quantity: q,
                    raw: raw_value,
                    corrected,
                });
                m.value = corrected;
                m.confidence *= penalty;
            }

            m.value = range.clamp(m.value.round());
            m.confidence = m.confidence.clamp(0.0, 1.0);
        }

        MeasurementReport { set, events }
    }
}

/// `1 - |l - r| / max(l, r)`, zero when both sides are empty.
fn consistency(left: f32, right: f32) -> f32 {
    let max = left.max(right);
    if max.is_nan() || max <= 0.0 {
        return 0.0;
    }
    (1.0 - (left - right).abs() / max).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;
    use crate::metrics::PixelDistances;

    fn in_range() -> MeasurementSet {
        MeasurementSet {
            height: Measurement::new(175.0, 1.0),
            chest: Measurement::new(100.0, 0.8),
            waist: Measurement::new(85.0, 0.8),
            hips: Measurement::new(95.0, 0.8),
            shoulders: Measurement::new(40.0, 0.8),
            inseam: Measurement::new(80.0, 0.8),
            arm_length: Measurement::new(60.0, 0.8),
            neck: Measurement::new(38.0, 0.8),
        }
    }

    fn metrics(distances: PixelDistances) -> BodyMetrics {
        BodyMetrics {
            height: 175.0,
            chest: 100.0,
            waist: 85.0,
            hips: 95.0,
            shoulders: 40.0,
            inseam: 80.0,
            arm_length: 60.0,
            neck: 38.0,
            pixel_to_cm: 0.5,
            distances,
        }
    }

    #[test]
    fn out_of_range_chest_is_clamped_not_dropped() {
        let raw = in_range().with(Quantity::Chest, Measurement::new(200.0, 0.8));
        let report = Validator::default().correct(&raw, 175.0);

        assert_eq!(report.set.chest.value, 150.0);
        assert!((report.set.chest.confidence - 0.4).abs() < 1e-6);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].kind(), ErrorKind::MeasurementOutOfRange);
        assert_eq!(report.set.waist, raw.waist);
    }

    #[test]
    fn correction_rescales_by_height() {
        // 24 * 175 / 170 = 24.7, still below the neck range.
        let raw = in_range().with(Quantity::Neck, Measurement::new(24.0, 0.8));
        let report = Validator::default().correct(&raw, 175.0);
        assert_eq!(report.set.neck.value, 25.0);

        let raw = in_range().with(Quantity::Shoulders, Measurement::new(72.0, 0.8));
        let report = Validator::default().correct(&raw, 150.0);
        // 72 * 150 / 170 = 63.5 -> 64 after rounding
        assert_eq!(report.set.shoulders.value, 64.0);
    }

    #[test]
    fn user_height_is_never_corrected() {
        for h in [95.0, 172.5, 260.0] {
            let raw = in_range().with(Quantity::Height, Measurement::new(h, 0.3));
            let report = Validator::default().correct(&raw, h);
            assert_eq!(report.set.height, Measurement::new(h, 1.0));
            assert!(report.events.is_empty(), "height {h} raised {:?}", report.events);
        }
        assert!(Validator::default().range(Quantity::Height).is_none());
    }

    #[test]
    fn non_finite_values_go_to_minimum() {
        let raw = in_range()
            .with(Quantity::Hips, Measurement::new(f32::NAN, 0.8))
            .with(Quantity::Inseam, Measurement::new(f32::INFINITY, 0.8));
        let report = Validator::default().correct(&raw, 175.0);
        assert_eq!(report.set.hips.value, 60.0);
        assert_eq!(report.set.inseam.value, 60.0);
        assert_eq!(report.events.len(), 2);
    }

    #[test]
    fn in_range_values_are_rounded_only() {
        let raw = in_range().with(Quantity::Chest, Measurement::new(101.6, 0.8));
        let report = Validator::default().correct(&raw, 175.0);
        assert_eq!(report.set.chest.value, 102.0);
        assert_eq!(report.set.chest.confidence, 0.8);
        assert!(report.events.is_empty());
    }

    #[test]
    fn confidence_weights() {
        let lm = BodyLandmarks::from_fn(|_| Landmark::new(1.0, 1.0, 0.9));
        let d = PixelDistances {
            left_arm: 100.0,
            right_arm: 80.0,
            left_inseam: 50.0,
            right_inseam: 50.0,
            ..PixelDistances::default()
        };
        let set = Validator::default().score(&metrics(d), &lm, 0.5);

        assert_eq!(set.height.confidence, 1.0);
        assert!((set.chest.confidence - (0.63 + 0.15)).abs() < 1e-5);
        assert!((set.waist.confidence - (0.54 + 0.2)).abs() < 1e-5);
        assert!((set.shoulders.confidence - (0.72 + 0.1)).abs() < 1e-5);
        // Arms: symmetry 1 - 20/100 = 0.8.
        assert!((set.arm_length.confidence - (0.54 + 0.16 + 0.1)).abs() < 1e-5);
        assert!((set.inseam.confidence - (0.54 + 0.2 + 0.1)).abs() < 1e-5);
        assert!((set.neck.confidence - (0.63 + 0.15)).abs() < 1e-5);
    }

    #[test]
    fn poor_landmarks_downgrade_confidence() {
        let mut lm = BodyLandmarks::from_fn(|_| Landmark::new(1.0, 1.0, 0.1));
        for i in [LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder] {
            lm[i].confidence = 0.9;
        }
        let validator = Validator::default();
        let full = validator.score(&metrics(PixelDistances::default()), &lm, 0.5);
        let report = validator.validate(&metrics(PixelDistances::default()), &lm, 0.5);

        assert!(report
            .events
            .contains(&ValidationEvent::LandmarkQuality { valid: 2, total: 13 }));
        let ratio = 2.0 / 13.0;
        assert!((report.set.shoulders.confidence - full.shoulders.confidence * ratio).abs() < 1e-5);
        assert_eq!(report.set.height.confidence, 1.0);
    }

    #[test]
    fn consistency_guard() {
        assert_eq!(consistency(0.0, 0.0), 0.0);
        assert!((consistency(50.0, 40.0) - 0.8).abs() < 1e-6);
        assert_eq!(consistency(30.0, 30.0), 1.0);
    }

    #[test]
    fn average_does_not_mutate_inputs() {
        let a = in_range();
        let b = in_range().with(Quantity::Chest, Measurement::new(110.0, 0.6));
        let avg = MeasurementSet::average(&a, &b);

        assert_eq!(avg.chest.value, 105.0);
        assert!((avg.chest.confidence - 0.7).abs() < 1e-6);
        assert_eq!(a.chest.value, 100.0);
        assert_eq!(b.chest.value, 110.0);
    }

    #[test]
    fn inches_to_one_decimal() {
        assert_eq!(Measurement::new(100.0, 1.0).inches(), 39.4);
        assert_eq!(Measurement::new(2.54, 1.0).inches(), 1.0);
    }

    #[test]
    fn serializes_with_external_names() {
        let json = serde_json::to_value(in_range()).unwrap();
        assert_eq!(json["armLength"]["value"], 60.0);

        let event = ValidationEvent::MeasurementOutOfRange {
            quantity: Quantity::ArmLength,
            raw: 90.0,
            corrected: 80.0,
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["event"], "measurementOutOfRange");
        assert_eq!(json["quantity"], "armLength");
    }
}
