use std::ops::{Index, IndexMut};

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::contour::Contour;
use crate::types::{BoundingBox, Point};

/// The 13 skeletal points placed on a detected body.
///
/// `Left*` points sit on the image-left side of the body centre line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftShoulder = 1,
    RightShoulder = 2,
    LeftElbow = 3,
    RightElbow = 4,
    LeftWrist = 5,
    RightWrist = 6,
    LeftHip = 7,
    RightHip = 8,
    LeftKnee = 9,
    RightKnee = 10,
    LeftAnkle = 11,
    RightAnkle = 12,
}

impl LandmarkIndex {
    pub const COUNT: usize = 13;

    pub const ALL: [LandmarkIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Field name used in serialized output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::LeftElbow => "leftElbow",
            Self::RightElbow => "rightElbow",
            Self::LeftWrist => "leftWrist",
            Self::RightWrist => "rightWrist",
            Self::LeftHip => "leftHip",
            Self::RightHip => "rightHip",
            Self::LeftKnee => "leftKnee",
            Self::RightKnee => "rightKnee",
            Self::LeftAnkle => "leftAnkle",
            Self::RightAnkle => "rightAnkle",
        }
    }
}

/// A 2-D skeletal point with a depth placeholder and confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub confidence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            confidence,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Confidence strictly above `threshold`.
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }

    pub fn is_present(&self) -> bool {
        self.confidence > 0.0
    }
}

/// A complete set of 13 landmarks, or the all-zero sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyLandmarks {
    points: [Landmark; LandmarkIndex::COUNT],
}

impl BodyLandmarks {
    /// All-zero, zero-confidence landmarks reported when nothing was found.
    pub fn sentinel() -> Self {
        Self {
            points: [Landmark::default(); LandmarkIndex::COUNT],
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(LandmarkIndex) -> Landmark,
    {
        Self {
            points: LandmarkIndex::ALL.map(f),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.points.iter().all(|p| *p == Landmark::default())
    }

    pub fn iter(&self) -> impl Iterator<Item = (LandmarkIndex, &Landmark)> {
        LandmarkIndex::ALL.iter().copied().zip(self.points.iter())
    }

    pub fn valid_count(&self, threshold: f32) -> usize {
        self.points.iter().filter(|p| p.is_valid(threshold)).count()
    }

    /// Fraction of landmarks whose confidence exceeds `threshold`.
    pub fn quality(&self, threshold: f32) -> f32 {
        self.valid_count(threshold) as f32 / LandmarkIndex::COUNT as f32
    }

    /// Mean confidence over `indices`; zero for an empty slice.
    pub fn mean_confidence(&self, indices: &[LandmarkIndex]) -> f32 {
        if indices.is_empty() {
            return 0.0;
        }
        indices.iter().map(|&i| self[i].confidence).sum::<f32>() / indices.len() as f32
    }
}

impl Index<LandmarkIndex> for BodyLandmarks {
    type Output = Landmark;

    fn index(&self, index: LandmarkIndex) -> &Landmark {
        &self.points[index as usize]
    }
}

impl IndexMut<LandmarkIndex> for BodyLandmarks {
    fn index_mut(&mut self, index: LandmarkIndex) -> &mut Landmark {
        &mut self.points[index as usize]
    }
}

impl Serialize for BodyLandmarks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(LandmarkIndex::COUNT))?;
        for (index, landmark) in self.iter() {
            map.serialize_entry(index.name(), landmark)?;
        }
        map.end()
    }
}

/// Placement of one landmark inside the body bounding box.
struct Proportion {
    index: LandmarkIndex,
    /// Signed horizontal offset from the centre line, as a fraction of width.
    dx: f32,
    /// Vertical position from the top, as a fraction of height.
    fy: f32,
    reliability: f32,
}

const fn prop(index: LandmarkIndex, dx: f32, fy: f32, reliability: f32) -> Proportion {
    Proportion {
        index,
        dx,
        fy,
        reliability,
    }
}

#[rustfmt::skip]
const PROPORTIONS: [Proportion; LandmarkIndex::COUNT] = [
    prop(LandmarkIndex::Nose,           0.00, 0.075, 0.95),
    prop(LandmarkIndex::LeftShoulder,  -0.40, 0.20,  0.90),
    prop(LandmarkIndex::RightShoulder,  0.40, 0.20,  0.90),
    prop(LandmarkIndex::LeftElbow,     -0.30, 0.40,  0.85),
    prop(LandmarkIndex::RightElbow,     0.30, 0.40,  0.85),
    prop(LandmarkIndex::LeftWrist,     -0.20, 0.55,  0.75),
    prop(LandmarkIndex::RightWrist,     0.20, 0.55,  0.75),
    prop(LandmarkIndex::LeftHip,       -0.35, 0.60,  0.90),
    prop(LandmarkIndex::RightHip,       0.35, 0.60,  0.90),
    prop(LandmarkIndex::LeftKnee,      -0.15, 0.80,  0.80),
    prop(LandmarkIndex::RightKnee,      0.15, 0.80,  0.80),
    prop(LandmarkIndex::LeftAnkle,     -0.10, 0.95,  0.70),
    prop(LandmarkIndex::RightAnkle,     0.10, 0.95,  0.70),
];

/// Places landmarks at fixed anthropometric fractions of the body box.
#[derive(Debug, Clone, Copy, Default)]
pub struct LandmarkExtractor;

impl LandmarkExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, body: &BoundingBox, confidence: f32) -> BodyLandmarks {
        let confidence = confidence.clamp(0.0, 1.0);
        let mut landmarks = BodyLandmarks::sentinel();
        for p in &PROPORTIONS {
            let at = body.proportional_point(p.dx, p.fy);
            landmarks[p.index] = Landmark::new(at.x, at.y, confidence * p.reliability);
        }
        debug!(
            width = body.width(),
            height = body.height(),
            confidence,
            "landmarks placed"
        );
        landmarks
    }

    /// Landmarks for the dominant contour, or the sentinel if it is empty.
    pub fn extract_from_contour(&self, contour: &Contour, confidence: f32) -> BodyLandmarks {
        match contour.bounding_box() {
            Some(body) => self.extract(&body, confidence),
            None => BodyLandmarks::sentinel(),
        }
    }
}
