//! Tunable constants for every pipeline stage.
//!
//! The defaults reproduce the behaviour the heuristics were tuned for. None of
//! them is derived from a validation dataset, so all of them can be overridden
//! from a TOML file:
//!
//! ```toml
//! [edges]
//! threshold = 80.0
//!
//! [validation.chest]
//! min = 70.0
//! max = 140.0
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub edges: EdgeConfig,
    pub contours: ContourConfig,
    pub presence: PresenceConfig,
    pub landmarks: LandmarkConfig,
    pub calibration: CalibrationConfig,
    pub measurement: MeasurementConfig,
    pub validation: ValidationConfig,
    pub capture: CaptureConfig,
}

/// Inclusive numeric interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.max(self.min).min(self.max)
    }

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Gradient magnitude a pixel must strictly exceed to count as an edge.
    pub threshold: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self { threshold: 100.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Smallest component kept, inclusive.
    pub min_points: usize,
    /// How many of the largest components survive.
    pub keep: usize,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            min_points: 50,
            keep: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Head candidates are sampled in `[0, head_band_end)` of the image height.
    pub head_band_end: f32,
    pub head_radius: f32,
    pub head_probes: usize,
    pub head_luma_diff: u8,
    pub head_grid_step: usize,
    /// Horizontal margin excluded from head candidate centres, in pixels.
    pub head_margin: u32,

    pub shoulder_band: Range,
    pub shoulder_row_step: usize,
    pub shoulder_luma_diff: u8,
    /// Fraction of near-equal adjacent pairs a row needs to count as a line.
    pub shoulder_ratio: f32,

    pub torso_band: Range,
    pub leg_band: Range,
    /// Columns sampled for vertical structure, as fractions of the width.
    pub column_band: Range,
    pub column_step: usize,
    pub vertical_luma_diff: u8,
    pub torso_threshold: f32,
    pub leg_threshold: f32,

    pub head_weight: f32,
    pub shoulder_weight: f32,
    pub torso_weight: f32,
    pub leg_weight: f32,

    /// Confidence a frame must strictly exceed to report a human.
    pub detection_threshold: f32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            head_band_end: 0.3,
            head_radius: 15.0,
            head_probes: 12,
            head_luma_diff: 30,
            head_grid_step: 10,
            head_margin: 20,
            shoulder_band: Range::new(0.2, 0.4),
            shoulder_row_step: 5,
            shoulder_luma_diff: 10,
            shoulder_ratio: 0.6,
            torso_band: Range::new(0.3, 0.8),
            leg_band: Range::new(0.6, 1.0),
            column_band: Range::new(0.3, 0.7),
            column_step: 10,
            vertical_luma_diff: 15,
            torso_threshold: 0.5,
            leg_threshold: 0.4,
            head_weight: 0.3,
            shoulder_weight: 0.2,
            torso_weight: 0.3,
            leg_weight: 0.2,
            detection_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkConfig {
    /// A landmark is usable when its confidence strictly exceeds this.
    pub valid_confidence: f32,
    /// Usable landmarks required before confidences are downgraded.
    pub min_valid: usize,
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            valid_confidence: 0.3,
            min_valid: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub sample_count: usize,
    pub min_samples: usize,
    /// Detection confidence a frame must strictly exceed to become a sample.
    pub min_sample_confidence: f32,
    /// Aggregate confidence a result must strictly exceed to be published.
    pub min_confidence: f32,
    pub scale_range: Range,
    /// Shoulder height difference, as a fraction of shoulder width, still
    /// classified as level.
    pub level_tolerance: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_count: 30,
            min_samples: 5,
            min_sample_confidence: 0.5,
            min_confidence: 0.6,
            scale_range: Range::new(0.8, 1.2),
            level_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    pub default_height_cm: f32,
    pub reference_height_cm: f32,
    pub reference_shoulder_cm: f32,
    pub reference_head_cm: f32,
    pub chest_to_shoulder: f32,
    pub waist_to_chest: f32,
    pub hips_to_chest: f32,
    pub neck_to_shoulder: f32,
    /// Extra chest girth attributed to body depth in side views.
    pub side_depth_factor: f32,
    /// Calibration confidence assumed when no calibration has been published.
    pub uncalibrated_confidence: f32,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            default_height_cm: 175.0,
            reference_height_cm: 175.0,
            reference_shoulder_cm: 40.0,
            reference_head_cm: 25.0,
            chest_to_shoulder: 2.5,
            waist_to_chest: 0.85,
            hips_to_chest: 0.95,
            neck_to_shoulder: 0.25,
            side_depth_factor: 1.1,
            uncalibrated_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub chest: Range,
    pub waist: Range,
    pub hips: Range,
    pub shoulders: Range,
    pub inseam: Range,
    pub arm_length: Range,
    pub neck: Range,
    /// Typical adult height band; its midpoint drives out-of-range correction.
    pub optimal_height: Range,
    /// Multiplier applied to the confidence of a corrected measurement.
    pub out_of_range_penalty: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            chest: Range::new(60.0, 150.0),
            waist: Range::new(50.0, 140.0),
            hips: Range::new(60.0, 150.0),
            shoulders: Range::new(25.0, 70.0),
            inseam: Range::new(60.0, 100.0),
            arm_length: Range::new(50.0, 80.0),
            neck: Range::new(25.0, 50.0),
            optimal_height: Range::new(120.0, 220.0),
            out_of_range_penalty: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long a human must stay in frame before scanning succeeds.
    #[serde(with = "millis")]
    pub dwell: Duration,
    #[serde(with = "millis")]
    pub scan_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dwell: Duration::from_secs(2),
            scan_timeout: Duration::from_secs(15),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.validation;
        let ranges = [
            ("validation.chest", v.chest),
            ("validation.waist", v.waist),
            ("validation.hips", v.hips),
            ("validation.shoulders", v.shoulders),
            ("validation.inseam", v.inseam),
            ("validation.arm_length", v.arm_length),
            ("validation.neck", v.neck),
            ("validation.optimal_height", v.optimal_height),
            ("calibration.scale_range", self.calibration.scale_range),
            ("presence.shoulder_band", self.presence.shoulder_band),
            ("presence.torso_band", self.presence.torso_band),
            ("presence.leg_band", self.presence.leg_band),
            ("presence.column_band", self.presence.column_band),
        ];
        for (name, range) in ranges {
            if !(range.min.is_finite() && range.max.is_finite()) || range.min > range.max {
                return Err(Error::InvalidConfig(format!(
                    "{name}: [{}, {}] is not a valid range",
                    range.min, range.max
                )));
            }
        }

        let unit = [
            ("presence.detection_threshold", self.presence.detection_threshold),
            ("landmarks.valid_confidence", self.landmarks.valid_confidence),
            ("calibration.min_sample_confidence", self.calibration.min_sample_confidence),
            ("calibration.min_confidence", self.calibration.min_confidence),
            ("measurement.uncalibrated_confidence", self.measurement.uncalibrated_confidence),
            ("validation.out_of_range_penalty", v.out_of_range_penalty),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!("{name}: {value} is outside [0, 1]")));
            }
        }

        let counts = [
            ("presence.head_probes", self.presence.head_probes),
            ("presence.head_grid_step", self.presence.head_grid_step),
            ("presence.shoulder_row_step", self.presence.shoulder_row_step),
            ("presence.column_step", self.presence.column_step),
            ("calibration.sample_count", self.calibration.sample_count),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        let m = &self.measurement;
        if m.reference_height_cm <= 0.0 || m.reference_shoulder_cm <= 0.0 || m.reference_head_cm <= 0.0 {
            return Err(Error::InvalidConfig(
                "measurement reference lengths must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [edges]
            threshold = 50.0

            [validation.chest]
            min = 70.0
            max = 140.0

            [capture]
            dwell = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.edges.threshold, 50.0);
        assert_eq!(config.validation.chest, Range::new(70.0, 140.0));
        assert_eq!(config.validation.waist, Range::new(50.0, 140.0));
        assert_eq!(config.capture.dwell, Duration::from_millis(500));
        assert_eq!(config.capture.scan_timeout, Duration::from_secs(15));
        assert_eq!(config.contours.min_points, 50);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = Config::from_toml(
            r#"
            [validation.neck]
            min = 60.0
            max = 20.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn out_of_unit_threshold_is_rejected() {
        let err = Config::from_toml("[presence]\ndetection_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("percent-body-missing-config.toml");
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn range_clamp_handles_nan() {
        let r = Range::new(60.0, 150.0);
        assert_eq!(r.clamp(200.0), 150.0);
        assert_eq!(r.clamp(10.0), 60.0);
        assert_eq!(r.clamp(f32::NAN), 60.0);
        assert_eq!(r.midpoint(), 105.0);
        assert!(r.contains(60.0) && r.contains(150.0) && !r.contains(150.5));
    }
}
