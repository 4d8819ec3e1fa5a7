use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No valid frame: {0}")]
    NoFrame(String),

    #[error("No human detected (confidence {confidence:.2})")]
    NoHumanDetected { confidence: f32 },

    #[error("Insufficient contour: largest component has {largest} points")]
    InsufficientContour { largest: usize },

    #[error("Landmark quality too low: {valid}/{total} landmarks usable")]
    LandmarkQuality { valid: usize, total: usize },

    #[error("Calibration failed: {valid} valid samples, {required} required")]
    InsufficientCalibrationSamples { valid: usize, required: usize },

    #[error("Calibration failed: confidence {confidence:.2} does not exceed {required:.2}")]
    LowCalibrationConfidence { confidence: f32, required: f32 },

    #[error("Not allowed while capture is {0}")]
    InvalidState(String),
}

impl Error {
    /// Flat taxonomy used for diagnostics and `errorReason` strings.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::Config(_) | Error::InvalidConfig(_) | Error::InvalidState(_) => {
                ErrorKind::Internal
            }
            Error::NoFrame(_) => ErrorKind::NoFrame,
            Error::NoHumanDetected { .. } => ErrorKind::NoHumanDetected,
            Error::InsufficientContour { .. } => ErrorKind::InsufficientContour,
            Error::LandmarkQuality { .. } => ErrorKind::LandmarkQuality,
            Error::InsufficientCalibrationSamples { .. }
            | Error::LowCalibrationConfidence { .. } => ErrorKind::CalibrationFailure,
        }
    }

    /// Conditions the caller retries on the next tick until the scan times out.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NoFrame | ErrorKind::NoHumanDetected | ErrorKind::InsufficientContour
        )
    }
}

/// Error taxonomy shared with presentation collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "NoFrameError")]
    NoFrame,
    NoHumanDetected,
    InsufficientContour,
    #[serde(rename = "LandmarkQualityError")]
    LandmarkQuality,
    MeasurementOutOfRange,
    CalibrationFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoFrame => "NoFrameError",
            ErrorKind::NoHumanDetected => "NoHumanDetected",
            ErrorKind::InsufficientContour => "InsufficientContour",
            ErrorKind::LandmarkQuality => "LandmarkQualityError",
            ErrorKind::MeasurementOutOfRange => "MeasurementOutOfRange",
            ErrorKind::CalibrationFailure => "CalibrationFailure",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
