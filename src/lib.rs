//! # percent-body
//!
//! Pure Rust body measurement estimation from a single camera frame.
//!
//! No trained model is involved. Each frame goes through classical image
//! processing and fixed anthropometric heuristics:
//!
//! 1. Convert RGBA to luminance (ITU-R BT.601)
//! 2. Score human presence from head, shoulder, torso and leg cues
//! 3. Threshold a 3×3 Sobel gradient magnitude into an edge map
//! 4. Trace 8-connected edge components and keep the largest
//! 5. Place 13 skeletal landmarks at fixed fractions of its bounding box
//! 6. Convert landmark distances to centimetres, anchored on shoulder width
//! 7. Score each measurement's confidence and clamp it into a plausible range
//!
//! An optional multi-frame calibration pass estimates a scale factor and a
//! confidence that feed steps 6 and 7.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use percent_body::{BodyDetector, CaptureStep, Frame};
//!
//! // A dark figure on a light background.
//! let frame = Frame::from_fn(120, 240, Duration::ZERO, |x, y| {
//!     let (dx, dy) = (x as f32 - 60.0, y as f32 - 30.0);
//!     let head = dx * dx + dy * dy <= 100.0;
//!     let neck = (56..64).contains(&x) && (38..48).contains(&y);
//!     let body = (30..90).contains(&x) && (48..236).contains(&y);
//!     if head || neck || body { [40, 40, 40, 255] } else { [220, 220, 220, 255] }
//! });
//!
//! let detector = BodyDetector::default();
//! let detection = detector.detect(&frame).unwrap();
//! let report = detector.estimate(&detection.landmarks, CaptureStep::Front, Some(180.0), None);
//!
//! println!("chest: {} cm", report.set.chest.value);
//! for event in &report.events {
//!     println!("corrected: {:?}", event);
//! }
//! ```
//!
//! ## Custom Image Types
//!
//! The presence classifier and edge detector work on anything implementing
//! [`ImageAccess`]:
//!
//! ```rust
//! use percent_body::{EdgeDetector, ImageAccess};
//!
//! struct Stripes;
//!
//! impl ImageAccess for Stripes {
//!     fn get_pixel(&self, x: i32, _y: i32) -> u8 {
//!         if x >= 32 { 255 } else { 0 }
//!     }
//!     fn width(&self) -> u32 { 64 }
//!     fn height(&self) -> u32 { 64 }
//! }
//!
//! let edges = EdgeDetector::default().detect(&Stripes);
//! assert!(edges.is_edge(32, 10));
//! ```

pub mod calibration;
pub mod config;
pub mod contour;
pub mod edges;
mod error;
pub mod image;
pub mod landmarks;
pub mod metrics;
pub mod pipeline;
pub mod presence;
pub mod session;
mod types;
pub mod validation;

pub use calibration::{CalibrationResult, CalibrationSample, CalibrationSession, CameraParams, PoseClass};
pub use config::{Config, Range};
pub use contour::{Contour, ContourTracer};
pub use edges::{EdgeDetector, EdgeMap};
pub use error::{Error, ErrorKind, Result};
pub use crate::image::{GrayImage, ImageAccess, ImageStatistics};
pub use landmarks::{BodyLandmarks, Landmark, LandmarkExtractor, LandmarkIndex};
pub use metrics::{BodyMetrics, MeasurementCalculator, PixelDistances};
pub use pipeline::{BodyDetector, Detection};
pub use presence::{BodyAnalysis, PresenceClassifier, TrackingQuality};
pub use session::{CaptureSession, CaptureState, FrameClock, ManualClock, SystemClock, TickOutcome};
pub use types::{BoundingBox, CaptureStep, Frame, Point};
pub use validation::{Measurement, MeasurementReport, MeasurementSet, Quantity, ValidationEvent, Validator};
