//! Command-line body measurement from still images.
//!
//! Usage:
//!   percent-body front.jpg                              # Human-readable output
//!   percent-body front.jpg --side side.jpg --height 180 # Both steps, averaged
//!   percent-body front.jpg --calibrate a.jpg b.jpg ...  # Calibrate first
//!   percent-body front.jpg --json -o report.json        # JSON to a file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use percent_body::{
    BodyAnalysis, BodyDetector, CalibrationResult, CaptureStep, Config, Frame, MeasurementSet,
    ValidationEvent,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "percent-body")]
#[command(author, version, about = "Body measurement estimation from images", long_about = None)]
struct Args {
    /// Front-facing image
    #[arg(required = true)]
    front: PathBuf,

    /// Side-facing image
    #[arg(long)]
    side: Option<PathBuf>,

    /// Subject height in centimetres
    #[arg(long)]
    height: Option<f32>,

    /// Images for a calibration pass before measuring
    #[arg(long, num_args = 1..)]
    calibrate: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Report lengths in inches
    #[arg(long)]
    inches: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<CalibrationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration_error: Option<String>,
    steps: Vec<StepOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    averaged: Option<BTreeMap<&'static str, MeasurementOutput>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepOutput {
    step: CaptureStep,
    image: String,
    width: u32,
    height: u32,
    analysis: BodyAnalysis,
    measurements: BTreeMap<&'static str, MeasurementOutput>,
    events: Vec<ValidationEvent>,
}

#[derive(Serialize, Clone, Copy)]
struct MeasurementOutput {
    value: f32,
    confidence: f32,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let detector = BodyDetector::new(&config);

    let (calibration, calibration_error) = if args.calibrate.is_empty() {
        (None, None)
    } else {
        let frames = args
            .calibrate
            .iter()
            .enumerate()
            .map(|(i, path)| load_frame(path, Duration::from_millis(i as u64 * 100)))
            .collect::<Result<Vec<_>, _>>()?;
        info!(frames = frames.len(), "running calibration");
        match detector.calibrate(&frames) {
            Ok(result) => (Some(result), None),
            // Measuring continues uncalibrated.
            Err(e) => (None, Some(e.to_string())),
        }
    };

    let mut steps = Vec::new();
    let mut sets = Vec::new();
    let inputs = std::iter::once((CaptureStep::Front, &args.front))
        .chain(args.side.iter().map(|p| (CaptureStep::Side, p)));

    for (step, path) in inputs {
        let frame = load_frame(path, Duration::ZERO)?;
        let detection = detector.detect(&frame)?;
        let report = detector.estimate(&detection.landmarks, step, args.height, calibration.as_ref());
        debug!(%step, events = report.events.len(), "step measured");

        steps.push(StepOutput {
            step,
            image: path.display().to_string(),
            width: frame.width,
            height: frame.height,
            analysis: detection.analysis,
            measurements: convert(&report.set, args.inches),
            events: report.events,
        });
        sets.push(report.set);
    }

    let averaged = match sets.as_slice() {
        [front, side] => Some(convert(&MeasurementSet::average(front, side), args.inches)),
        _ => None,
    };

    let output = Output {
        unit: if args.inches { "in" } else { "cm" },
        calibration,
        calibration_error,
        steps,
        averaged,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        info!(path = %path.display(), "output written");
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn load_frame(path: &Path, timestamp: Duration) -> Result<Frame, image::ImageError> {
    debug!(path = %path.display(), "loading image");
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Frame::new(width, height, rgba.into_raw(), timestamp))
}

fn convert(set: &MeasurementSet, inches: bool) -> BTreeMap<&'static str, MeasurementOutput> {
    set.iter()
        .map(|(q, m)| {
            let value = if inches { m.inches() } else { m.value };
            (
                q.name(),
                MeasurementOutput {
                    value,
                    confidence: m.confidence,
                },
            )
        })
        .collect()
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    if let Some(c) = &output.calibration {
        s.push_str(&format!(
            "Calibration: scale {:.2}, confidence {:.0}% ({} samples)\n",
            c.scale_factor,
            c.confidence * 100.0,
            c.sample_count
        ));
    } else if let Some(e) = &output.calibration_error {
        s.push_str(&format!("Calibration: {} (measuring uncalibrated)\n", e));
    }

    for step in &output.steps {
        s.push_str(&format!("\n--- {} ({}, {}x{}) ---\n", step.step, step.image, step.width, step.height));
        s.push_str(&format!(
            "Detection confidence: {:.0}% ({:?})\n",
            step.analysis.confidence * 100.0,
            step.analysis.quality
        ));
        push_measurements(&mut s, &step.measurements, output.unit);

        for event in &step.events {
            match event {
                ValidationEvent::MeasurementOutOfRange { quantity, raw, corrected } => {
                    s.push_str(&format!("  ! {} out of range: {:.1} -> {:.1} cm\n", quantity, raw, corrected));
                }
                ValidationEvent::LandmarkQuality { valid, total } => {
                    s.push_str(&format!("  ! only {}/{} landmarks usable\n", valid, total));
                }
            }
        }
    }

    if let Some(averaged) = &output.averaged {
        s.push_str("\n--- averaged ---\n");
        push_measurements(&mut s, averaged, output.unit);
    }

    s
}

fn push_measurements(s: &mut String, measurements: &BTreeMap<&'static str, MeasurementOutput>, unit: &str) {
    for (name, m) in measurements {
        s.push_str(&format!(
            "  {:<10} {:>6.1} {}  ({:.0}%)\n",
            name,
            m.value,
            unit,
            m.confidence * 100.0
        ));
    }
}
