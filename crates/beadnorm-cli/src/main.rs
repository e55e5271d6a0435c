//! beadnorm: CLI for normalizing laser weld-profile frames.
//!
//! Runs the normalization pipeline on one or more frame files with
//! configurable parameters, writing the canonical 300×300 PNG for each
//! usable frame. Useful for:
//!
//! - Batch-normalizing recorded weld frames
//! - Tuning Canny, Hough, and outlier-filter thresholds
//! - Inspecting per-stage timing and counts for a given frame
//!
//! Frames with insufficient geometric signal are skipped with a note on
//! stderr; only I/O, decode, and configuration errors fail the run.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin beadnorm -- [OPTIONS] <FRAME_PATH>...
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use beadnorm_pipeline::diagnostics::{self, Clock};
use beadnorm_pipeline::{FrameOutcome, PipelineConfig};
use clap::Parser;

/// Geometric normalizer for laser weld-profile frames.
///
/// Binarizes each frame, detects the two weld flank lines, filters the
/// profile against the reference triangle, and renders the profile into
/// a canonical 300×300 image with a fixed origin and orientation.
#[derive(Parser)]
#[command(name = "beadnorm", version)]
struct Cli {
    /// Paths to input frames (PNG, JPEG, BMP, WebP).
    #[arg(required = true)]
    frame_paths: Vec<PathBuf>,

    /// Maximum distance (pixels) from the flank intersection for a
    /// profile point to be kept.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_RADIUS_THRESHOLD)]
    radius_threshold: f64,

    /// Minimum angular difference (radians) between retained lines.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ANGULAR_THRESHOLD)]
    angular_threshold: f64,

    /// Maximum distance (pixels) outside the reference triangle for a
    /// profile point to be kept.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_POLYGON_THRESHOLD)]
    polygon_threshold: f64,

    /// Canny low threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Hough accumulator vote threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_VOTE_THRESHOLD)]
    vote_threshold: u32,

    /// Minimum Hough segment length in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_LINE_LENGTH)]
    min_line_length: u32,

    /// Maximum in-segment gap in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_LINE_GAP)]
    max_line_gap: u32,

    /// Slope-difference floor below which the flanks count as parallel.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SLOPE_EPSILON)]
    slope_epsilon: f64,

    /// Directory for canonical PNG outputs.
    ///
    /// Defaults to writing `<stem>.canonical.png` next to each input.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Print per-frame diagnostics as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Print a human-readable per-frame diagnostics report on stdout.
    #[arg(long)]
    report: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        radius_threshold: cli.radius_threshold,
        angular_threshold: cli.angular_threshold,
        polygon_threshold: cli.polygon_threshold,
        canny_low: cli.canny_low,
        canny_high: cli.canny_high,
        vote_threshold: cli.vote_threshold,
        min_line_length: cli.min_line_length,
        max_line_gap: cli.max_line_gap,
        slope_epsilon: cli.slope_epsilon,
    })
}

/// Output path for a frame's canonical image.
fn output_path(frame_path: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = frame_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    let file_name = format!("{stem}.canonical.png");
    match out_dir {
        Some(dir) => dir.join(file_name),
        None => frame_path.with_file_name(file_name),
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref dir) = cli.out_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("Error creating {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    let mut normalized = 0_usize;
    let mut skipped = 0_usize;
    let mut failed = 0_usize;

    for frame_path in &cli.frame_paths {
        let bytes = match std::fs::read(frame_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error reading {}: {e}", frame_path.display());
                failed += 1;
                continue;
            }
        };
        let frame = match image::load_from_memory(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("Error decoding {}: {e}", frame_path.display());
                failed += 1;
                continue;
            }
        };

        let (outcome, frame_diagnostics) =
            match diagnostics::process_with_diagnostics(&frame, &config, &StdClock) {
                Ok(pair) => pair,
                Err(e) => {
                    eprintln!("Pipeline error on {}: {e}", frame_path.display());
                    failed += 1;
                    continue;
                }
            };

        if cli.json {
            match serde_json::to_string_pretty(&frame_diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else if cli.report {
            println!("{}", frame_diagnostics.report());
        }

        match outcome {
            FrameOutcome::Canonical(canonical) => {
                let out = output_path(frame_path, cli.out_dir.as_deref());
                match canonical.save(&out) {
                    Ok(()) => {
                        eprintln!("{} -> {}", frame_path.display(), out.display());
                        normalized += 1;
                    }
                    Err(e) => {
                        eprintln!("Error writing {}: {e}", out.display());
                        failed += 1;
                    }
                }
            }
            FrameOutcome::Skipped(reason) => {
                eprintln!("Skipped {}: {reason}", frame_path.display());
                skipped += 1;
            }
        }
    }

    if cli.frame_paths.len() > 1 {
        eprintln!();
        eprintln!(
            "{} frames: {normalized} normalized, {skipped} skipped, {failed} failed",
            cli.frame_paths.len(),
        );
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
