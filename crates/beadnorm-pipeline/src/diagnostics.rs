//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! algorithm tuning and parameter experimentation. Timing is injected
//! through the [`Clock`] trait so the pipeline itself stays free of
//! platform timing assumptions; callers supply a clock backed by
//! [`std::time::Instant`] (or a fixed clock in tests).
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, StageOutcome};
use crate::types::{FrameOutcome, PipelineConfig, PipelineError, SkipReason};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of wall-clock measurements for diagnostics.
pub trait Clock {
    /// An opaque timestamp.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single frame run.
///
/// Stages past the point where the frame was skipped are `None`; the
/// [`skip`](Self::skip) field records why the run ended early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    /// Stage 0: Otsu binarization, coordinate extraction, edge mapping.
    pub segment: StageDiagnostics,
    /// Stage 1: probabilistic Hough line detection.
    pub line_detection: Option<StageDiagnostics>,
    /// Stage 2: near-parallel line deduplication.
    pub line_reduction: Option<StageDiagnostics>,
    /// Stage 3: reference geometry and outlier filtering.
    pub geometry: Option<StageDiagnostics>,
    /// Stage 4: canonical rendering.
    pub canonicalize: Option<StageDiagnostics>,
    /// Why the frame was skipped, if it was.
    pub skip: Option<SkipReason>,
    /// Total wall-clock duration of the entire run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across the run.
    pub summary: FrameSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Segmentation metrics.
    Segment {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
        /// The automatically selected Otsu threshold.
        otsu_level: u8,
        /// Number of foreground (profile) pixels in the binary image.
        foreground_count: usize,
        /// Number of edge pixels in the Canny output.
        edge_pixel_count: u64,
    },
    /// Line detection metrics.
    LineDetection {
        /// Raw segments from the detector.
        segment_count: usize,
        /// Parametrized lines after discarding vertical segments.
        line_count: usize,
    },
    /// Line deduplication metrics.
    LineReduction {
        /// Lines entering deduplication.
        input_count: usize,
        /// Direction angles (radians) of the two retained flanks.
        flank_angles: [f64; 2],
    },
    /// Reference geometry metrics.
    Geometry {
        /// Flank intersection, truncated to pixel coordinates.
        intersection: (i32, i32),
        /// Profile points surviving both outlier filters.
        filtered_count: usize,
    },
    /// Canonical rendering metrics.
    Canonicalize {
        /// Side length of the output canvas.
        canvas_size: u32,
        /// Number of profile pixels written into the canvas.
        profile_pixel_count: u64,
    },
}

/// High-level summary counts for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSummary {
    /// Source frame width in pixels.
    pub frame_width: u32,
    /// Source frame height in pixels.
    pub frame_height: u32,
    /// Foreground pixels after binarization.
    pub foreground_count: usize,
    /// Profile pixels in the canonical output (0 when skipped).
    pub canonical_pixel_count: u64,
}

impl FrameDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Frame Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} ({} foreground pixels)",
            self.summary.frame_width, self.summary.frame_height, self.summary.foreground_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        if let Some(reason) = self.skip {
            lines.push(format!("Skipped: {reason}"));
        }
        lines.push(String::new());

        // Per-stage breakdown.
        lines.push(format!(
            "{:<20} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let stages: Vec<(&str, &StageDiagnostics)> = {
            let mut s = vec![("Segment", &self.segment)];
            if let Some(ref d) = self.line_detection {
                s.push(("Line Detection", d));
            }
            if let Some(ref d) = self.line_reduction {
                s.push(("Line Reduction", d));
            }
            if let Some(ref d) = self.geometry {
                s.push(("Geometry", d));
            }
            if let Some(ref d) = self.canonicalize {
                s.push(("Canonicalize", d));
            }
            s
        };

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<20} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Canonical profile pixels: {}",
            self.summary.canonical_pixel_count,
        ));

        lines.join("\n")
    }
}

/// Run the full pipeline on a decoded frame, collecting per-stage timing
/// and metrics.
///
/// Returns the [`FrameOutcome`] together with the diagnostics; a skipped
/// frame is a valid outcome with partial diagnostics, not an error.
///
/// # Errors
///
/// Returns [`PipelineError`] for the same precondition violations as
/// [`crate::process_frame`].
pub fn process_with_diagnostics<C: Clock>(
    frame: &DynamicImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(FrameOutcome, FrameDiagnostics), PipelineError> {
    let run_start = clock.now();

    let started = clock.now();
    let segmented = Pipeline::new(frame.clone(), config.clone()).segment()?;
    let (width, height) = segmented.binary().dimensions();
    let foreground_count = segmented.coordinates().len();
    let segment = StageDiagnostics {
        duration: clock.elapsed(&started),
        metrics: StageMetrics::Segment {
            width,
            height,
            otsu_level: segmented.otsu_level(),
            foreground_count,
            edge_pixel_count: count_set_pixels(segmented.edges()),
        },
    };

    let mut diagnostics = FrameDiagnostics {
        segment,
        line_detection: None,
        line_reduction: None,
        geometry: None,
        canonicalize: None,
        skip: None,
        total_duration: Duration::ZERO,
        summary: FrameSummary {
            frame_width: width,
            frame_height: height,
            foreground_count,
            canonical_pixel_count: 0,
        },
    };

    macro_rules! advance_or_skip {
        ($outcome:expr) => {
            match $outcome {
                StageOutcome::Advanced(stage) => stage,
                StageOutcome::Skipped(reason) => {
                    diagnostics.skip = Some(reason);
                    diagnostics.total_duration = clock.elapsed(&run_start);
                    return Ok((FrameOutcome::Skipped(reason), diagnostics));
                }
            }
        };
    }

    let started = clock.now();
    let detected = advance_or_skip!(segmented.detect_lines());
    diagnostics.line_detection = Some(StageDiagnostics {
        duration: clock.elapsed(&started),
        metrics: StageMetrics::LineDetection {
            segment_count: detected.segments().len(),
            line_count: detected.lines().len(),
        },
    });

    let input_count = detected.lines().len();
    let started = clock.now();
    let reduced = advance_or_skip!(detected.reduce());
    diagnostics.line_reduction = Some(StageDiagnostics {
        duration: clock.elapsed(&started),
        metrics: StageMetrics::LineReduction {
            input_count,
            flank_angles: [reduced.reduced()[0].theta, reduced.reduced()[1].theta],
        },
    });

    let started = clock.now();
    let geometry = advance_or_skip!(reduced.build_geometry());
    let apex = geometry.triangle().intersection;
    diagnostics.geometry = Some(StageDiagnostics {
        duration: clock.elapsed(&started),
        metrics: StageMetrics::Geometry {
            intersection: (apex.x, apex.y),
            filtered_count: geometry.filtered().len(),
        },
    });

    let started = clock.now();
    let canonicalized = geometry.canonicalize();
    let profile_pixel_count = canonicalized
        .canonical()
        .pixels()
        .map(|p| u64::from(p.0[0] == crate::canonical::PROFILE))
        .sum();
    diagnostics.canonicalize = Some(StageDiagnostics {
        duration: clock.elapsed(&started),
        metrics: StageMetrics::Canonicalize {
            canvas_size: crate::canonical::CANVAS_SIZE,
            profile_pixel_count,
        },
    });

    diagnostics.summary.canonical_pixel_count = profile_pixel_count;
    diagnostics.total_duration = clock.elapsed(&run_start);
    Ok((
        FrameOutcome::Canonical(canonicalized.into_result().canonical),
        diagnostics,
    ))
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Segment {
            width,
            height,
            otsu_level,
            foreground_count,
            edge_pixel_count,
        } => {
            format!(
                "{width}x{height} otsu={otsu_level} fg={foreground_count} edges={edge_pixel_count}",
            )
        }
        StageMetrics::LineDetection {
            segment_count,
            line_count,
        } => format!("{segment_count} segments -> {line_count} lines"),
        StageMetrics::LineReduction {
            input_count,
            flank_angles,
        } => {
            format!(
                "{input_count} -> 2 lines (theta={:.3}, {:.3})",
                flank_angles[0], flank_angles[1],
            )
        }
        StageMetrics::Geometry {
            intersection,
            filtered_count,
        } => {
            format!(
                "apex=({}, {}) {filtered_count} pts kept",
                intersection.0, intersection.1,
            )
        }
        StageMetrics::Canonicalize {
            canvas_size,
            profile_pixel_count,
        } => format!("{canvas_size}x{canvas_size} canvas, {profile_pixel_count} profile px"),
    }
}

/// Count set pixels (value > 0) in a binary image.
fn count_set_pixels(image: &image::GrayImage) -> u64 {
    image.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}
