//! Shared types for the beadnorm weld-profile pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference the binary,
/// edge, and canonical images without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in integer pixel coordinates.
///
/// Coordinates follow image convention: `x` grows rightward, `y` grows
/// downward. Points are plain values; filtering stages always produce a
/// new vector rather than mutating in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to an arbitrary (sub-pixel) position.
    #[must_use]
    pub fn distance_to(self, x: f64, y: f64) -> f64 {
        let dx = f64::from(self.x) - x;
        let dy = f64::from(self.y) - y;
        dx.hypot(dy)
    }
}

/// A detected line segment with its derived parametrization.
///
/// Immutable once constructed: the slope `m`, intercept `c`, and angle
/// `theta` are computed from the endpoints at construction time and never
/// updated. Vertical segments (`x1 == x2`) have an undefined slope and
/// cannot be represented; [`Line::from_endpoints`] returns `None` for them
/// and the detector discards them outright.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// First endpoint, x.
    pub x1: i32,
    /// First endpoint, y.
    pub y1: i32,
    /// Second endpoint, x.
    pub x2: i32,
    /// Second endpoint, y.
    pub y2: i32,
    /// Slope `(y2 - y1) / (x2 - x1)`.
    pub m: f64,
    /// Intercept `y1 - m * x1`.
    pub c: f64,
    /// Direction angle `atan2(y2 - y1, x2 - x1)`, in `(-π, π]`.
    pub theta: f64,
}

impl Line {
    /// Parametrize a segment from its endpoints.
    ///
    /// Returns `None` when the segment is vertical (`x1 == x2`), since
    /// the slope is undefined.
    #[must_use]
    pub fn from_endpoints(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x2 == x1 {
            return None;
        }
        let m = f64::from(y2 - y1) / f64::from(x2 - x1);
        let c = f64::from(y1) - m * f64::from(x1);
        let theta = f64::from(y2 - y1).atan2(f64::from(x2 - x1));
        Some(Self {
            x1,
            y1,
            x2,
            y2,
            m,
            c,
            theta,
        })
    }
}

/// The reference triangle spanning the weld bead profile.
///
/// Built from the intersection of the two flank lines and the two outer
/// extremities of the (radius-filtered) profile along the diagonal axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    /// Intersection of the two flank lines, truncated to pixel coordinates.
    pub intersection: Point,
    /// Profile point minimizing `x - y`.
    pub lower_left: Point,
    /// Profile point maximizing `x + y`.
    pub lower_right: Point,
}

/// Configuration for the weld-profile pipeline.
///
/// All parameters have defaults matching the reference processing chain.
/// Thresholds are validated at the pipeline entry point; invalid values
/// return [`PipelineError::InvalidConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum Euclidean distance (pixels) from the line intersection for
    /// a foreground point to be considered part of the bead.
    pub radius_threshold: f64,

    /// Minimum angular difference (radians) between two retained lines.
    /// Candidates closer than this to an already-accepted line are merged
    /// away as near-parallel duplicates.
    pub angular_threshold: f64,

    /// Maximum distance (pixels) from the reference triangle boundary for
    /// an outside point to be kept. Points inside the triangle are always
    /// kept.
    pub polygon_threshold: f64,

    /// Canny low threshold, applied to the binary image.
    pub canny_low: f32,

    /// Canny high threshold, applied to the binary image.
    pub canny_high: f32,

    /// Minimum accumulator votes for a Hough candidate to seed a segment
    /// walk.
    pub vote_threshold: u32,

    /// Minimum segment length (pixels) for a walked Hough segment to be
    /// emitted.
    pub min_line_length: u32,

    /// Maximum run of missing pixels (pixels) tolerated while walking a
    /// Hough segment.
    pub max_line_gap: u32,

    /// Slope-difference floor below which the two retained lines are
    /// treated as parallel and the frame is skipped, instead of dividing
    /// by a near-zero denominator at the intersection.
    pub slope_epsilon: f64,
}

impl PipelineConfig {
    /// Default bead radius threshold (pixels).
    pub const DEFAULT_RADIUS_THRESHOLD: f64 = 200.0;
    /// Default angular threshold for line deduplication (radians).
    pub const DEFAULT_ANGULAR_THRESHOLD: f64 = 0.2;
    /// Default triangle distance threshold (pixels).
    pub const DEFAULT_POLYGON_THRESHOLD: f64 = 5.0;
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = 200.0;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = 255.0;
    /// Default Hough accumulator vote threshold.
    pub const DEFAULT_VOTE_THRESHOLD: u32 = 100;
    /// Default minimum Hough segment length (pixels).
    pub const DEFAULT_MIN_LINE_LENGTH: u32 = 100;
    /// Default maximum Hough segment gap (pixels).
    pub const DEFAULT_MAX_LINE_GAP: u32 = 10;
    /// Default slope degeneracy epsilon.
    pub const DEFAULT_SLOPE_EPSILON: f64 = 1e-6;

    /// Check configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when a threshold is
    /// non-finite or negative, or when `canny_low > canny_high`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let finite_non_negative = [
            ("radius_threshold", self.radius_threshold),
            ("angular_threshold", self.angular_threshold),
            ("polygon_threshold", self.polygon_threshold),
            ("slope_epsilon", self.slope_epsilon),
        ];
        for (name, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}",
                )));
            }
        }
        if !self.canny_low.is_finite() || !self.canny_high.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "canny thresholds must be finite".to_string(),
            ));
        }
        if self.canny_low > self.canny_high {
            return Err(PipelineError::InvalidConfig(format!(
                "canny_low ({}) must not exceed canny_high ({})",
                self.canny_low, self.canny_high,
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            radius_threshold: Self::DEFAULT_RADIUS_THRESHOLD,
            angular_threshold: Self::DEFAULT_ANGULAR_THRESHOLD,
            polygon_threshold: Self::DEFAULT_POLYGON_THRESHOLD,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            vote_threshold: Self::DEFAULT_VOTE_THRESHOLD,
            min_line_length: Self::DEFAULT_MIN_LINE_LENGTH,
            max_line_gap: Self::DEFAULT_MAX_LINE_GAP,
            slope_epsilon: Self::DEFAULT_SLOPE_EPSILON,
        }
    }
}

/// Why a frame was skipped without producing a canonical image.
///
/// These are expected, recoverable-by-skipping conditions: the caller is
/// expected to drop the frame and move on to the next one. They are
/// deliberately not [`PipelineError`] variants so that callers can treat
/// every insufficient-signal cause uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The Hough stage found no line segments.
    NoLines,
    /// The Hough stage found exactly one line segment.
    SingleLine,
    /// Deduplication did not leave exactly two lines.
    AmbiguousLineCount {
        /// Number of lines remaining after deduplication.
        count: usize,
    },
    /// The two retained lines are near-parallel; no stable intersection.
    DegenerateIntersection,
    /// No foreground points survived filtering.
    EmptyProfile,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLines => write!(f, "no lines detected"),
            Self::SingleLine => write!(f, "only one line detected"),
            Self::AmbiguousLineCount { count } => {
                write!(f, "expected two lines after deduplication, got {count}")
            }
            Self::DegenerateIntersection => {
                write!(f, "retained lines are near-parallel, no intersection")
            }
            Self::EmptyProfile => write!(f, "no profile points after filtering"),
        }
    }
}

/// Outcome of running the pipeline on a single frame.
///
/// Skipping is the expected response to a frame with insufficient
/// geometric signal; only precondition violations surface as
/// [`PipelineError`].
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    /// The frame produced a canonical 300×300 profile image.
    Canonical(GrayImage),
    /// The frame was skipped; the caller should proceed to the next frame.
    Skipped(SkipReason),
}

impl FrameOutcome {
    /// The canonical image, if the frame produced one.
    #[must_use]
    pub const fn canonical(&self) -> Option<&GrayImage> {
        match self {
            Self::Canonical(image) => Some(image),
            Self::Skipped(_) => None,
        }
    }

    /// The skip reason, if the frame was skipped.
    #[must_use]
    pub const fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Canonical(_) => None,
            Self::Skipped(reason) => Some(*reason),
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// These are precondition violations that should fail loudly, in contrast
/// to [`SkipReason`] which signals an unusable but well-formed frame.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input frame bytes.
    #[error("failed to decode frame: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input frame bytes were empty.
    #[error("input frame data is empty")]
    EmptyInput,

    /// The frame has zero width or height.
    #[error("frame has zero width or height")]
    EmptyFrame,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
