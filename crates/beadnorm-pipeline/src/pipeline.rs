//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_frame`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use beadnorm_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # use beadnorm_pipeline::pipeline::StageOutcome;
//! # fn run(frame: image::DynamicImage) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let segmented = Pipeline::new(frame, config).segment()?;
//! let StageOutcome::Advanced(detected) = segmented.detect_lines() else {
//!     return Ok(()); // frame skipped
//! };
//! assert!(detected.lines().len() >= 2);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates. The first transition
//! is fallible ([`PipelineError`] for bad input or config); every later
//! transition returns a [`StageOutcome`], since an unusable frame is
//! skipped rather than failed.

use image::DynamicImage;

use crate::geometry::ReferenceGeometry;
use crate::hough::HoughSegment;
use crate::types::{
    GrayImage, Line, PipelineConfig, PipelineError, Point, SkipReason, Triangle,
};

/// Result of advancing past a stage that can end the frame early.
///
/// Skipping is not an error: the frame is well-formed but carries too
/// little geometric signal to normalize, and the caller moves on to the
/// next frame.
#[must_use = "inspect the outcome — a skipped frame carries its reason"]
pub enum StageOutcome<T> {
    /// The stage succeeded; processing continues with the next state.
    Advanced(T),
    /// The frame was skipped at this stage.
    Skipped(SkipReason),
}

impl<T> StageOutcome<T> {
    /// The next stage, if the frame was not skipped.
    pub fn advanced(self) -> Option<T> {
        match self {
            Self::Advanced(stage) => Some(stage),
            Self::Skipped(_) => None,
        }
    }

    /// The skip reason, if the frame was skipped.
    #[must_use]
    pub const fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Advanced(_) => None,
            Self::Skipped(reason) => Some(*reason),
        }
    }
}

/// All intermediates from a completed pipeline run.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Otsu-binarized frame (profile 0, background 255).
    pub binary: GrayImage,
    /// Canny edge map of the binary frame.
    pub edges: GrayImage,
    /// The automatically selected Otsu threshold.
    pub otsu_level: u8,
    /// Parametrized lines from the detector, before deduplication.
    pub lines: Vec<Line>,
    /// The two flank lines surviving deduplication.
    pub reduced: [Line; 2],
    /// Reference triangle over the bead profile.
    pub triangle: Triangle,
    /// Profile coordinates surviving both outlier filters.
    pub filtered: Vec<Point>,
    /// The canonical 300×300 output image.
    pub canonical: GrayImage,
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source frame and config are stored but not yet touched. Call
/// [`segment`](Self::segment) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .segment() to continue"]
pub struct Pending {
    config: PipelineConfig,
    frame: DynamicImage,
}

impl Pending {
    /// The source frame.
    #[must_use]
    pub const fn frame(&self) -> &DynamicImage {
        &self.frame
    }

    /// Binarize the frame and advance to the [`Segmented`] stage.
    ///
    /// Converts to grayscale, selects an Otsu threshold, extracts the
    /// foreground coordinates, and computes the Canny edge map.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration
    /// fails validation, or [`PipelineError::EmptyFrame`] if the frame
    /// has zero width or height.
    pub fn segment(self) -> Result<Segmented, PipelineError> {
        self.config.validate()?;
        let gray = self.frame.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(PipelineError::EmptyFrame);
        }
        let (binary, otsu_level) = crate::segment::binarize(&gray);
        let coords = crate::segment::extract_coordinates(&binary);
        let edges = crate::segment::edge_map(&binary, self.config.canny_low, self.config.canny_high);
        Ok(Segmented {
            config: self.config,
            binary,
            edges,
            coords,
            otsu_level,
        })
    }
}

// ───────────────────────── Stage 1: Segmented ────────────────────────

/// Pipeline state after Otsu binarization and edge mapping.
///
/// Call [`detect_lines`](Self::detect_lines) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing — call .detect_lines() to continue"]
pub struct Segmented {
    config: PipelineConfig,
    binary: GrayImage,
    edges: GrayImage,
    coords: Vec<Point>,
    otsu_level: u8,
}

impl Segmented {
    /// The binarized frame.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// The Canny edge map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Foreground (profile) coordinates in scan order.
    #[must_use]
    pub fn coordinates(&self) -> &[Point] {
        &self.coords
    }

    /// The automatically selected Otsu threshold.
    #[must_use]
    pub const fn otsu_level(&self) -> u8 {
        self.otsu_level
    }

    /// Run line detection and advance to the [`LinesDetected`] stage.
    ///
    /// Detected segments are parametrized into [`Line`]s; vertical
    /// segments are discarded since their slope is undefined. Skips the
    /// frame when fewer than two lines remain.
    pub fn detect_lines(self) -> StageOutcome<LinesDetected> {
        let segments = crate::hough::detect_segments(
            &self.edges,
            self.config.vote_threshold,
            self.config.min_line_length,
            self.config.max_line_gap,
        );
        let lines: Vec<Line> = segments
            .iter()
            .filter_map(|s| Line::from_endpoints(s.x1, s.y1, s.x2, s.y2))
            .collect();
        match lines.len() {
            0 => StageOutcome::Skipped(SkipReason::NoLines),
            1 => StageOutcome::Skipped(SkipReason::SingleLine),
            _ => StageOutcome::Advanced(LinesDetected {
                config: self.config,
                binary: self.binary,
                edges: self.edges,
                coords: self.coords,
                otsu_level: self.otsu_level,
                segments,
                lines,
            }),
        }
    }
}

// ───────────────────────── Stage 2: LinesDetected ────────────────────

/// Pipeline state after line detection and parametrization.
///
/// Call [`reduce`](Self::reduce) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .reduce() to continue"]
pub struct LinesDetected {
    config: PipelineConfig,
    binary: GrayImage,
    edges: GrayImage,
    coords: Vec<Point>,
    otsu_level: u8,
    segments: Vec<HoughSegment>,
    lines: Vec<Line>,
}

impl LinesDetected {
    /// The parametrized lines, in detection order.
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// The raw detector segments, before vertical-segment filtering.
    #[must_use]
    pub fn segments(&self) -> &[HoughSegment] {
        &self.segments
    }

    /// Deduplicate near-parallel lines and advance to the
    /// [`LinesReduced`] stage.
    ///
    /// Skips the frame unless exactly two lines remain: one per weld
    /// flank.
    pub fn reduce(self) -> StageOutcome<LinesReduced> {
        let reduced = crate::reduce::reduce_lines(&self.lines, self.config.angular_threshold);
        match *reduced.as_slice() {
            [first, second] => StageOutcome::Advanced(LinesReduced {
                config: self.config,
                binary: self.binary,
                edges: self.edges,
                coords: self.coords,
                otsu_level: self.otsu_level,
                lines: self.lines,
                reduced: [first, second],
            }),
            _ => StageOutcome::Skipped(SkipReason::AmbiguousLineCount {
                count: reduced.len(),
            }),
        }
    }
}

// ───────────────────────── Stage 3: LinesReduced ─────────────────────

/// Pipeline state after near-parallel line deduplication.
///
/// Exactly two flank lines remain. Call
/// [`build_geometry`](Self::build_geometry) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing — call .build_geometry() to continue"]
pub struct LinesReduced {
    config: PipelineConfig,
    binary: GrayImage,
    edges: GrayImage,
    coords: Vec<Point>,
    otsu_level: u8,
    lines: Vec<Line>,
    reduced: [Line; 2],
}

impl LinesReduced {
    /// The two flank lines, in detection order.
    #[must_use]
    pub const fn reduced(&self) -> &[Line; 2] {
        &self.reduced
    }

    /// Build the reference geometry and advance to the
    /// [`GeometryBuilt`] stage.
    ///
    /// Intersects the flank lines, filters the profile by radius and by
    /// signed distance to the reference triangle. Skips the frame on a
    /// degenerate (near-parallel) intersection or when no profile points
    /// survive.
    pub fn build_geometry(self) -> StageOutcome<GeometryBuilt> {
        let built = crate::geometry::build(
            &self.coords,
            &self.reduced[0],
            &self.reduced[1],
            self.config.radius_threshold,
            self.config.polygon_threshold,
            self.config.slope_epsilon,
        );
        match built {
            Ok(geometry) => StageOutcome::Advanced(GeometryBuilt {
                binary: self.binary,
                edges: self.edges,
                otsu_level: self.otsu_level,
                lines: self.lines,
                reduced: self.reduced,
                geometry,
            }),
            Err(reason) => StageOutcome::Skipped(reason),
        }
    }
}

// ───────────────────────── Stage 4: GeometryBuilt ────────────────────

/// Pipeline state after reference geometry construction and outlier
/// filtering.
///
/// Call [`canonicalize`](Self::canonicalize) to advance to the final
/// stage.
#[must_use = "pipeline stages are consumed by advancing — call .canonicalize() to continue"]
pub struct GeometryBuilt {
    binary: GrayImage,
    edges: GrayImage,
    otsu_level: u8,
    lines: Vec<Line>,
    reduced: [Line; 2],
    geometry: ReferenceGeometry,
}

impl GeometryBuilt {
    /// The reference triangle.
    #[must_use]
    pub const fn triangle(&self) -> &Triangle {
        &self.geometry.triangle
    }

    /// The profile coordinates surviving both filters.
    #[must_use]
    pub fn filtered(&self) -> &[Point] {
        &self.geometry.filtered
    }

    /// Render the canonical image — the final pipeline step.
    pub fn canonicalize(self) -> Canonicalized {
        let canonical =
            crate::canonical::canonicalize(&self.geometry.filtered, &self.geometry.triangle);
        Canonicalized {
            binary: self.binary,
            edges: self.edges,
            otsu_level: self.otsu_level,
            lines: self.lines,
            reduced: self.reduced,
            geometry: self.geometry,
            canonical,
        }
    }
}

// ───────────────────────── Stage 5: Canonicalized ────────────────────

/// Pipeline state after canonicalization — the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Canonicalized {
    binary: GrayImage,
    edges: GrayImage,
    otsu_level: u8,
    lines: Vec<Line>,
    reduced: [Line; 2],
    geometry: ReferenceGeometry,
    canonical: GrayImage,
}

impl Canonicalized {
    /// The canonical 300×300 image.
    #[must_use]
    pub const fn canonical(&self) -> &GrayImage {
        &self.canonical
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            binary: self.binary,
            edges: self.edges,
            otsu_level: self.otsu_level,
            lines: self.lines,
            reduced: self.reduced,
            triangle: self.geometry.triangle,
            filtered: self.geometry.filtered,
            canonical: self.canonical,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental frame normalization pipeline.
///
/// Created via [`Pipeline::new`], which stores the source frame and
/// config without doing any processing. The caller then chains stage
/// methods to advance through the pipeline; each method consumes the
/// current state and returns the next, making it a compile-time error to
/// skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a decoded frame and config.
    ///
    /// No processing is performed — the frame and config are simply
    /// stored. Call [`.segment()`](Pending::segment) to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(frame: DynamicImage, config: PipelineConfig) -> Pending {
        Pending { config, frame }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 400×400 white frame with a dark V: two 3px-thick arms meeting at
    /// (200, 200), descending at 45° to the lower-left and lower-right.
    fn vee_frame() -> DynamicImage {
        let mut frame = image::GrayImage::from_pixel(400, 400, image::Luma([235]));
        let mut stroke = |x: i32, y: i32| {
            for dx in -1..=1 {
                let (px, py) = (x + dx, y);
                if (0..400).contains(&px) && (0..400).contains(&py) {
                    #[allow(clippy::cast_sign_loss)]
                    frame.put_pixel(px as u32, py as u32, image::Luma([20]));
                }
            }
        };
        for i in 0..=140 {
            stroke(200 - i, 200 + i);
            stroke(200 + i, 200 + i);
        }
        DynamicImage::ImageLuma8(frame)
    }

    /// 400×400 white frame with a single 3px-thick diagonal line.
    fn single_line_frame() -> DynamicImage {
        let mut frame = image::GrayImage::from_pixel(400, 400, image::Luma([235]));
        for i in 50..350 {
            for dx in -1..=1_i32 {
                #[allow(clippy::cast_sign_loss)]
                frame.put_pixel((i + dx) as u32, i as u32, image::Luma([20]));
            }
        }
        DynamicImage::ImageLuma8(frame)
    }

    #[test]
    fn zero_sized_frame_is_an_error() {
        let frame = DynamicImage::ImageLuma8(image::GrayImage::new(0, 0));
        let result = Pipeline::new(frame, PipelineConfig::default()).segment();
        assert!(matches!(result, Err(PipelineError::EmptyFrame)));
    }

    #[test]
    fn invalid_config_is_rejected_at_segment() {
        let config = PipelineConfig {
            radius_threshold: -1.0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(vee_frame(), config).segment();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn segmented_exposes_intermediates() {
        let segmented = Pipeline::new(vee_frame(), PipelineConfig::default())
            .segment()
            .unwrap();
        assert_eq!(segmented.binary().width(), 400);
        assert!(!segmented.coordinates().is_empty());
        assert!(segmented.otsu_level() >= 20);
    }

    #[test]
    fn blank_frame_skips_with_no_lines() {
        let frame = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            400,
            400,
            image::Luma([235]),
        ));
        let outcome = Pipeline::new(frame, PipelineConfig::default())
            .segment()
            .unwrap()
            .detect_lines();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::NoLines));
    }

    #[test]
    fn single_flank_skips_during_reduction() {
        // A lone thick line yields two parallel border lines, which the
        // reducer collapses to one — not the two flanks geometry needs.
        let detected = Pipeline::new(single_line_frame(), PipelineConfig::default())
            .segment()
            .unwrap()
            .detect_lines()
            .advanced()
            .unwrap();
        let outcome = detected.reduce();
        assert_eq!(
            outcome.skip_reason(),
            Some(SkipReason::AmbiguousLineCount { count: 1 }),
        );
    }

    #[test]
    fn vee_reduces_to_exactly_two_flanks() {
        let reduced = Pipeline::new(vee_frame(), PipelineConfig::default())
            .segment()
            .unwrap()
            .detect_lines()
            .advanced()
            .unwrap()
            .reduce()
            .advanced()
            .unwrap();
        let [first, second] = *reduced.reduced();
        let spread = crate::reduce::angle_difference(first.theta, second.theta);
        assert!(spread > 1.0, "flank angle spread {spread} too small");
    }

    #[test]
    fn vee_geometry_intersects_near_the_apex() {
        let geometry = Pipeline::new(vee_frame(), PipelineConfig::default())
            .segment()
            .unwrap()
            .detect_lines()
            .advanced()
            .unwrap()
            .reduce()
            .advanced()
            .unwrap()
            .build_geometry()
            .advanced()
            .unwrap();
        let apex = geometry.triangle().intersection;
        assert!((apex.x - 200).abs() <= 6, "apex x = {}", apex.x);
        assert!((apex.y - 200).abs() <= 6, "apex y = {}", apex.y);
        assert!(!geometry.filtered().is_empty());
    }

    #[test]
    fn vee_canonicalizes_into_the_canvas() {
        let result = Pipeline::new(vee_frame(), PipelineConfig::default())
            .segment()
            .unwrap()
            .detect_lines()
            .advanced()
            .unwrap()
            .reduce()
            .advanced()
            .unwrap()
            .build_geometry()
            .advanced()
            .unwrap()
            .canonicalize()
            .into_result();
        assert_eq!(result.canonical.width(), crate::canonical::CANVAS_SIZE);
        assert_eq!(result.canonical.height(), crate::canonical::CANVAS_SIZE);
        let profile: u32 = result
            .canonical
            .pixels()
            .map(|p| u32::from(p.0[0] == crate::canonical::PROFILE))
            .sum();
        assert!(profile > 100, "only {profile} profile pixels rendered");
    }

    #[test]
    fn staged_result_carries_all_intermediates() {
        let result = Pipeline::new(vee_frame(), PipelineConfig::default())
            .segment()
            .unwrap()
            .detect_lines()
            .advanced()
            .unwrap()
            .reduce()
            .advanced()
            .unwrap()
            .build_geometry()
            .advanced()
            .unwrap()
            .canonicalize()
            .into_result();
        assert!(result.lines.len() >= 2);
        assert!(!result.filtered.is_empty());
        assert_eq!(result.binary.dimensions(), (400, 400));
        assert_eq!(result.edges.dimensions(), (400, 400));
    }

    #[test]
    fn stage_outcome_accessors() {
        let advanced: StageOutcome<u32> = StageOutcome::Advanced(7);
        assert_eq!(advanced.skip_reason(), None);
        let skipped: StageOutcome<u32> = StageOutcome::Skipped(SkipReason::NoLines);
        assert_eq!(skipped.skip_reason(), Some(SkipReason::NoLines));
        assert!(skipped.advanced().is_none());
    }
}
