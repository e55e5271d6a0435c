//! beadnorm-pipeline: Pure weld-profile normalization pipeline (sans-IO).
//!
//! Converts laser profile frames into canonical, orientation-free
//! 300×300 binary images through:
//! Otsu binarization -> Canny edges -> probabilistic Hough lines ->
//! angular deduplication -> reference geometry + outlier filtering ->
//! rotation-origin canonicalization.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and decoded frames and returns structured data. File
//! handling lives in the `beadnorm` CLI.
//!
//! A frame that carries too little geometric signal is *skipped*, not
//! failed: [`process`] returns [`FrameOutcome::Skipped`] with a
//! [`SkipReason`], and only precondition violations (empty input, decode
//! failures, invalid config) surface as [`PipelineError`].

pub mod canonical;
pub mod diagnostics;
pub mod geometry;
pub mod hough;
pub mod pipeline;
pub mod reduce;
pub mod segment;
pub mod types;

pub use pipeline::{Pipeline, StageOutcome, StagedResult};
pub use types::{
    FrameOutcome, GrayImage, Line, PipelineConfig, PipelineError, Point, SkipReason, Triangle,
};

use image::DynamicImage;

/// Run the full normalization pipeline on raw frame bytes.
///
/// Takes encoded image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// and produces a [`FrameOutcome`]: either the canonical 300×300 profile
/// image or the reason the frame was skipped.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the format is unrecognized, and
/// [`PipelineError::InvalidConfig`] / [`PipelineError::EmptyFrame`] as
/// [`process_frame`] does.
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<FrameOutcome, PipelineError> {
    if image_bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let frame = image::load_from_memory(image_bytes)?;
    process_frame(&frame, config)
}

/// Run the full normalization pipeline on an already-decoded frame.
///
/// # Pipeline steps
///
/// 1. Grayscale conversion and Otsu binarization
/// 2. Foreground coordinate extraction
/// 3. Canny edge map and probabilistic Hough line detection
/// 4. Near-parallel line deduplication (exactly two flanks must remain)
/// 5. Flank intersection, radius filter, reference triangle, polygon filter
/// 6. Canonical rendering (translate, rotate, offset)
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration fails
/// validation and [`PipelineError::EmptyFrame`] if the frame has zero
/// width or height.
pub fn process_frame(
    frame: &DynamicImage,
    config: &PipelineConfig,
) -> Result<FrameOutcome, PipelineError> {
    config.validate()?;

    // 1. Grayscale + Otsu binarization.
    let gray = frame.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PipelineError::EmptyFrame);
    }
    let (binary, _otsu_level) = segment::binarize(&gray);
    let coords = segment::extract_coordinates(&binary);

    // 2. Canny edge map and line detection.
    let edges = segment::edge_map(&binary, config.canny_low, config.canny_high);
    let segments = hough::detect_segments(
        &edges,
        config.vote_threshold,
        config.min_line_length,
        config.max_line_gap,
    );
    let lines: Vec<Line> = segments
        .iter()
        .filter_map(|s| Line::from_endpoints(s.x1, s.y1, s.x2, s.y2))
        .collect();
    match lines.len() {
        0 => return Ok(FrameOutcome::Skipped(SkipReason::NoLines)),
        1 => return Ok(FrameOutcome::Skipped(SkipReason::SingleLine)),
        _ => {}
    }

    // 3. Deduplicate near-parallel lines; exactly two flanks must remain.
    let reduced = reduce::reduce_lines(&lines, config.angular_threshold);
    let (first, second) = match *reduced.as_slice() {
        [first, second] => (first, second),
        _ => {
            return Ok(FrameOutcome::Skipped(SkipReason::AmbiguousLineCount {
                count: reduced.len(),
            }));
        }
    };

    // 4. Reference geometry and outlier filtering.
    let geometry = match geometry::build(
        &coords,
        &first,
        &second,
        config.radius_threshold,
        config.polygon_threshold,
        config.slope_epsilon,
    ) {
        Ok(geometry) => geometry,
        Err(reason) => return Ok(FrameOutcome::Skipped(reason)),
    };

    // 5. Canonical rendering.
    let canonical = canonical::canonicalize(&geometry.filtered, &geometry.triangle);
    Ok(FrameOutcome::Canonical(canonical))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::canonical::{BACKGROUND, CANVAS_SIZE, OFFSET_X, OFFSET_Y, PROFILE};

    /// Encode a grayscale frame as PNG bytes.
    fn encode_png(frame: &image::GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            frame.as_raw(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    /// 400×400 white frame with a dark V: two 3px-thick arms meeting at
    /// (200, 200), descending at 45° to the lower-left and lower-right.
    fn vee_frame() -> image::GrayImage {
        let mut frame = image::GrayImage::from_pixel(400, 400, image::Luma([235]));
        for i in 0..=140_i32 {
            for dx in -1..=1_i32 {
                #[allow(clippy::cast_sign_loss)]
                frame.put_pixel((200 - i + dx) as u32, (200 + i) as u32, image::Luma([20]));
                #[allow(clippy::cast_sign_loss)]
                frame.put_pixel((200 + i + dx) as u32, (200 + i) as u32, image::Luma([20]));
            }
        }
        frame
    }

    #[allow(clippy::cast_possible_wrap)]
    fn profile_pixels(canonical: &GrayImage) -> Vec<(i32, i32)> {
        canonical
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == PROFILE)
            .map(|(x, y, _)| (x as i32, y as i32))
            .collect()
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_rejects_invalid_config() {
        let config = PipelineConfig {
            angular_threshold: f64::NAN,
            ..PipelineConfig::default()
        };
        let png = encode_png(&vee_frame());
        assert!(matches!(
            process(&png, &config),
            Err(PipelineError::InvalidConfig(_)),
        ));
    }

    #[test]
    fn process_blank_frame_skips_with_no_lines() {
        let blank = image::GrayImage::from_pixel(400, 400, image::Luma([235]));
        let outcome = process(&encode_png(&blank), &PipelineConfig::default()).unwrap();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::NoLines));
    }

    #[test]
    fn process_single_flank_skips() {
        // A lone thick diagonal: its two border lines collapse to one.
        let mut frame = image::GrayImage::from_pixel(400, 400, image::Luma([235]));
        for i in 50..350_i32 {
            for dx in -1..=1 {
                #[allow(clippy::cast_sign_loss)]
                frame.put_pixel((i + dx) as u32, i as u32, image::Luma([20]));
            }
        }
        let outcome = process(&encode_png(&frame), &PipelineConfig::default()).unwrap();
        assert!(matches!(
            outcome.skip_reason(),
            Some(SkipReason::AmbiguousLineCount { count: 1 }),
        ));
    }

    #[test]
    fn process_vee_produces_canonical_frame() {
        let outcome = process(&encode_png(&vee_frame()), &PipelineConfig::default()).unwrap();
        let canonical = outcome.canonical().unwrap();
        assert_eq!(canonical.width(), CANVAS_SIZE);
        assert_eq!(canonical.height(), CANVAS_SIZE);
        assert!(canonical
            .pixels()
            .all(|p| p.0[0] == PROFILE || p.0[0] == BACKGROUND));
    }

    #[test]
    fn canonical_apex_sits_at_the_offset_origin() {
        let outcome = process(&encode_png(&vee_frame()), &PipelineConfig::default()).unwrap();
        let pixels = profile_pixels(outcome.canonical().unwrap());
        // A profile pixel within a few pixels of (50, 250): the apex.
        assert!(
            pixels
                .iter()
                .any(|&(x, y)| (x - OFFSET_X).abs() <= 4 && (y - OFFSET_Y).abs() <= 4),
            "no profile pixel near the offset origin",
        );
    }

    #[test]
    fn canonical_lower_left_arm_lies_along_the_offset_row() {
        let outcome = process(&encode_png(&vee_frame()), &PipelineConfig::default()).unwrap();
        let pixels = profile_pixels(outcome.canonical().unwrap());
        // The lower-left arm is rotated onto the +x axis: far profile
        // pixels on the row y ≈ 250.
        assert!(
            pixels
                .iter()
                .any(|&(x, y)| x >= 200 && (y - OFFSET_Y).abs() <= 4),
            "lower-left arm did not land on the offset row",
        );
        // The second arm points away from it, toward the canvas top.
        assert!(
            pixels.iter().any(|&(x, y)| (x - OFFSET_X).abs() <= 6 && y <= 80),
            "second arm did not rotate toward the canvas top",
        );
    }

    #[test]
    fn process_is_deterministic() {
        let png = encode_png(&vee_frame());
        let config = PipelineConfig::default();
        let first = process(&png, &config).unwrap();
        let second = process(&png, &config).unwrap();
        assert_eq!(first.canonical().unwrap(), second.canonical().unwrap());
    }

    #[test]
    fn process_frame_matches_the_staged_pipeline() {
        let frame = DynamicImage::ImageLuma8(vee_frame());
        let config = PipelineConfig::default();

        let direct = process_frame(&frame, &config).unwrap();
        let staged = Pipeline::new(frame, config)
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

        assert_eq!(direct.canonical().unwrap(), &staged.canonical);
    }

    #[test]
    fn shifted_vee_normalizes_to_the_same_canvas_region() {
        // Translate the whole V by (30, -40): canonicalization removes
        // the offset, so the apex still lands at the offset origin.
        let mut shifted = image::GrayImage::from_pixel(400, 400, image::Luma([235]));
        for i in 0..=130_i32 {
            for dx in -1..=1 {
                #[allow(clippy::cast_sign_loss)]
                shifted.put_pixel((230 - i + dx) as u32, (160 + i) as u32, image::Luma([20]));
                #[allow(clippy::cast_sign_loss)]
                shifted.put_pixel((230 + i + dx) as u32, (160 + i) as u32, image::Luma([20]));
            }
        }
        let outcome = process(&encode_png(&shifted), &PipelineConfig::default()).unwrap();
        let pixels = profile_pixels(outcome.canonical().unwrap());
        assert!(
            pixels
                .iter()
                .any(|&(x, y)| (x - OFFSET_X).abs() <= 4 && (y - OFFSET_Y).abs() <= 4),
            "apex of the shifted vee did not land at the offset origin",
        );
    }
}
