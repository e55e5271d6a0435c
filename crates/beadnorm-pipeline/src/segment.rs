//! Frame segmentation: Otsu binarization, foreground coordinate
//! extraction, and Canny edge mapping.
//!
//! Wraps [`imageproc::contrast::otsu_level`] and
//! [`imageproc::edges::canny`]. The binary image encodes the laser
//! profile as 0 (black) on a 255 (white) background; the edge map is a
//! separate artifact consumed only by line detection.

use image::GrayImage;
use imageproc::contrast::ThresholdType;

use crate::types::Point;

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero treats every pixel with any gradient as a
/// potential edge, flooding the Hough accumulator with noise.
pub const MIN_CANNY_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_CANNY_THRESHOLD > 0.0);

/// Binarize a grayscale frame with an automatically selected threshold.
///
/// Otsu's method picks the level minimizing intra-class intensity
/// variance. Pixels above the level become 255 (background), pixels at
/// or below it become 0 (profile). Returns the binary image together
/// with the selected level for diagnostics.
#[must_use = "returns the binary image and the selected threshold"]
pub fn binarize(gray: &GrayImage) -> (GrayImage, u8) {
    let level = imageproc::contrast::otsu_level(gray);
    let binary = imageproc::contrast::threshold(gray, level, ThresholdType::Binary);
    (binary, level)
}

/// Extract foreground pixel coordinates from a binary image.
///
/// Scans in row-major order and collects every position with value 0,
/// swapping raster (row, column) into image (x, y) pairs. The scan order
/// is preserved in the output.
#[must_use = "returns the foreground coordinates"]
pub fn extract_coordinates(binary: &GrayImage) -> Vec<Point> {
    let mut coords = Vec::new();
    for (x, y, pixel) in binary.enumerate_pixels() {
        if pixel.0[0] == 0 {
            #[allow(clippy::cast_possible_wrap)]
            coords.push(Point::new(x as i32, y as i32));
        }
    }
    coords
}

/// Detect edges in the binary image using the Canny algorithm.
///
/// Both thresholds are clamped to a minimum of [`MIN_CANNY_THRESHOLD`]
/// and the low threshold is clamped to be at most the high threshold.
/// Returns a binary edge map: 255 for edge pixels, 0 for non-edge.
///
/// The edge map feeds line detection only; foreground coordinates come
/// from [`extract_coordinates`] on the binary image, not from here.
#[must_use = "returns the binary edge map"]
pub fn edge_map(binary: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_CANNY_THRESHOLD);
    let low = low_threshold.max(MIN_CANNY_THRESHOLD).min(high);
    imageproc::edges::canny(binary, low, high)
}
