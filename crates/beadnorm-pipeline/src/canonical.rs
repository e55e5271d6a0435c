//! Canonicalization: translate, rotate, and offset the filtered profile
//! into a fixed-size output canvas.
//!
//! The intersection point becomes the origin, the intersection→lower-left
//! vector is rotated onto the positive x-axis, and a fixed offset
//! re-centers the profile. The result is a fresh 300×300 image with a
//! white (255) background and black (0) profile pixels.

use image::GrayImage;

use crate::types::{Point, Triangle};

/// Output canvas side length, in pixels.
pub const CANVAS_SIZE: u32 = 300;

/// Horizontal offset of the new origin inside the canvas.
pub const OFFSET_X: i32 = 50;

/// Vertical offset of the new origin inside the canvas.
pub const OFFSET_Y: i32 = 250;

/// Background value of the canvas.
pub const BACKGROUND: u8 = 255;

/// Profile value of the canvas.
pub const PROFILE: u8 = 0;

/// Rotate a point around the origin, truncating to integer coordinates.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rotate_point(x: i32, y: i32, angle_rad: f64) -> (i32, i32) {
    let (sin, cos) = angle_rad.sin_cos();
    let new_x = f64::from(x).mul_add(cos, -(f64::from(y) * sin));
    let new_y = f64::from(x).mul_add(sin, f64::from(y) * cos);
    (new_x as i32, new_y as i32)
}

/// Render the filtered profile into the canonical canvas.
///
/// Every point is translated so `triangle.intersection` is the origin,
/// rotated by the negated angle of the intersection→lower-left vector,
/// then shifted by ([`OFFSET_X`], [`OFFSET_Y`]). Points landing outside
/// the canvas are silently dropped; the caller already decided the frame
/// is usable, and stray overflow must not fail it.
#[must_use = "returns the canonical image"]
pub fn canonicalize(filtered: &[Point], triangle: &Triangle) -> GrayImage {
    let Point { x: xi, y: yi } = triangle.intersection;
    let angle_rad = f64::from(triangle.lower_left.y - yi).atan2(f64::from(triangle.lower_left.x - xi));

    let mut canvas = GrayImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, image::Luma([BACKGROUND]));
    for point in filtered {
        let (rx, ry) = rotate_point(point.x - xi, point.y - yi, -angle_rad);
        let (cx, cy) = (rx + OFFSET_X, ry + OFFSET_Y);
        if in_canvas(cx) && in_canvas(cy) {
            #[allow(clippy::cast_sign_loss)]
            canvas.put_pixel(cx as u32, cy as u32, image::Luma([PROFILE]));
        }
    }
    canvas
}

/// Whether a transformed coordinate lands inside the canvas.
#[allow(clippy::cast_possible_wrap)]
const fn in_canvas(v: i32) -> bool {
    0 <= v && v < CANVAS_SIZE as i32
}
