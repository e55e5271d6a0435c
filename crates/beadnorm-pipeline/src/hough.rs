//! Progressive probabilistic Hough transform over a binary edge map.
//!
//! Produces line segments (endpoints) rather than infinite lines. The
//! classic formulation visits edge pixels in random order; here the visit
//! order is a keyed SipHash shuffle of the pixel coordinates, so the
//! detector is fully deterministic for a given frame while keeping the
//! spatially-unbiased sampling the algorithm relies on.
//!
//! Angular resolution is fixed at π/180 (one accumulator bin per degree).
//! The vote threshold, minimum segment length, and maximum in-segment gap
//! come from the pipeline configuration.

use std::hash::Hasher;

use image::GrayImage;
use siphasher::sip::SipHasher13;

/// Number of accumulator angle bins (π / (π/180) over the half-turn).
const NUM_ANGLES: usize = 180;

/// Fixed keys for the visit-order shuffle. Any constant works; these only
/// decouple the order from the raster scan so collinear runs do not
/// self-reinforce.
const SHUFFLE_KEYS: (u64, u64) = (0x6265_6164_6e6f_726d, 0x7765_6c64_6265_6164);

/// A detected line segment, endpoint form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoughSegment {
    /// First endpoint, x.
    pub x1: i32,
    /// First endpoint, y.
    pub y1: i32,
    /// Second endpoint, x.
    pub x2: i32,
    /// Second endpoint, y.
    pub y2: i32,
}

impl HoughSegment {
    /// Euclidean length of the segment.
    #[must_use]
    pub fn length(&self) -> f64 {
        f64::from(self.x2 - self.x1).hypot(f64::from(self.y2 - self.y1))
    }
}

/// Detect line segments in a binary edge map.
///
/// Edge pixels (value > 0) are visited in shuffled order. Each unclaimed
/// pixel votes across all angle bins; when its best bin reaches
/// `vote_threshold`, the corresponding line is walked through the pixel
/// in both directions, tolerating up to `max_line_gap` consecutive
/// missing pixels. Walked pixels are removed from the pool (and their
/// votes retracted) whether or not the walk yields a segment of at least
/// `min_line_length` pixels.
#[must_use = "returns the detected line segments"]
pub fn detect_segments(
    edges: &GrayImage,
    vote_threshold: u32,
    min_line_length: u32,
    max_line_gap: u32,
) -> Vec<HoughSegment> {
    let width = edges.width() as usize;
    let height = edges.height() as usize;
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut mask = vec![false; width * height];
    let mut points: Vec<(i32, i32)> = Vec::new();
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel.0[0] > 0 {
            mask[y as usize * width + x as usize] = true;
            #[allow(clippy::cast_possible_wrap)]
            points.push((x as i32, y as i32));
        }
    }
    points.sort_by_key(|&(x, y)| (shuffle_key(x, y), x, y));

    let trig: Vec<(f64, f64)> = (0..NUM_ANGLES)
        .map(|a| {
            #[allow(clippy::cast_precision_loss)]
            let theta = a as f64 * std::f64::consts::PI / 180.0;
            (theta.cos(), theta.sin())
        })
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let max_rho = (width as f64).hypot(height as f64).ceil() as i32;
    let num_rho = (2 * max_rho + 1) as usize;
    let mut accumulator = vec![0_i64; NUM_ANGLES * num_rho];
    let mut voted = vec![false; width * height];

    let mut segments = Vec::new();

    for &(x, y) in &points {
        #[allow(clippy::cast_sign_loss)]
        let seed_index = y as usize * width + x as usize;
        if !mask[seed_index] {
            continue;
        }

        // Vote across every angle bin, tracking the strongest.
        voted[seed_index] = true;
        let mut best_votes = 0_i64;
        let mut best_angle = 0_usize;
        for (a, &(cos_t, sin_t)) in trig.iter().enumerate() {
            let bin = rho_bin(x, y, cos_t, sin_t, max_rho, num_rho);
            accumulator[a * num_rho + bin] += 1;
            if accumulator[a * num_rho + bin] > best_votes {
                best_votes = accumulator[a * num_rho + bin];
                best_angle = a;
            }
        }
        if best_votes < i64::from(vote_threshold) {
            continue;
        }

        // Walk the supporting pixels along the line through (x, y).
        // Direction along the line x·cosθ + y·sinθ = ρ is (-sinθ, cosθ).
        let (cos_t, sin_t) = trig[best_angle];
        let (dx, dy) = (-sin_t, cos_t);
        let (step_x, step_y) = if dx.abs() > dy.abs() {
            (dx.signum(), dy / dx.abs())
        } else {
            (dx / dy.abs(), dy.signum())
        };

        let mut corridor: Vec<(i32, i32)> = vec![(x, y)];
        let mut ends = [(x, y); 2];
        for (direction, end) in [(1.0, 0), (-1.0, 1)] {
            let mut fx = f64::from(x);
            let mut fy = f64::from(y);
            let mut gap = 0_u32;
            loop {
                fx += step_x * direction;
                fy += step_y * direction;
                #[allow(clippy::cast_possible_truncation)]
                let (px, py) = (fx.round() as i32, fy.round() as i32);
                if px < 0 || py < 0 {
                    break;
                }
                #[allow(clippy::cast_sign_loss)]
                let (ux, uy) = (px as usize, py as usize);
                if ux >= width || uy >= height {
                    break;
                }
                if mask[uy * width + ux] {
                    gap = 0;
                    ends[end] = (px, py);
                    corridor.push((px, py));
                } else {
                    gap += 1;
                    if gap > max_line_gap {
                        break;
                    }
                }
            }
        }

        // Claim the walked pixels and retract their votes so they cannot
        // seed or support another segment.
        for &(px, py) in &corridor {
            #[allow(clippy::cast_sign_loss)]
            let index = py as usize * width + px as usize;
            if !mask[index] {
                continue;
            }
            mask[index] = false;
            if voted[index] {
                for (a, &(c, s)) in trig.iter().enumerate() {
                    let bin = rho_bin(px, py, c, s, max_rho, num_rho);
                    accumulator[a * num_rho + bin] -= 1;
                }
            }
        }

        let segment = HoughSegment {
            x1: ends[1].0,
            y1: ends[1].1,
            x2: ends[0].0,
            y2: ends[0].1,
        };
        if segment.length() >= f64::from(min_line_length) {
            segments.push(segment);
        }
    }

    segments
}

/// Accumulator bin index for a point at a given angle.
fn rho_bin(x: i32, y: i32, cos_t: f64, sin_t: f64, max_rho: i32, num_rho: usize) -> usize {
    #[allow(clippy::cast_possible_truncation)]
    let rho = f64::from(x).mul_add(cos_t, f64::from(y) * sin_t).round() as i32;
    #[allow(clippy::cast_sign_loss)]
    let bin = (rho + max_rho).clamp(0, (num_rho - 1) as i32) as usize;
    bin
}

/// Deterministic shuffle key for an edge pixel.
fn shuffle_key(x: i32, y: i32) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(SHUFFLE_KEYS.0, SHUFFLE_KEYS.1);
    hasher.write_i32(x);
    hasher.write_i32(y);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> GrayImage {
        GrayImage::new(width, height)
    }

    fn set(edges: &mut GrayImage, x: i32, y: i32) {
        #[allow(clippy::cast_sign_loss)]
        edges.put_pixel(x as u32, y as u32, image::Luma([255]));
    }

    #[test]
    fn empty_edge_map_yields_no_segments() {
        let edges = blank(100, 100);
        assert!(detect_segments(&edges, 100, 100, 10).is_empty());
    }

    #[test]
    fn horizontal_line_is_detected() {
        let mut edges = blank(300, 100);
        for x in 20..260 {
            set(&mut edges, x, 50);
        }
        let segments = detect_segments(&edges, 100, 100, 10);
        assert_eq!(segments.len(), 1);
        let s = segments[0];
        assert!(s.length() >= 200.0, "length {} too short", s.length());
        assert_eq!(s.y1, 50);
        assert_eq!(s.y2, 50);
    }

    #[test]
    fn diagonal_line_is_detected() {
        let mut edges = blank(300, 300);
        for i in 20..260 {
            set(&mut edges, i, i);
        }
        let segments = detect_segments(&edges, 100, 100, 10);
        assert_eq!(segments.len(), 1);
        let s = segments[0];
        // Endpoints stay on the diagonal.
        assert_eq!(s.x1, s.y1);
        assert_eq!(s.x2, s.y2);
        assert!(s.length() >= 200.0);
    }

    #[test]
    fn short_line_is_rejected() {
        let mut edges = blank(300, 100);
        for x in 20..70 {
            set(&mut edges, x, 50);
        }
        // 50 supporting pixels: below both the vote threshold and the
        // minimum length.
        assert!(detect_segments(&edges, 100, 100, 10).is_empty());
    }

    #[test]
    fn gap_within_tolerance_is_bridged() {
        let mut edges = blank(400, 100);
        for x in 20..180 {
            set(&mut edges, x, 50);
        }
        // 5-pixel hole, then the line continues.
        for x in 185..350 {
            set(&mut edges, x, 50);
        }
        let segments = detect_segments(&edges, 100, 100, 10);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].length() >= 300.0);
    }

    #[test]
    fn crossing_lines_yield_two_segments() {
        let mut edges = blank(300, 300);
        for i in 10..290 {
            set(&mut edges, i, i);
            set(&mut edges, i, 299 - i);
        }
        let mut segments = detect_segments(&edges, 100, 100, 10);
        segments.sort_by_key(|s| (s.x1, s.y1));
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn detection_is_deterministic() {
        let mut edges = blank(300, 300);
        for i in 10..290 {
            set(&mut edges, i, i);
            set(&mut edges, i, 299 - i);
        }
        let first = detect_segments(&edges, 100, 100, 10);
        let second = detect_segments(&edges, 100, 100, 10);
        assert_eq!(first, second);
    }

    #[test]
    fn segment_length() {
        let s = HoughSegment {
            x1: 0,
            y1: 0,
            x2: 3,
            y2: 4,
        };
        assert!((s.length() - 5.0).abs() < f64::EPSILON);
    }
}
