//! Reference geometry: line intersection, outlier rejection, and the
//! bounding triangle over the bead profile.
//!
//! Two filters run in sequence: a coarse radius filter around the flank
//! intersection, then a precise signed-distance filter against the
//! triangle spanned by the intersection and the two profile extremities.

use crate::types::{Line, Point, SkipReason, Triangle};

/// The reference triangle plus the profile points that survived both
/// filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceGeometry {
    /// Bounding triangle over the bead profile.
    pub triangle: Triangle,
    /// Radius- and polygon-filtered profile coordinates.
    pub filtered: Vec<Point>,
}

/// Intersection of two non-parallel lines, in sub-pixel coordinates.
///
/// Solves `xi = (c2 - c1) / (m1 - m2)`, `yi = m1·xi + c1`. Returns `None`
/// when the slopes differ by less than `slope_epsilon`: near-parallel
/// lines have no stable intersection and the division would blow up.
#[must_use]
pub fn intersection(first: &Line, second: &Line, slope_epsilon: f64) -> Option<(f64, f64)> {
    if (first.m - second.m).abs() < slope_epsilon {
        return None;
    }
    let xi = (second.c - first.c) / (first.m - second.m);
    let yi = first.m.mul_add(xi, first.c);
    Some((xi, yi))
}

/// Keep points strictly within `radius` of a sub-pixel center.
#[must_use = "returns the surviving points"]
pub fn filter_by_radius(coords: &[Point], center: (f64, f64), radius: f64) -> Vec<Point> {
    coords
        .iter()
        .copied()
        .filter(|p| p.distance_to(center.0, center.1) < radius)
        .collect()
}

/// The two outer extremities of the profile along the diagonal axes.
///
/// Returns `(lower_left, lower_right)` where the lower-left point
/// minimizes `x - y` and the lower-right point maximizes `x + y`, or
/// `None` for an empty set. Ties resolve to the earliest point in scan
/// order, matching a linear argmin/argmax.
#[must_use]
pub fn extremities(coords: &[Point]) -> Option<(Point, Point)> {
    let lower_left = coords.iter().copied().reduce(|best, p| {
        if p.x - p.y < best.x - best.y {
            p
        } else {
            best
        }
    })?;
    let lower_right = coords.iter().copied().reduce(|best, p| {
        if p.x + p.y > best.x + best.y {
            p
        } else {
            best
        }
    })?;
    Some((lower_left, lower_right))
}

/// Signed distance from a point to the triangle boundary.
///
/// Positive inside, negative outside, zero on an edge; the magnitude is
/// the minimal Euclidean distance to the three edges.
#[must_use]
pub fn signed_distance(point: Point, triangle: &Triangle) -> f64 {
    let p = (f64::from(point.x), f64::from(point.y));
    let a = vertex(triangle.intersection);
    let b = vertex(triangle.lower_left);
    let c = vertex(triangle.lower_right);

    let distance = point_segment_distance(p, a, b)
        .min(point_segment_distance(p, b, c))
        .min(point_segment_distance(p, c, a));

    if distance == 0.0 {
        0.0
    } else if inside_triangle(p, a, b, c) {
        distance
    } else {
        -distance
    }
}

/// Keep points inside the triangle, or outside within `threshold` of its
/// boundary.
#[must_use = "returns the surviving points"]
pub fn filter_by_triangle(coords: &[Point], triangle: &Triangle, threshold: f64) -> Vec<Point> {
    coords
        .iter()
        .copied()
        .filter(|&p| {
            let d = signed_distance(p, triangle);
            d > 0.0 || d.abs() <= threshold
        })
        .collect()
}

/// Build the reference geometry from the two flank lines and the
/// foreground coordinates.
///
/// Runs the full stage: intersection (with the parallel-slope guard),
/// coarse radius filter, extremity search, triangle construction, and
/// the precise polygon filter.
///
/// # Errors
///
/// Returns the [`SkipReason`] terminating the frame: near-parallel lines,
/// or an empty point set after either filter.
pub fn build(
    coords: &[Point],
    first: &Line,
    second: &Line,
    radius_threshold: f64,
    polygon_threshold: f64,
    slope_epsilon: f64,
) -> Result<ReferenceGeometry, SkipReason> {
    let (xi, yi) =
        intersection(first, second, slope_epsilon).ok_or(SkipReason::DegenerateIntersection)?;

    let near_intersection = filter_by_radius(coords, (xi, yi), radius_threshold);
    let (lower_left, lower_right) =
        extremities(&near_intersection).ok_or(SkipReason::EmptyProfile)?;

    #[allow(clippy::cast_possible_truncation)]
    let triangle = Triangle {
        intersection: Point::new(xi as i32, yi as i32),
        lower_left,
        lower_right,
    };

    let filtered = filter_by_triangle(&near_intersection, &triangle, polygon_threshold);
    if filtered.is_empty() {
        return Err(SkipReason::EmptyProfile);
    }

    Ok(ReferenceGeometry { triangle, filtered })
}

fn vertex(p: Point) -> (f64, f64) {
    (f64::from(p.x), f64::from(p.y))
}

/// Distance from `p` to the segment `ab`.
fn point_segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let ab_len_sq = abx.mul_add(abx, aby * aby);
    if ab_len_sq == 0.0 {
        return apx.hypot(apy);
    }
    let t = (apx.mul_add(abx, apy * aby) / ab_len_sq).clamp(0.0, 1.0);
    (p.0 - t.mul_add(abx, a.0)).hypot(p.1 - t.mul_add(aby, a.1))
}

/// Strict point-in-triangle test via edge orientation consistency.
///
/// Works for either winding order; boundary points report `false` (they
/// are handled by the zero-distance case in [`signed_distance`]).
fn inside_triangle(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let d1 = cross(p, a, b);
    let d2 = cross(p, b, c);
    let d3 = cross(p, c, a);
    let has_negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_negative && has_positive)
}

/// Cross product of `(b - a) × (p - a)`.
fn cross(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.0 - a.0).mul_add(p.1 - a.1, -((b.1 - a.1) * (p.0 - a.0)))
}
