//! Line deduplication: collapse near-parallel Hough segments into a
//! minimal representative set.
//!
//! The detector typically reports several segments per physical weld
//! flank (one per border of the thick laser trace, plus quantization
//! splits). Downstream geometry needs exactly one line per flank, so
//! candidates are folded in detection order and rejected when angularly
//! too close to an already-accepted line.

use crate::types::Line;

/// Minimal rotation distance between two direction angles, in [0, π].
///
/// Angles are normalized modulo 2π before differencing, then the
/// difference is folded onto the short way around the circle. Symmetric
/// in its arguments.
#[must_use]
pub fn angle_difference(theta1: f64, theta2: f64) -> f64 {
    let tau = 2.0 * std::f64::consts::PI;
    let diff = (theta1.rem_euclid(tau) - theta2.rem_euclid(tau)).abs();
    if diff > std::f64::consts::PI {
        tau - diff
    } else {
        diff
    }
}

/// Greedily deduplicate near-parallel lines.
///
/// Folds over `lines` in detection order, accepting a candidate only if
/// its [`angle_difference`] to every previously accepted line is at least
/// `angular_threshold`. Idempotent: reducing an already-reduced set
/// returns it unchanged.
#[must_use = "returns the deduplicated lines"]
pub fn reduce_lines(lines: &[Line], angular_threshold: f64) -> Vec<Line> {
    lines.iter().fold(Vec::new(), |mut accepted, candidate| {
        let near_existing = accepted
            .iter()
            .any(|kept: &Line| angle_difference(candidate.theta, kept.theta) < angular_threshold);
        if !near_existing {
            accepted.push(*candidate);
        }
        accepted
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::f64::consts::PI;

    fn line_with_theta(x2: i32, y2: i32) -> Line {
        Line::from_endpoints(0, 0, x2, y2).unwrap()
    }

    #[test]
    fn angle_difference_is_symmetric() {
        for (a, b) in [(0.1, 2.9), (-3.0, 3.0), (PI, -PI), (0.0, 6.0)] {
            assert!((angle_difference(a, b) - angle_difference(b, a)).abs() < 1e-12);
        }
    }

    #[test]
    fn angle_difference_is_bounded() {
        for a in [-6.0, -3.1, -1.0, 0.0, 0.5, 3.1, 6.0] {
            for b in [-6.0, -3.1, -1.0, 0.0, 0.5, 3.1, 6.0] {
                let d = angle_difference(a, b);
                assert!((0.0..=PI).contains(&d), "diff {d} out of range");
            }
        }
    }

    #[test]
    fn angle_difference_folds_across_the_wrap() {
        // -0.1 and 0.1 are 0.2 apart, not 2π - 0.2.
        assert!((angle_difference(-0.1, 0.1) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn identical_angles_have_zero_difference() {
        assert!(angle_difference(1.234, 1.234).abs() < 1e-12);
    }

    #[test]
    fn near_parallel_lines_are_merged() {
        // 45° and ~46°: second is within the 0.2 rad default threshold.
        let lines = vec![line_with_theta(100, 100), line_with_theta(100, 104)];
        let reduced = reduce_lines(&lines, 0.2);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0], lines[0]);
    }

    #[test]
    fn distinct_lines_are_both_kept() {
        // 45° and -45°: π/2 apart.
        let lines = vec![line_with_theta(100, 100), line_with_theta(100, -100)];
        let reduced = reduce_lines(&lines, 0.2);
        assert_eq!(reduced.len(), 2);
    }

    #[test]
    fn detection_order_wins() {
        // Three nearly-collinear lines: only the first survives.
        let lines = vec![
            line_with_theta(100, 0),
            line_with_theta(100, 2),
            line_with_theta(100, -3),
        ];
        let reduced = reduce_lines(&lines, 0.2);
        assert_eq!(reduced, vec![lines[0]]);
    }

    #[test]
    fn reduction_is_idempotent() {
        let lines = vec![
            line_with_theta(100, 100),
            line_with_theta(100, 104),
            line_with_theta(100, -100),
            line_with_theta(100, 0),
        ];
        let once = reduce_lines(&lines, 0.2);
        let twice = reduce_lines(&once, 0.2);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_reduces_to_empty() {
        assert!(reduce_lines(&[], 0.2).is_empty());
    }
}
