use super::{Point2d, Vector2d};
use std::f64::consts::PI;

/// Rotates a vector 90 degrees counter-clockwise, i.e. to its left.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The z-component of the cross product of two vectors.
#[inline(always)]
pub fn cross(a: Vector2d, b: Vector2d) -> f64 {
    a.x * b.y - a.y * b.x
}

/// The heading of a vector in radians, counter-clockwise from the x-axis.
pub fn heading(vec: Vector2d) -> f64 {
    vec.y.atan2(vec.x)
}

/// Wraps an angle into the range `(-PI, PI]`.
pub fn normalize_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Intersects the line segments `p1 -> p2` and `q1 -> q2`.
///
/// # Returns
/// The parameters `(s, t)` such that `p1 + s * (p2 - p1) == q1 + t * (q2 - q1)`,
/// if the segments intersect. Parallel segments never intersect.
pub fn intersect_segments(p1: Point2d, p2: Point2d, q1: Point2d, q2: Point2d) -> Option<(f64, f64)> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = cross(r, s);
    if denom == 0.0 {
        return None;
    }
    let qp = q1 - p1;
    let t = cross(qp, s) / denom;
    let u = cross(qp, r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((t, u))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn crossing_segments() {
        let (s, t) = intersect_segments(
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(2.0, -1.0),
            Point2d::new(2.0, 3.0),
        )
        .unwrap();
        assert_approx_eq!(s, 0.2);
        assert_approx_eq!(t, 0.25);
    }

    #[test]
    fn parallel_segments() {
        let hit = intersect_segments(
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(0.0, 1.0),
            Point2d::new(10.0, 1.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn angle_wrapping() {
        assert_approx_eq!(normalize_angle(3.0 * PI / 2.0), -PI / 2.0);
        assert_approx_eq!(normalize_angle(-3.0 * PI / 2.0), PI / 2.0);
        assert_approx_eq!(heading(Vector2d::new(0.0, 1.0)), PI / 2.0);
    }
}
