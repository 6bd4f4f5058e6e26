use cgmath::prelude::*;
use crate::util::Interval;
use super::{Point2d, Vector2d};
use super::curve::ParametricCurve2d;

/// A cubic bezier curve
#[derive(Copy, Clone, Debug)]
pub struct CubicBezier2d {
    points: [Point2d; 4]
}

impl CubicBezier2d {
    pub const fn new(points: &[Point2d; 4]) -> Self {
        Self { points: *points }
    }

    pub fn line(start: Point2d, end: Point2d) -> Self {
        let s = start.to_vec();
        let e = end.to_vec();
        let ps = [s, s.lerp(e, 1./3.), s.lerp(e, 2./3.), e];
        Self { points: ps.map(Point2d::from_vec) }
    }

    /// Creates a curve leaving `start` along `start_dir` and arriving at `end` along `end_dir`,
    /// as used for turning lanes on an intersection.
    pub fn from_tangents(start: Point2d, start_dir: Vector2d, end: Point2d, end_dir: Vector2d) -> Self {
        let reach = start.distance(end) / 3.0;
        Self {
            points: [
                start,
                start + start_dir.normalize_to(reach),
                end - end_dir.normalize_to(reach),
                end,
            ],
        }
    }
}

impl ParametricCurve2d for CubicBezier2d {
    fn sample(&self, t: f64) -> Point2d {
        let t1 = 1.0 - t;
        Point2d::from_vec(t1 * t1 * t1 * self.points[0].to_vec()
            + 3.0 * t1 * t1 * t * self.points[1].to_vec()
            + 3.0 * t1 * t * t * self.points[2].to_vec()
            + t * t * t * self.points[3].to_vec())
    }

    fn bounds(&self) -> Interval<f64> {
        Interval { min: 0.0, max: 1.0 }
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        let t1 = 1.0 - t;
        (-3.0 * t1 * t1) * self.points[0].to_vec()
            + (9.0 * t * t - 12.0 * t + 3.0) * self.points[1].to_vec()
            + (-9.0 * t * t + 6.0 * t) * self.points[2].to_vec()
            + (3.0 * t * t) * self.points[3].to_vec()
    }
}
