use super::util::intersect_segments;
use super::Point2d;
use crate::util::Interval;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds2d {
    pub x: Interval<f64>,
    pub y: Interval<f64>,
}

impl Bounds2d {
    /// Computes the bounding box of a set of points.
    pub fn of_points(points: &[Point2d]) -> Self {
        let mut x = Interval::new(f64::INFINITY, f64::NEG_INFINITY);
        let mut y = x;
        for p in points {
            x = Interval::new(x.min.min(p.x), x.max.max(p.x));
            y = Interval::new(y.min.min(p.y), y.max.max(p.y));
        }
        Self { x, y }
    }

    /// Returns true if the boxes overlap or touch.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.x.touches(&other.x) && self.y.touches(&other.y)
    }
}

/// A closed polygon. The closing edge from the last to the first point is implicit.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon2d {
    points: Vec<Point2d>,
    bounds: Bounds2d,
}

impl Polygon2d {
    pub fn new(points: Vec<Point2d>) -> Self {
        let bounds = Bounds2d::of_points(&points);
        Self { points, bounds }
    }

    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    pub fn bounds(&self) -> Bounds2d {
        self.bounds
    }

    fn edges(&self) -> impl Iterator<Item = (Point2d, Point2d)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Returns true if the point lies inside the polygon (even-odd rule).
    pub fn contains(&self, point: Point2d) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > point.y) != (b.y > point.y) {
                let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if point.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Returns true if the polygons overlap, touch, or one contains the other.
    pub fn intersects(&self, other: &Polygon2d) -> bool {
        if self.points.is_empty() || other.points.is_empty() {
            return false;
        }
        if !self.bounds.overlaps(&other.bounds) {
            return false;
        }
        for (p1, p2) in self.edges() {
            for (q1, q2) in other.edges() {
                if intersect_segments(p1, p2, q1, q2).is_some() {
                    return true;
                }
            }
        }
        self.contains(other.points[0]) || other.contains(self.points[0])
    }
}
