use super::curve::ParametricCurve2d;
use super::polygon::Bounds2d;
use super::util::{heading, intersect_segments, rot90};
use super::{Point2d, Vector2d};
use crate::error::{TrafficError, TrafficResult};
use crate::util::Interval;
use cgmath::prelude::*;

/// Points closer than this are merged when constructing a polyline, in m.
const POINT_TOLERANCE: f64 = 1e-9;

/// The largest miter scaling applied at a vertex when offsetting a polyline.
const MAX_MITER: f64 = 4.0;

/// A piecewise linear curve.
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline2d {
    /// The vertices of the line.
    points: Vec<Point2d>,
    /// The cumulative length at each vertex.
    lengths: Vec<f64>,
}

/// An intersection between two polylines.
#[derive(Clone, Copy, Debug)]
pub struct PolylineIntersection {
    /// The fractional position along the first line.
    pub fraction1: f64,
    /// The fractional position along the second line.
    pub fraction2: f64,
    /// The intersection point.
    pub point: Point2d,
}

impl Polyline2d {
    /// Creates a polyline from its vertices.
    /// Consecutive duplicate points are removed; at least two distinct points must remain.
    pub fn new(points: Vec<Point2d>) -> TrafficResult<Self> {
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(TrafficError::Geometry("polyline has non-finite coordinates".into()));
        }
        let mut deduped: Vec<Point2d> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last() {
                Some(last) if last.distance(point) < POINT_TOLERANCE => {}
                _ => deduped.push(point),
            }
        }
        if deduped.len() < 2 {
            return Err(TrafficError::Geometry(
                "polyline needs at least two distinct points".into(),
            ));
        }
        let mut lengths = Vec::with_capacity(deduped.len());
        let mut total = 0.0;
        lengths.push(0.0);
        for pair in deduped.windows(2) {
            total += pair[0].distance(pair[1]);
            lengths.push(total);
        }
        Ok(Self {
            points: deduped,
            lengths,
        })
    }

    /// Approximates a parametric curve with segments no longer than `max_length`.
    pub fn from_curve(curve: &impl ParametricCurve2d, max_length: f64) -> TrafficResult<Self> {
        Self::new(curve.to_points(max_length))
    }

    /// The vertices of the line.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// The length of the line in m.
    pub fn length(&self) -> f64 {
        self.lengths[self.lengths.len() - 1]
    }

    pub fn first(&self) -> Point2d {
        self.points[0]
    }

    pub fn last(&self) -> Point2d {
        self.points[self.points.len() - 1]
    }

    /// The axis-aligned bounding box of the line.
    pub fn bounds(&self) -> Bounds2d {
        Bounds2d::of_points(&self.points)
    }

    /// Finds the segment containing `position`, returning its index
    /// and the fraction along that segment.
    fn segment_at(&self, position: f64) -> (usize, f64) {
        let position = position.clamp(0.0, self.length());
        let idx = match self
            .lengths
            .binary_search_by(|len| len.partial_cmp(&position).unwrap_or(std::cmp::Ordering::Less))
        {
            Ok(idx) => idx.min(self.points.len() - 2),
            Err(idx) => idx.saturating_sub(1).min(self.points.len() - 2),
        };
        let segment = Interval::new(self.lengths[idx], self.lengths[idx + 1]);
        (idx, segment.inv_lerp(position))
    }

    /// Samples the line at a longitudinal position, clamped to the line.
    ///
    /// # Returns
    /// The point and the unit direction of the line at that point.
    pub fn location(&self, position: f64) -> (Point2d, Vector2d) {
        let (idx, t) = self.segment_at(position);
        let (p1, p2) = (self.points[idx], self.points[idx + 1]);
        (p1 + (p2 - p1) * t, (p2 - p1).normalize())
    }

    /// Samples the line at a fraction of its length.
    pub fn location_fraction(&self, fraction: f64) -> (Point2d, Vector2d) {
        self.location(fraction * self.length())
    }

    /// The heading of the line at a longitudinal position, in radians.
    pub fn direction_at(&self, position: f64) -> f64 {
        heading(self.location(position).1)
    }

    /// Returns the same line traversed in the opposite direction.
    pub fn reverse(&self) -> Self {
        let points = self.points.iter().rev().copied().collect::<Vec<_>>();
        let total = self.length();
        let lengths = self.lengths.iter().rev().map(|len| total - len).collect();
        Self { points, lengths }
    }

    /// Extracts the part of the line between two longitudinal positions.
    pub fn extract(&self, start: f64, end: f64) -> TrafficResult<Self> {
        let length = self.length();
        if !(start < end) || start < -POINT_TOLERANCE || end > length + POINT_TOLERANCE {
            return Err(TrafficError::Geometry(format!(
                "cannot extract [{}, {}] from a line of length {}",
                start, end, length
            )));
        }
        let mut points = vec![self.location(start).0];
        points.extend(
            self.points
                .iter()
                .zip(&self.lengths)
                .filter(|(_, len)| **len > start && **len < end)
                .map(|(p, _)| *p),
        );
        points.push(self.location(end).0);
        Self::new(points)
    }

    /// Extracts the part of the line between two fractions of its length.
    pub fn extract_fractional(&self, start: f64, end: f64) -> TrafficResult<Self> {
        self.extract(start * self.length(), end * self.length())
    }

    /// Creates a line parallel to this one, with the lateral offset varying
    /// linearly from `start_offset` to `end_offset`. Positive offsets are to the left.
    pub fn offset_line(&self, start_offset: f64, end_offset: f64) -> TrafficResult<Self> {
        let n = self.points.len();
        let normals = self
            .points
            .windows(2)
            .map(|pair| rot90((pair[1] - pair[0]).normalize()))
            .collect::<Vec<_>>();
        let offsets = Interval::new(start_offset, end_offset);
        let points = (0..n)
            .map(|i| {
                let offset = offsets.lerp(self.lengths[i] / self.length());
                let normal = if i == 0 {
                    normals[0]
                } else if i == n - 1 {
                    normals[n - 2]
                } else {
                    let sum = normals[i - 1] + normals[i];
                    if sum.magnitude2() < 1e-12 {
                        normals[i - 1]
                    } else {
                        let bisector = sum.normalize();
                        let scale = (1.0 / bisector.dot(normals[i])).min(MAX_MITER);
                        bisector * scale
                    }
                };
                self.points[i] + normal * offset
            })
            .collect();
        Self::new(points)
    }

    /// Finds all intersections with another line, sorted by the fraction along this line
    /// and then along the other line. Touching vertices shared by adjacent segments
    /// are reported once.
    pub fn intersections(&self, other: &Polyline2d) -> Vec<PolylineIntersection> {
        let mut out = vec![];
        if !self.bounds().overlaps(&other.bounds()) {
            return out;
        }
        for i in 0..self.points.len() - 1 {
            let (p1, p2) = (self.points[i], self.points[i + 1]);
            let seg_bounds = Bounds2d::of_points(&[p1, p2]);
            for j in 0..other.points.len() - 1 {
                let (q1, q2) = (other.points[j], other.points[j + 1]);
                if !seg_bounds.overlaps(&Bounds2d::of_points(&[q1, q2])) {
                    continue;
                }
                if let Some((s, t)) = intersect_segments(p1, p2, q1, q2) {
                    let len1 = Interval::new(self.lengths[i], self.lengths[i + 1]).lerp(s);
                    let len2 = Interval::new(other.lengths[j], other.lengths[j + 1]).lerp(t);
                    out.push(PolylineIntersection {
                        fraction1: len1 / self.length(),
                        fraction2: len2 / other.length(),
                        point: p1 + (p2 - p1) * s,
                    });
                }
            }
        }
        out.sort_by(|a, b| {
            a.fraction1
                .total_cmp(&b.fraction1)
                .then(a.fraction2.total_cmp(&b.fraction2))
        });
        out.dedup_by(|b, a| {
            (a.fraction1 - b.fraction1).abs() < POINT_TOLERANCE
                && (a.fraction2 - b.fraction2).abs() < POINT_TOLERANCE
        });
        out
    }
}

impl ParametricCurve2d for Polyline2d {
    fn sample(&self, t: f64) -> Point2d {
        self.location_fraction(t).0
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        self.location_fraction(t).1 * self.length()
    }

    fn to_points(&self, _max_length: f64) -> Vec<Point2d> {
        self.points.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn line(points: &[(f64, f64)]) -> Polyline2d {
        Polyline2d::new(points.iter().map(|(x, y)| Point2d::new(*x, *y)).collect()).unwrap()
    }

    #[test]
    fn length_and_location() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert_approx_eq!(l.length(), 20.0);
        let (p, dir) = l.location(15.0);
        assert_approx_eq!(p.x, 10.0);
        assert_approx_eq!(p.y, 5.0);
        assert_approx_eq!(dir.y, 1.0);
        let (p, _) = l.location_fraction(0.25);
        assert_approx_eq!(p.x, 5.0);
    }

    #[test]
    fn rejects_degenerate_lines() {
        assert!(Polyline2d::new(vec![Point2d::new(1.0, 1.0), Point2d::new(1.0, 1.0)]).is_err());
        assert!(Polyline2d::new(vec![Point2d::new(f64::NAN, 1.0), Point2d::new(1.0, 1.0)]).is_err());
    }

    #[test]
    fn offset_is_to_the_left() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let left = l.offset_line(1.0, 2.0).unwrap();
        assert_approx_eq!(left.first().y, 1.0);
        assert_approx_eq!(left.last().y, 2.0);
        let right = l.offset_line(-1.5, -1.5).unwrap();
        assert_approx_eq!(right.last().y, -1.5);
    }

    #[test]
    fn offset_keeps_distance_at_corners() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let left = l.offset_line(1.0, 1.0).unwrap();
        assert_approx_eq!(left.points()[1].x, 9.0);
        assert_approx_eq!(left.points()[1].y, 1.0);
    }

    #[test]
    fn extract_fractional_part() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let part = l.extract_fractional(0.25, 0.75).unwrap();
        assert_approx_eq!(part.length(), 10.0);
        assert_eq!(part.points().len(), 3);
        assert!(l.extract_fractional(0.5, 0.5).is_err());
    }

    #[test]
    fn reverse_line() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 5.0)]);
        let r = l.reverse();
        assert_eq!(r.first(), l.last());
        assert_approx_eq!(r.length(), l.length());
        assert_approx_eq!(r.location(5.0).0.x, 10.0);
    }

    #[test]
    fn intersections_are_sorted_and_unique() {
        let zigzag = line(&[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)]);
        let flat = line(&[(0.0, 5.0), (20.0, 5.0)]);
        let hits = zigzag.intersections(&flat);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].fraction1 < hits[1].fraction1);
        assert_approx_eq!(hits[0].fraction2, 0.25);
        assert_approx_eq!(hits[1].fraction2, 0.75);

        // A crossing exactly through a shared vertex is reported once
        let vertical = line(&[(10.0, 0.0), (10.0, 20.0)]);
        assert_eq!(zigzag.intersections(&vertical).len(), 1);
    }
}
