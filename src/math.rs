//! Mathematical structs and functions.

use cgmath::{Point2, Vector2};
pub use bezier::CubicBezier2d;
pub use curve::{subdivided_points_along_curve, LineSegment2d, ParametricCurve2d};
pub use polygon::{Bounds2d, Polygon2d};
pub use polyline::{Polyline2d, PolylineIntersection};
pub use util::*;

mod bezier;
mod curve;
mod polygon;
mod polyline;
mod util;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;
