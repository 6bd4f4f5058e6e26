use crate::Lane;

/// The default share of the lane width that is considered for conflicts.
pub const DEFAULT_RELATIVE_WIDTH: f64 = 0.8;

/// Determines the width of the area of a lane that may conflict with other lanes.
pub trait WidthGenerator: Send + Sync {
    /// The conflict width of the lane at a fraction of its length, in m.
    fn width(&self, lane: &Lane, fraction: f64) -> f64;
}

/// A width that is the same for all lanes.
#[derive(Clone, Copy, Debug)]
pub struct FixedWidthGenerator {
    width: f64,
}

impl FixedWidthGenerator {
    /// Creates a generator of a fixed width in m.
    pub fn new(width: f64) -> Self {
        Self { width }
    }
}

impl WidthGenerator for FixedWidthGenerator {
    fn width(&self, _lane: &Lane, _fraction: f64) -> f64 {
        self.width
    }
}

/// A width that is a share of the lane width.
#[derive(Clone, Copy, Debug)]
pub struct RelativeWidthGenerator {
    factor: f64,
}

impl RelativeWidthGenerator {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl Default for RelativeWidthGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_RELATIVE_WIDTH)
    }
}

impl WidthGenerator for RelativeWidthGenerator {
    fn width(&self, lane: &Lane, fraction: f64) -> f64 {
        self.factor * lane.width_at(fraction)
    }
}
