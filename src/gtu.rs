//! GTUs (generalized travel units): their types, characteristics, and observed state.

use crate::error::{TrafficError, TrafficResult};
use crate::route::Route;
use crate::{LaneId, NodeId};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The type of a GTU, e.g. "CAR" or "TRUCK".
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GtuType(Arc<str>);

impl GtuType {
    pub fn new(name: &str) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn car() -> Self {
        Self::new("CAR")
    }

    pub fn truck() -> Self {
        Self::new("TRUCK")
    }

    pub fn bus() -> Self {
        Self::new("BUS")
    }
}

impl fmt::Debug for GtuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GtuType({})", self.0)
    }
}

impl fmt::Display for GtuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The state of a GTU's turn indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnIndicator {
    #[default]
    None,
    Left,
    Right,
}

/// The observed state of a GTU on a lane.
#[derive(Clone, Debug)]
pub struct GtuSnapshot {
    pub id: String,
    pub gtu_type: GtuType,
    pub lane: LaneId,
    /// The position of the GTU's front along the lane, in m.
    pub position: f64,
    pub indicator: TurnIndicator,
}

/// A view of the GTUs in the network, as needed to evaluate conflict rules.
pub trait LaneTraffic {
    /// The GTU nearest to `position` at or upstream of it on the lane, if any.
    fn gtu_behind(&self, lane: LaneId, position: f64) -> Option<&GtuSnapshot>;
}

/// An empty network.
impl LaneTraffic for () {
    fn gtu_behind(&self, _lane: LaneId, _position: f64) -> Option<&GtuSnapshot> {
        None
    }
}

/// The GTUs on each lane at one moment.
#[derive(Clone, Debug, Default)]
pub struct TrafficSnapshot {
    /// The GTUs on each lane, ordered by position.
    lanes: HashMap<LaneId, Vec<GtuSnapshot>>,
}

impl TrafficSnapshot {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, gtu: GtuSnapshot) {
        let gtus = self.lanes.entry(gtu.lane).or_default();
        let idx = gtus.partition_point(|g| g.position <= gtu.position);
        gtus.insert(idx, gtu);
    }
}

impl LaneTraffic for TrafficSnapshot {
    fn gtu_behind(&self, lane: LaneId, position: f64) -> Option<&GtuSnapshot> {
        self.lanes
            .get(&lane)?
            .iter()
            .rev()
            .find(|g| g.position <= position)
    }
}

/// The physical attributes of a GTU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GtuAttributes {
    /// The length in m.
    pub length: f64,
    /// The width in m.
    pub width: f64,
    /// The maximum speed in m/s.
    pub max_speed: f64,
    /// The maximum acceleration, in m/s^2.
    pub max_acc: f64,
    /// The comfortable deceleration, a negative number in m/s^2.
    pub comf_dec: f64,
}

/// A distribution that a GTU attribute is drawn from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterDistribution {
    Constant(f64),
    Uniform { min: f64, max: f64 },
    /// A normal distribution, truncated to `[min, max]`.
    Normal { mean: f64, std_dev: f64, min: f64, max: f64 },
}

impl ParameterDistribution {
    pub fn uniform(min: f64, max: f64) -> TrafficResult<Self> {
        if !(min <= max) {
            return Err(TrafficError::Demand(format!(
                "uniform distribution needs min <= max, got [{}, {}]",
                min, max
            )));
        }
        Ok(Self::Uniform { min, max })
    }

    pub fn normal(mean: f64, std_dev: f64, min: f64, max: f64) -> TrafficResult<Self> {
        if !(std_dev >= 0.0) || !(min <= max) {
            return Err(TrafficError::Demand(format!(
                "invalid normal distribution N({}, {}) on [{}, {}]",
                mean, std_dev, min, max
            )));
        }
        Ok(Self::Normal {
            mean,
            std_dev,
            min,
            max,
        })
    }

    /// Draws a value.
    pub fn draw(&self, rng: &mut impl Rng) -> f64 {
        match *self {
            Self::Constant(value) => value,
            Self::Uniform { min, max } => {
                if min < max {
                    rng.gen_range(min..max)
                } else {
                    min
                }
            }
            Self::Normal {
                mean,
                std_dev,
                min,
                max,
            } => Normal::new(mean, std_dev)
                .map(|n| n.sample(rng))
                .unwrap_or(mean)
                .clamp(min, max),
        }
    }
}

/// Describes how the attributes of GTUs of one type are drawn.
#[derive(Clone, Debug)]
pub struct GtuTemplate {
    pub gtu_type: GtuType,
    pub length: ParameterDistribution,
    pub width: ParameterDistribution,
    pub max_speed: ParameterDistribution,
    pub max_acc: ParameterDistribution,
    pub comf_dec: ParameterDistribution,
}

impl GtuTemplate {
    pub fn car() -> Self {
        use ParameterDistribution::*;
        Self {
            gtu_type: GtuType::car(),
            length: Constant(4.19),
            width: Constant(1.7),
            max_speed: Uniform { min: 50.0, max: 55.0 },
            max_acc: Constant(2.0),
            comf_dec: Constant(-2.0),
        }
    }

    pub fn truck() -> Self {
        use ParameterDistribution::*;
        Self {
            gtu_type: GtuType::truck(),
            length: Constant(12.0),
            width: Constant(2.55),
            max_speed: Uniform { min: 23.61, max: 25.0 },
            max_acc: Constant(0.8),
            comf_dec: Constant(-1.5),
        }
    }

    pub fn bus() -> Self {
        use ParameterDistribution::*;
        Self {
            gtu_type: GtuType::bus(),
            length: Constant(12.0),
            width: Constant(2.55),
            max_speed: Constant(25.0),
            max_acc: Constant(1.2),
            comf_dec: Constant(-1.5),
        }
    }

    /// Draws the attributes of one GTU.
    pub fn draw(&self, rng: &mut impl Rng) -> GtuAttributes {
        GtuAttributes {
            length: self.length.draw(rng),
            width: self.width.draw(rng),
            max_speed: self.max_speed.draw(rng),
            max_acc: self.max_acc.draw(rng),
            comf_dec: self.comf_dec.draw(rng),
        }
    }
}

/// Everything needed to create a GTU.
#[derive(Clone, Debug)]
pub struct GtuCharacteristics {
    pub gtu_type: GtuType,
    pub attributes: GtuAttributes,
    pub origin: NodeId,
    pub destination: NodeId,
    pub route: Option<Route>,
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use slotmap::KeyData;

    #[test]
    fn gtu_behind_searches_upstream_of_position() {
        let lane = LaneId::from(KeyData::from_ffi(1));
        let mut traffic = TrafficSnapshot::new();
        for (id, position) in [("a", 10.0), ("b", 40.0), ("c", 25.0)] {
            traffic.add(GtuSnapshot {
                id: id.into(),
                gtu_type: GtuType::car(),
                lane,
                position,
                indicator: TurnIndicator::None,
            });
        }
        assert_eq!(traffic.gtu_behind(lane, 30.0).map(|g| g.id.as_str()), Some("c"));
        assert_eq!(traffic.gtu_behind(lane, 40.0).map(|g| g.id.as_str()), Some("b"));
        assert!(traffic.gtu_behind(lane, 5.0).is_none());
        assert!(().gtu_behind(lane, 30.0).is_none());
    }

    #[test]
    fn truncated_normal_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let dist = ParameterDistribution::normal(1.0, 5.0, 0.5, 1.5).unwrap();
        for _ in 0..1000 {
            let value = dist.draw(&mut rng);
            assert!((0.5..=1.5).contains(&value));
        }
        assert!(ParameterDistribution::uniform(2.0, 1.0).is_err());
    }
}
