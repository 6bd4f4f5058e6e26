use super::characteristics::OdCharacteristicsGenerator;
use super::headway::ArrivalsHeadwayGenerator;
use crate::error::{TrafficError, TrafficResult};
use crate::gtu::{GtuCharacteristics, GtuType};
use crate::sim::{Simulator, Stream};
use crate::{LaneId, LinkId, Network, NodeId};
use log::warn;
use rand::distributions::{Distribution, WeightedIndex};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Generates unique GTU IDs: a prefix followed by a counter starting at 1.
#[derive(Debug, Default)]
pub struct IdGenerator {
    prefix: String,
    last: Cell<u64>,
}

impl IdGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            last: Cell::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let next = self.last.get() + 1;
        self.last.set(next);
        format!("{}{}", self.prefix, next)
    }
}

/// What a generator does when drawing the characteristics of a GTU fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorHandler {
    /// Return the error, which halts generation.
    #[default]
    Propagate,
    /// Log the error and skip the GTU.
    LogAndSkip,
}

/// A preference of GTUs for lanes at some lateral position of a road.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneBias {
    /// The preferred lateral position: 0 for the rightmost lane, 1 for the leftmost.
    pub position: f64,
    /// How strongly the preferred position is favoured; 0 for no preference.
    pub bias: f64,
}

impl LaneBias {
    /// No preference.
    pub const NONE: LaneBias = LaneBias {
        position: 0.0,
        bias: 0.0,
    };

    /// A strong preference for the rightmost lane.
    pub const TRUCK_RIGHT: LaneBias = LaneBias {
        position: 0.0,
        bias: 5.0,
    };

    /// The weight of a lane, which is 1 at the preferred position and decays with the number
    /// of lanes away from it.
    ///
    /// # Parameters
    /// * `from_right` - The number of lanes to the right of the lane.
    /// * `lanes` - The number of lanes on the road.
    pub fn weight(&self, from_right: usize, lanes: usize) -> f64 {
        let preferred = self.position * lanes.saturating_sub(1) as f64;
        let distance = (from_right as f64 - preferred).abs();
        (1.0 + distance).powf(-self.bias)
    }
}

/// Lane biases per GTU type. GTU types without a bias have no preference.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaneBiases {
    biases: HashMap<GtuType, LaneBias>,
}

impl LaneBiases {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_bias(mut self, gtu_type: GtuType, bias: LaneBias) -> Self {
        self.biases.insert(gtu_type, bias);
        self
    }

    pub fn get(&self, gtu_type: &GtuType) -> Option<&LaneBias> {
        self.biases.get(gtu_type)
    }
}

/// A position on a lane where GTUs can be generated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratorLanePosition {
    pub lane: LaneId,
    /// The position along the lane, in m.
    pub position: f64,
    pub link: LinkId,
    lateral_offset: f64,
}

impl GeneratorLanePosition {
    pub fn new(network: &Network, lane: LaneId, position: f64) -> Self {
        let lane = network.lane(lane);
        Self {
            lane: lane.id(),
            position,
            link: lane.link(),
            lateral_offset: lane.lateral_offset(),
        }
    }
}

/// The positions a generator draws from: first a link, then a lane on that link.
#[derive(Debug)]
pub struct GeneratorPositions {
    positions: Vec<GeneratorLanePosition>,
    stream: Stream,
    biases: LaneBiases,
    /// Demand weight per link, when generating from a zone. A negative weight means the
    /// number of lanes is used.
    link_weights: Option<HashMap<LinkId, f64>>,
    /// The node where each link is entered, when generating from a zone.
    via_nodes: Option<HashMap<LinkId, NodeId>>,
}

impl GeneratorPositions {
    pub fn new(
        positions: Vec<GeneratorLanePosition>,
        stream: Stream,
        biases: LaneBiases,
        link_weights: Option<HashMap<LinkId, f64>>,
        via_nodes: Option<HashMap<LinkId, NodeId>>,
    ) -> Self {
        Self {
            positions,
            stream,
            biases,
            link_weights,
            via_nodes,
        }
    }

    pub fn positions(&self) -> &[GeneratorLanePosition] {
        &self.positions
    }

    /// The node where GTUs generated on `link` enter the network, when generating from a zone.
    pub fn via_node(&self, link: LinkId) -> Option<NodeId> {
        self.via_nodes.as_ref()?.get(&link).copied()
    }

    pub fn link_weight(&self, link: LinkId) -> Option<f64> {
        self.link_weights.as_ref()?.get(&link).copied()
    }

    /// Draws a position for a GTU of the given type.
    pub fn draw(&self, gtu_type: &GtuType) -> Option<GeneratorLanePosition> {
        let mut links: Vec<LinkId> = vec![];
        for p in &self.positions {
            if !links.contains(&p.link) {
                links.push(p.link);
            }
        }
        let lanes_on = |link: LinkId| self.positions.iter().filter(|p| p.link == link).count();
        let link_weights = links
            .iter()
            .map(|link| match self.link_weight(*link) {
                Some(weight) if weight >= 0.0 => weight,
                _ => lanes_on(*link) as f64,
            })
            .collect::<Vec<_>>();

        let mut rng = self.stream.borrow_mut();
        let link = links[WeightedIndex::new(&link_weights).ok()?.sample(&mut *rng)];

        // Lanes from right to left
        let mut on_link = self
            .positions
            .iter()
            .filter(|p| p.link == link)
            .collect::<Vec<_>>();
        on_link.sort_by(|a, b| a.lateral_offset.total_cmp(&b.lateral_offset));
        let bias = self.biases.get(gtu_type).copied().unwrap_or(LaneBias::NONE);
        let lane_weights = (0..on_link.len())
            .map(|i| bias.weight(i, on_link.len()))
            .collect::<Vec<_>>();
        let index = WeightedIndex::new(&lane_weights).ok()?.sample(&mut *rng);
        Some(*on_link[index])
    }
}

/// A GTU drawn by a generator, to be placed in the network.
#[derive(Clone, Debug)]
pub struct GeneratedGtu {
    pub id: String,
    pub characteristics: GtuCharacteristics,
    pub position: GeneratorLanePosition,
}

/// Generates GTUs at a set of positions, with headways and characteristics drawn from demand.
///
/// The generator does not schedule itself. A scheduler asks it for the next headway, and
/// when that time has come, for the next GTU.
pub struct VehicleGenerator {
    id: String,
    headway: Rc<ArrivalsHeadwayGenerator>,
    characteristics: Rc<OdCharacteristicsGenerator>,
    positions: GeneratorPositions,
    id_generator: Rc<IdGenerator>,
    /// Distance over which generated GTUs do not change lane, in m.
    no_lane_change_distance: f64,
    instant_lane_change: bool,
    error_handler: ErrorHandler,
}

impl VehicleGenerator {
    /// Creates a generator. This must happen at simulation time zero.
    pub fn new(
        id: &str,
        headway: Rc<ArrivalsHeadwayGenerator>,
        characteristics: Rc<OdCharacteristicsGenerator>,
        positions: GeneratorPositions,
        simulator: &dyn Simulator,
        id_generator: Rc<IdGenerator>,
    ) -> TrafficResult<Self> {
        if !simulator.is_time_zero() {
            return Err(TrafficError::NotAtTimeZero(simulator.time()));
        }
        Ok(Self {
            id: id.to_owned(),
            headway,
            characteristics,
            positions,
            id_generator,
            no_lane_change_distance: 0.0,
            instant_lane_change: false,
            error_handler: ErrorHandler::default(),
        })
    }

    pub fn with_no_lane_change_distance(mut self, distance: f64) -> Self {
        self.no_lane_change_distance = distance;
        self
    }

    pub fn with_instant_lane_change(mut self, instant: bool) -> Self {
        self.instant_lane_change = instant;
        self
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn positions(&self) -> &GeneratorPositions {
        &self.positions
    }

    pub fn no_lane_change_distance(&self) -> f64 {
        self.no_lane_change_distance
    }

    pub fn instant_lane_change(&self) -> bool {
        self.instant_lane_change
    }

    pub fn error_handler(&self) -> ErrorHandler {
        self.error_handler
    }

    /// The time until the next GTU, in s, or `None` if demand is exhausted.
    pub fn next_headway(&self) -> Option<f64> {
        self.headway.next_headway()
    }

    /// Draws the next GTU. Returns `Ok(None)` if the GTU was skipped, or no position is
    /// available for it.
    pub fn draw_arrival(&self) -> TrafficResult<Option<GeneratedGtu>> {
        let characteristics = match self.characteristics.draw() {
            Ok(characteristics) => characteristics,
            Err(err) => match self.error_handler {
                ErrorHandler::Propagate => {
                    return Err(TrafficError::Generation {
                        generator: self.id.clone(),
                        source: Box::new(err),
                    })
                }
                ErrorHandler::LogAndSkip => {
                    warn!("Generator {} skipped a GTU: {}", self.id, err);
                    return Ok(None);
                }
            },
        };
        let position = match self.positions.draw(&characteristics.gtu_type) {
            Some(position) => position,
            None => return Ok(None),
        };
        Ok(Some(GeneratedGtu {
            id: self.id_generator.next_id(),
            characteristics,
            position,
        }))
    }
}

/// The objects created for one generator, for inspection.
pub struct GeneratorObjects {
    pub generator: VehicleGenerator,
    pub headway: Rc<ArrivalsHeadwayGenerator>,
    pub characteristics: Rc<OdCharacteristicsGenerator>,
}

impl GeneratorObjects {
    pub fn id(&self) -> &str {
        self.generator.id()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn ids_count_up() {
        let ids = IdGenerator::new("gtu");
        assert_eq!(ids.next_id(), "gtu1");
        assert_eq!(ids.next_id(), "gtu2");
    }

    #[test]
    fn truck_bias_prefers_right() {
        let bias = LaneBias::TRUCK_RIGHT;
        assert_approx_eq!(bias.weight(0, 3), 1.0);
        assert!(bias.weight(1, 3) < 0.05);
        assert!(bias.weight(2, 3) < bias.weight(1, 3));
        assert_approx_eq!(LaneBias::NONE.weight(2, 3), 1.0);
    }
}
