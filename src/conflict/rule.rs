use super::{Conflict, ConflictPriority, ConflictType};
use crate::error::{TrafficError, TrafficResult};
use crate::gtu::{GtuType, LaneTraffic, TurnIndicator};
use crate::link::LinkPriority;
use crate::math::normalize_angle;
use crate::{LaneId, Network};
use once_cell::sync::OnceCell;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The side of the road traffic drives on, which decides who comes from the right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrafficHand {
    /// Traffic drives on the right, and gives way to traffic from the right.
    #[default]
    Right,
    /// Traffic drives on the left, and gives way to traffic from the left.
    Left,
}

/// Decides the priority of the two conflicts of a pair.
#[derive(Clone, Debug)]
pub enum ConflictRule {
    /// Priority follows from the link priorities, and from the traffic hand for equal priorities.
    Default(DefaultConflictRule),
    /// Buses leaving a bus stop get priority while indicating.
    BusStop(BusStopConflictRule),
    /// Both sides of a split have [ConflictPriority::Split].
    Split,
}

impl ConflictRule {
    /// Determines the priority of vehicles on the lane of `conflict`.
    pub fn determine_priority(
        &self,
        conflict: &Conflict,
        network: &Network,
        traffic: &dyn LaneTraffic,
    ) -> TrafficResult<ConflictPriority> {
        match self {
            Self::Default(rule) => rule.determine_priority(conflict, network),
            Self::BusStop(rule) => rule.determine_priority(conflict, network, traffic),
            Self::Split => Ok(ConflictPriority::Split),
        }
    }
}

/// Resolves priority from the priorities of the links of both lanes.
/// The outcome never changes, so it is computed once for the pair.
#[derive(Clone, Debug, Default)]
pub struct DefaultConflictRule {
    traffic_hand: TrafficHand,
    /// The priorities of the conflict with side 0 and side 1.
    priorities: OnceCell<[ConflictPriority; 2]>,
}

impl DefaultConflictRule {
    pub fn new(traffic_hand: TrafficHand) -> Self {
        Self {
            traffic_hand,
            priorities: OnceCell::new(),
        }
    }

    pub fn traffic_hand(&self) -> TrafficHand {
        self.traffic_hand
    }

    fn determine_priority(&self, conflict: &Conflict, network: &Network) -> TrafficResult<ConflictPriority> {
        if conflict.conflict_type() == ConflictType::Split {
            return Err(TrafficError::DefaultRuleOnSplit);
        }
        let priorities = self.priorities.get_or_try_init(|| {
            let other = network.conflicts().get(conflict.other()).ok_or_else(|| {
                TrafficError::Topology("conflict is not paired with another conflict".into())
            })?;
            let mut pair = [conflict, other];
            pair.sort_by_key(|c| c.side());
            let links = pair.map(|c| network.link(network.lane(c.lane()).link()).priority());
            let headings = pair.map(|c| {
                network
                    .lane(c.lane())
                    .center_line()
                    .direction_at(c.position())
            });
            resolve_priorities(links, headings, self.traffic_hand)
        })?;
        Ok(priorities[conflict.side()])
    }
}

/// Resolves the conflict priorities of two lanes from the priorities of their links.
///
/// # Parameters
/// * `links` - The priorities of the links of both lanes
/// * `headings` - The headings of both lanes at the start of the conflict, in radians
/// * `hand` - The side of the road traffic drives on
pub(crate) fn resolve_priorities(
    links: [LinkPriority; 2],
    headings: [f64; 2],
    hand: TrafficHand,
) -> TrafficResult<[ConflictPriority; 2]> {
    use LinkPriority as L;

    let [p1, p2] = links;
    let give_way = |p: LinkPriority| {
        if p.is_stop() {
            ConflictPriority::Stop
        } else {
            ConflictPriority::Yield
        }
    };
    let unresolvable = || TrafficError::UnresolvablePriority {
        first: p1,
        second: p2,
    };

    if p1.is_all_stop() && p2.is_all_stop() {
        return Ok([ConflictPriority::AllStop; 2]);
    }

    if p1 == p2 || matches!((p1, p2), (L::Yield, L::Stop) | (L::Stop, L::Yield)) {
        if p1.is_bus_stop() {
            return Err(TrafficError::BothBusStop);
        }
        if p1.is_turn_on_red() {
            return Err(unresolvable());
        }
        // Positive if lane 2 points to the left of lane 1, i.e. approaches from the right
        let diff = normalize_angle(headings[1] - headings[0]);
        let second_from_right = diff > 0.0;
        let first_yields = match hand {
            TrafficHand::Right => second_from_right,
            TrafficHand::Left => !second_from_right,
        };
        return Ok(if first_yields {
            [give_way(p1), ConflictPriority::Priority]
        } else {
            [ConflictPriority::Priority, give_way(p2)]
        });
    }

    let major = |p: LinkPriority| p.is_priority() || p.is_none();
    let minor = |p: LinkPriority| p.is_none() || p.is_yield() || p.is_stop();
    if major(p1) && minor(p2) {
        return Ok([ConflictPriority::Priority, give_way(p2)]);
    }
    if minor(p1) && major(p2) {
        return Ok([give_way(p1), ConflictPriority::Priority]);
    }

    if p1.is_turn_on_red() && (p2.is_yield() || p2.is_stop()) {
        return Ok([ConflictPriority::TurnOnRed, ConflictPriority::Priority]);
    }
    if p2.is_turn_on_red() && (p1.is_yield() || p1.is_stop()) {
        return Ok([ConflictPriority::Priority, ConflictPriority::TurnOnRed]);
    }

    Err(unresolvable())
}

/// Gives priority to buses that leave a bus stop, while they indicate to the left.
/// Normal traffic has priority otherwise.
#[derive(Clone, Debug)]
pub struct BusStopConflictRule {
    /// The type of GTU that counts as a bus.
    bus_type: GtuType,
}

impl BusStopConflictRule {
    pub fn new(bus_type: GtuType) -> Self {
        Self { bus_type }
    }

    pub fn bus_type(&self) -> &GtuType {
        &self.bus_type
    }

    fn determine_priority(
        &self,
        conflict: &Conflict,
        network: &Network,
        traffic: &dyn LaneTraffic,
    ) -> TrafficResult<ConflictPriority> {
        let other = network.conflicts().get(conflict.other()).ok_or_else(|| {
            TrafficError::Topology("conflict is not paired with another conflict".into())
        })?;
        let is_bus_stop = |c: &Conflict| network.link(network.lane(c.lane()).link()).priority().is_bus_stop();
        let on_bus_stop = is_bus_stop(conflict);
        let bus_conflict = if on_bus_stop { conflict } else { other };

        let bus_priority = self.bus_departing(network, traffic, bus_conflict.lane(), bus_conflict.position());
        Ok(if bus_priority == on_bus_stop {
            ConflictPriority::Priority
        } else {
            ConflictPriority::Yield
        })
    }

    /// Returns true if the first GTU at or upstream of `position` is a bus indicating to the left.
    /// The search continues upstream only where a lane has a single upstream lane.
    fn bus_departing(&self, network: &Network, traffic: &dyn LaneTraffic, lane: LaneId, position: f64) -> bool {
        let mut visited = HashSet::new();
        let (mut lane, mut position) = (lane, position);
        while visited.insert(lane) {
            if let Some(gtu) = traffic.gtu_behind(lane, position) {
                return gtu.gtu_type == self.bus_type && gtu.indicator == TurnIndicator::Left;
            }
            match network.lane(lane).upstream() {
                [up] => {
                    lane = *up;
                    position = network.lane(lane).length();
                }
                _ => break,
            }
        }
        false
    }
}
