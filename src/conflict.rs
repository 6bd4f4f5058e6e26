//! Conflict areas between lanes, and the rules that decide who goes first.

use crate::gtu::LaneTraffic;
use crate::math::Polygon2d;
use crate::{ConflictId, LaneId, Network, TrafficResult};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use std::sync::Arc;

pub use builder::{BuildReport, ConflictBuilder};
pub(crate) use builder::ConflictBatch;
pub use combinations::LaneCombinationList;
pub use rule::{BusStopConflictRule, ConflictRule, DefaultConflictRule, TrafficHand};
pub use width::{FixedWidthGenerator, RelativeWidthGenerator, WidthGenerator, DEFAULT_RELATIVE_WIDTH};

mod builder;
mod combinations;
mod geometry;
mod parallel;
mod rule;
mod width;

/// The way in which the paths of two lanes meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConflictType {
    /// The lanes flow into the same downstream lane.
    Merge,
    /// The lanes come out of the same upstream lane.
    Split,
    /// The lanes cross each other.
    Crossing,
}

/// The right-of-way of a vehicle approaching a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConflictPriority {
    Priority,
    TurnOnRed,
    Yield,
    Stop,
    AllStop,
    /// Vehicles leave a common lane; there is nothing to yield to.
    Split,
}

impl ConflictPriority {
    pub fn is_priority(self) -> bool {
        self == Self::Priority
    }

    /// Returns true if vehicles have to give way, possibly after stopping.
    pub fn is_give_way(self) -> bool {
        matches!(self, Self::Yield | Self::Stop | Self::TurnOnRed)
    }

    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop | Self::AllStop)
    }

    pub fn is_all_stop(self) -> bool {
        self == Self::AllStop
    }

    pub fn is_split(self) -> bool {
        self == Self::Split
    }
}

/// The point where a merge or split conflict stops affecting vehicles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConflictEnd {
    /// The lane of the conflict.
    pub lane: LaneId,
    /// The position on the lane, in m.
    pub position: f64,
}

/// The area on one lane that conflicts with an area on another lane.
#[derive(Clone, Debug)]
pub struct Conflict {
    /// The conflict ID.
    id: ConflictId,
    /// The lane the conflict lies on.
    lane: LaneId,
    /// The position of the start of the conflict along the lane, in m.
    position: f64,
    /// The length of the conflict along the lane, in m.
    length: f64,
    /// The outline of the conflict area.
    footprint: Polygon2d,
    /// Merge, split or crossing.
    conflict_type: ConflictType,
    /// Whether traffic control permits the movement through the conflict.
    permitted: bool,
    /// The end of merge and split conflicts.
    end: Option<ConflictEnd>,
    /// The index of this conflict within its pair, 0 or 1.
    side: usize,
    /// The matching conflict on the other lane.
    other: ConflictId,
    /// The rule deciding priority, shared by both conflicts of the pair.
    rule: Arc<ConflictRule>,
}

impl Conflict {
    pub fn id(&self) -> ConflictId {
        self.id
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// The position of the start of the conflict along its lane, in m.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// The length of the conflict along its lane, in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn footprint(&self) -> &Polygon2d {
        &self.footprint
    }

    pub fn conflict_type(&self) -> ConflictType {
        self.conflict_type
    }

    pub fn is_permitted(&self) -> bool {
        self.permitted
    }

    pub fn end(&self) -> Option<ConflictEnd> {
        self.end
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// The matching conflict on the other lane.
    pub fn other(&self) -> ConflictId {
        self.other
    }

    pub fn rule(&self) -> &ConflictRule {
        &self.rule
    }

    /// Determines the priority of vehicles on this conflict's lane.
    pub fn priority(&self, network: &Network, traffic: &dyn LaneTraffic) -> TrafficResult<ConflictPriority> {
        self.rule.determine_priority(self, network, traffic)
    }
}

/// One half of a conflict pair that has been detected but not yet added to a network.
#[derive(Clone, Debug)]
pub(crate) struct ConflictSide {
    pub lane: LaneId,
    pub position: f64,
    pub length: f64,
    pub footprint: Polygon2d,
}

/// A detected pair of conflicts, as produced by the builder.
#[derive(Clone, Debug)]
pub(crate) struct ConflictPair {
    pub conflict_type: ConflictType,
    pub rule: ConflictRule,
    pub permitted: bool,
    pub sides: [ConflictSide; 2],
}

/// The conflicts of a network.
#[derive(Clone, Debug, Default)]
pub struct ConflictSet {
    conflicts: SlotMap<ConflictId, Conflict>,
    /// The conflicts on each lane, ordered by position.
    by_lane: SecondaryMap<LaneId, Vec<ConflictId>>,
}

impl ConflictSet {
    pub fn get(&self, id: ConflictId) -> Option<&Conflict> {
        self.conflicts.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.values()
    }

    /// The conflicts on a lane, ordered by position.
    pub fn conflicts_on(&self, lane: LaneId) -> impl Iterator<Item = &Conflict> {
        self.by_lane
            .get(lane)
            .into_iter()
            .flatten()
            .map(|id| &self.conflicts[*id])
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Adds both conflicts of a pair, referring to each other and sharing one rule.
    pub(crate) fn insert_pair(&mut self, pair: ConflictPair) -> [ConflictId; 2] {
        let rule = Arc::new(pair.rule);
        let mut ids = [ConflictId::default(); 2];
        for (idx, side) in pair.sides.into_iter().enumerate() {
            // Merges run to the end of the lane, and splits start at the beginning
            let end = matches!(pair.conflict_type, ConflictType::Merge | ConflictType::Split).then(|| {
                ConflictEnd {
                    lane: side.lane,
                    position: side.position + side.length,
                }
            });
            ids[idx] = self.conflicts.insert_with_key(|id| Conflict {
                id,
                lane: side.lane,
                position: side.position,
                length: side.length,
                footprint: side.footprint,
                conflict_type: pair.conflict_type,
                permitted: pair.permitted,
                end,
                side: idx,
                other: ConflictId::default(),
                rule: rule.clone(),
            });
        }
        self.conflicts[ids[0]].other = ids[1];
        self.conflicts[ids[1]].other = ids[0];

        for id in ids {
            let Conflict { lane, position, .. } = self.conflicts[id];
            let conflicts = &self.conflicts;
            if let Some(entry) = self.by_lane.entry(lane) {
                let list = entry.or_insert_with(Vec::new);
                // After conflicts at the same position, which were added earlier
                let index = list.partition_point(|other| conflicts[*other].position <= position);
                list.insert(index, id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;
    use slotmap::KeyData;

    fn split_pair(lanes: [LaneId; 2], positions: [f64; 2]) -> ConflictPair {
        let side = |lane, position| ConflictSide {
            lane,
            position,
            length: 5.0,
            footprint: Polygon2d::new(vec![
                Point2d::new(position, 0.0),
                Point2d::new(position + 5.0, 0.0),
                Point2d::new(position + 5.0, 1.0),
            ]),
        };
        ConflictPair {
            conflict_type: ConflictType::Split,
            rule: ConflictRule::Split,
            permitted: false,
            sides: [side(lanes[0], positions[0]), side(lanes[1], positions[1])],
        }
    }

    #[test]
    fn lane_lists_stay_ordered() {
        let a = LaneId::from(KeyData::from_ffi(1));
        let b = LaneId::from(KeyData::from_ffi(2));
        let mut set = ConflictSet::default();
        let first = set.insert_pair(split_pair([a, b], [40.0, 0.0]));
        let second = set.insert_pair(split_pair([a, b], [10.0, 0.0]));
        let third = set.insert_pair(split_pair([a, b], [70.0, 30.0]));
        let fourth = set.insert_pair(split_pair([a, b], [40.0, 20.0]));

        let on_a = set.conflicts_on(a).map(|c| c.id()).collect::<Vec<_>>();
        assert_eq!(on_a, vec![second[0], first[0], fourth[0], third[0]]);
        let on_b = set.conflicts_on(b).map(|c| c.position()).collect::<Vec<_>>();
        assert_eq!(on_b, vec![0.0, 0.0, 20.0, 30.0]);
        assert_eq!(set.conflicts_on(b).next().map(|c| c.id()), Some(first[1]));
        assert_eq!(set.get(first[0]).map(|c| c.other()), Some(first[1]));
    }
}
