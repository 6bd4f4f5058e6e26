use crate::{LaneId, LinkId, Network};
use std::collections::HashSet;

/// An unordered set of lane pairs, used to skip or permit conflicts between specific lanes.
#[derive(Clone, Debug, Default)]
pub struct LaneCombinationList {
    combinations: HashSet<(LaneId, LaneId)>,
}

impl LaneCombinationList {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a pair of lanes. The order of the lanes does not matter.
    pub fn add_lane_combination(&mut self, lane1: LaneId, lane2: LaneId) {
        self.combinations.insert(ordered(lane1, lane2));
    }

    /// Adds every combination of a lane on `link1` with a lane on `link2`.
    pub fn add_link_combination(&mut self, network: &Network, link1: LinkId, link2: LinkId) {
        for lane1 in network.link(link1).lanes() {
            for lane2 in network.link(link2).lanes() {
                self.add_lane_combination(*lane1, *lane2);
            }
        }
    }

    /// Adds all combinations of another list.
    pub fn add_list(&mut self, other: &LaneCombinationList) {
        self.combinations.extend(other.combinations.iter().copied());
    }

    pub fn contains(&self, lane1: LaneId, lane2: LaneId) -> bool {
        self.combinations.contains(&ordered(lane1, lane2))
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }
}

fn ordered(lane1: LaneId, lane2: LaneId) -> (LaneId, LaneId) {
    if lane1 <= lane2 {
        (lane1, lane2)
    } else {
        (lane2, lane1)
    }
}
