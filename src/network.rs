use crate::conflict::{BuildReport, ConflictBatch, ConflictBuilder, ConflictPriority, ConflictSet};
use crate::error::{TrafficError, TrafficResult};
use crate::gtu::LaneTraffic;
use crate::lane::{Lane, LaneAttributes};
use crate::link::{Link, LinkAttributes};
use crate::math::Point2d;
use crate::node::Node;
use crate::{ConflictId, LaneId, LaneSet, LinkId, LinkSet, NodeId, NodeSet};
pub use lane_change::LaneChangeInfo;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

mod consistency;
mod lane_change;
mod topology;

/// Identifies a destination that lanes can lead to.
pub type DestinationId = u32;

/// A road network of nodes, links and lanes, plus the conflicts between its lanes.
#[derive(Default)]
pub struct Network {
    /// The nodes in the network.
    nodes: NodeSet,
    /// The links in the network.
    links: LinkSet,
    /// The lanes in the network.
    lanes: LaneSet,
    /// Memoized longitudinal offsets between lane pairs.
    offsets: RwLock<HashMap<(LaneId, LaneId), f64>>,
    /// Lane changes needed to reach each destination.
    lane_changes: HashMap<(LaneId, DestinationId), LaneChangeInfo>,
    /// The conflicts between lanes.
    conflicts: ConflictSet,
}

impl Network {
    /// Creates a new, empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a node to the network.
    pub fn add_node(&mut self, name: &str, point: Point2d) -> NodeId {
        self.nodes.insert_with_key(|id| Node::new(id, name, point))
    }

    /// Adds a link between two existing nodes.
    pub fn add_link(&mut self, attributes: &LinkAttributes) -> TrafficResult<LinkId> {
        for node in [attributes.start, attributes.end] {
            if !self.nodes.contains_key(node) {
                return Err(TrafficError::Topology(format!(
                    "link '{}' refers to a node that is not in the network",
                    attributes.name
                )));
            }
        }
        let id = self.links.insert_with_key(|id| Link::new(id, attributes));
        self.nodes[attributes.start].add_link(id);
        self.nodes[attributes.end].add_link(id);
        Ok(id)
    }

    /// Adds a lane to an existing link.
    pub fn add_lane(&mut self, attributes: &LaneAttributes) -> TrafficResult<LaneId> {
        let link = self.links.get(attributes.link).ok_or_else(|| {
            TrafficError::Topology(format!(
                "lane '{}' refers to a link that is not in the network",
                attributes.name
            ))
        })?;
        if link.is_connector() {
            return Err(TrafficError::Topology(format!(
                "connector '{}' cannot carry lane '{}'",
                link.name(),
                attributes.name
            )));
        }
        let lane = Lane::new(attributes)?;
        let id = self.lanes.insert_with_key(|id| lane.with_id(id));
        self.links[attributes.link].add_lane(id);
        Ok(id)
    }

    /// Specifies that the end of the `up` lane connects to the start of the `down` lane.
    pub fn connect_longitudinal(&mut self, up: LaneId, down: LaneId) -> TrafficResult<()> {
        self.check_lanes(&[up, down])?;
        if !self.lanes[up].downstream.contains(&down) {
            self.lanes[up].downstream.push(down);
        }
        if !self.lanes[down].upstream.contains(&up) {
            self.lanes[down].upstream.push(up);
        }
        self.offsets
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    /// Specifies that two lanes are adjacent.
    ///
    /// # Parameters
    /// * `left` - The lane on the left
    /// * `right` - The lane on the right
    /// * `left_to_right` - Whether vehicles may change from `left` to `right`
    /// * `right_to_left` - Whether vehicles may change from `right` to `left`
    pub fn connect_lateral(
        &mut self,
        left: LaneId,
        right: LaneId,
        left_to_right: bool,
        right_to_left: bool,
    ) -> TrafficResult<()> {
        self.check_lanes(&[left, right])?;
        self.lanes[left].right = Some(right);
        self.lanes[left].can_change_right = left_to_right;
        self.lanes[right].left = Some(left);
        self.lanes[right].can_change_left = right_to_left;
        Ok(())
    }

    /// Marks a lane as leading directly to a destination.
    pub fn set_destination(&mut self, lane: LaneId, destination: DestinationId) -> TrafficResult<()> {
        self.check_lanes(&[lane])?;
        self.lanes[lane].destination = Some(destination);
        Ok(())
    }

    fn check_lanes(&self, lanes: &[LaneId]) -> TrafficResult<()> {
        match lanes.iter().find(|lane| !self.lanes.contains_key(**lane)) {
            Some(lane) => Err(TrafficError::UnknownLane(format!("{:?}", lane))),
            None => Ok(()),
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id]
    }

    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id]
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id)
    }

    /// Finds a node by name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name() == name).map(Node::id)
    }

    /// Finds a lane by name.
    pub fn lane_by_name(&self, name: &str) -> Option<LaneId> {
        self.lanes.values().find(|l| l.name() == name).map(Lane::id)
    }

    /// Returns an iterator over all the nodes in the network.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Returns an iterator over all the links in the network.
    pub fn iter_links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Returns an iterator over all the lanes in the network.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// The IDs of all lanes, grouped by link.
    pub fn lane_ids(&self) -> Vec<LaneId> {
        self.links
            .values()
            .flat_map(|link| link.lanes().iter().copied())
            .collect()
    }

    /// The conflicts between lanes built so far.
    pub fn conflicts(&self) -> &ConflictSet {
        &self.conflicts
    }

    /// Builds the conflicts between all lanes of the network, one lane pair at a time.
    pub fn build_conflicts(&mut self, builder: &ConflictBuilder) -> TrafficResult<BuildReport> {
        let lanes = self.lane_ids();
        self.build_conflicts_for_lanes(builder, &lanes)
    }

    /// Builds the conflicts between the given lanes.
    pub fn build_conflicts_for_lanes(
        &mut self,
        builder: &ConflictBuilder,
        lanes: &[LaneId],
    ) -> TrafficResult<BuildReport> {
        let batch = builder.build(self, lanes)?;
        Ok(self.install_conflicts(batch))
    }

    /// Builds the conflicts between a single pair of lanes.
    pub fn build_conflicts_for_pair(
        &mut self,
        builder: &ConflictBuilder,
        lane1: LaneId,
        lane2: LaneId,
        permitted: bool,
    ) -> TrafficResult<BuildReport> {
        let batch = builder.build_pair(self, lane1, lane2, permitted)?;
        Ok(self.install_conflicts(batch))
    }

    /// Builds the conflicts between all lanes of the network on a worker pool.
    /// Failures of individual tasks are logged and reported, not returned.
    pub fn build_conflicts_parallel(&mut self, builder: &ConflictBuilder) -> BuildReport {
        let lanes = self.lane_ids();
        let batch = builder.build_parallel(self, &lanes);
        self.install_conflicts(batch)
    }

    fn install_conflicts(&mut self, batch: ConflictBatch) -> BuildReport {
        for pair in batch.pairs {
            self.conflicts.insert_pair(pair);
        }
        batch.report
    }

    /// Determines the priority of a conflict, given the current traffic.
    pub fn conflict_priority(
        &self,
        conflict: ConflictId,
        traffic: &dyn LaneTraffic,
    ) -> TrafficResult<ConflictPriority> {
        let conflict = self.conflicts.get(conflict).ok_or_else(|| {
            TrafficError::Topology("conflict is not part of this network".into())
        })?;
        conflict.rule().determine_priority(conflict, self, traffic)
    }
}
