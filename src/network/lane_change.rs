use super::{DestinationId, Network};
use crate::LaneId;
use std::collections::VecDeque;
use std::iter::successors;
use std::rc::Rc;

/// How a lane leads to a destination.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneChangeInfo {
    /// The number of lane changes needed to reach the destination.
    pub lane_changes: u32,
    /// The distance available to perform those lane changes, in m,
    /// measured from the start of the lane.
    pub remaining_distance: f64,
}

impl LaneChangeInfo {
    /// Whether this is a better way to the destination than `other`: fewer lane changes,
    /// or as many with more distance to make them.
    fn is_better_than(&self, other: &LaneChangeInfo) -> bool {
        self.lane_changes < other.lane_changes
            || self.lane_changes == other.lane_changes && self.remaining_distance > other.remaining_distance
    }
}

/// The lanes passed upstream since the last lane change, most recent first.
struct Run {
    lane: LaneId,
    prev: Option<Rc<Run>>,
}

impl Run {
    fn start(lane: LaneId) -> Rc<Self> {
        Rc::new(Self { lane, prev: None })
    }

    fn extend(self: &Rc<Self>, lane: LaneId) -> Rc<Self> {
        Rc::new(Self {
            lane,
            prev: Some(self.clone()),
        })
    }

    fn contains(self: &Rc<Self>, lane: LaneId) -> bool {
        successors(Some(self), |run| run.prev.as_ref()).any(|run| run.lane == lane)
    }
}

impl Network {
    /// Computes the lane changes required to reach `destination` from every lane that leads to it.
    ///
    /// Starts from the lanes marked with the destination, spreads laterally across
    /// lanes vehicles may change from, and then upstream, where each lane adds its
    /// length to the distance available. A lane reached by a lane change has its own
    /// length available. Lanes reachable in several ways keep the option with the fewest
    /// lane changes, and of those the one with the most distance. Upstream runs never
    /// pass a lane twice, so loops in the lane graph are followed once.
    pub fn init_lane_change_info(&mut self, destination: DestinationId) {
        self.lane_changes.retain(|(_, dest), _| *dest != destination);

        let mut queue = VecDeque::new();
        for lane in self.lanes.values() {
            if lane.destination == Some(destination) {
                let info = LaneChangeInfo {
                    lane_changes: 0,
                    remaining_distance: lane.length(),
                };
                queue.push_back((lane.id(), info, Run::start(lane.id())));
            }
        }

        while let Some((id, info, run)) = queue.pop_front() {
            if !self.update_lane_change_info(id, destination, info) {
                continue;
            }
            let lane = &self.lanes[id];

            // Lanes from which a vehicle can change onto this one
            let lateral = [
                lane.left.filter(|l| self.lanes[*l].can_change_right),
                lane.right.filter(|r| self.lanes[*r].can_change_left),
            ];
            for neighbour in lateral.into_iter().flatten() {
                let info = LaneChangeInfo {
                    lane_changes: info.lane_changes + 1,
                    remaining_distance: self.lanes[neighbour].length(),
                };
                queue.push_back((neighbour, info, Run::start(neighbour)));
            }

            for up in lane.upstream.iter().filter(|up| !run.contains(**up)) {
                let info = LaneChangeInfo {
                    lane_changes: info.lane_changes,
                    remaining_distance: info.remaining_distance + self.lanes[*up].length(),
                };
                queue.push_back((*up, info, run.extend(*up)));
            }
        }
    }

    /// Records `info` if the lane has no route to the destination yet, or a worse one.
    /// Returns false if the existing record is at least as good.
    fn update_lane_change_info(
        &mut self,
        lane: LaneId,
        destination: DestinationId,
        info: LaneChangeInfo,
    ) -> bool {
        match self.lane_changes.get(&(lane, destination)) {
            Some(current) if !info.is_better_than(current) => false,
            _ => {
                self.lane_changes.insert((lane, destination), info);
                true
            }
        }
    }

    /// Computes the lane change information for every destination assigned to a lane.
    pub fn init_all_lane_change_info(&mut self) {
        let mut destinations = self
            .lanes
            .values()
            .filter_map(|l| l.destination)
            .collect::<Vec<_>>();
        destinations.sort_unstable();
        destinations.dedup();
        for destination in destinations {
            self.init_lane_change_info(destination);
        }
    }

    /// Returns true if the destination can be reached from the lane.
    pub fn leads_to(&self, lane: LaneId, destination: DestinationId) -> bool {
        self.lane_changes.contains_key(&(lane, destination))
    }

    /// The number of lane changes needed to reach the destination from the lane.
    pub fn lane_changes(&self, lane: LaneId, destination: DestinationId) -> Option<u32> {
        self.lane_changes
            .get(&(lane, destination))
            .map(|info| info.lane_changes)
    }

    /// The distance available from the start of the lane to make the required lane changes, in m.
    pub fn remaining_distance(&self, lane: LaneId, destination: DestinationId) -> Option<f64> {
        self.lane_changes
            .get(&(lane, destination))
            .map(|info| info.remaining_distance)
    }
}

#[cfg(test)]
mod test {
    use crate::math::{LineSegment2d, Point2d};
    use crate::{LaneAttributes, LaneId, LinkAttributes, LinkKind, LinkPriority, LinkType, Network};
    use assert_approx_eq::assert_approx_eq;

    /// A two-lane road of two 100m sections, with the right lane of the
    /// second section leading to destination 7.
    fn two_lane_road() -> (Network, [LaneId; 4]) {
        let mut net = Network::new();
        let nodes = [0.0, 100.0, 200.0].map(|x| net.add_node(&format!("n{}", x), Point2d::new(x, 0.0)));
        let mut lanes = vec![];
        for (i, pair) in nodes.windows(2).enumerate() {
            let link = net
                .add_link(&LinkAttributes {
                    name: &format!("link{}", i),
                    start: pair[0],
                    end: pair[1],
                    link_type: LinkType::new("FREEWAY"),
                    priority: LinkPriority::None,
                    kind: LinkKind::CrossSection,
                })
                .unwrap();
            for y in [1.75, -1.75] {
                let x0 = 100.0 * i as f64;
                lanes.push(
                    net.add_lane(&LaneAttributes {
                        name: &format!("lane{}{}", i, y),
                        link,
                        curve: &LineSegment2d::from_ends(Point2d::new(x0, y), Point2d::new(x0 + 100.0, y)),
                        start_width: 3.5,
                        end_width: 3.5,
                        lateral_offset: y,
                    })
                    .unwrap(),
                );
            }
        }
        let [l0, r0, l1, r1] = [lanes[0], lanes[1], lanes[2], lanes[3]];
        net.connect_longitudinal(l0, l1).unwrap();
        net.connect_longitudinal(r0, r1).unwrap();
        net.connect_lateral(l0, r0, true, true).unwrap();
        net.connect_lateral(l1, r1, true, false).unwrap();
        net.set_destination(r1, 7).unwrap();
        (net, [l0, r0, l1, r1])
    }

    #[test]
    fn lane_changes_to_destination() {
        let (mut net, [l0, r0, l1, r1]) = two_lane_road();
        net.init_all_lane_change_info();

        assert_eq!(net.lane_changes(r1, 7), Some(0));
        assert_eq!(net.lane_changes(l1, 7), Some(1));
        assert_eq!(net.lane_changes(r0, 7), Some(0));
        assert_eq!(net.lane_changes(l0, 7), Some(1));
        assert_approx_eq!(net.remaining_distance(r0, 7).unwrap(), 200.0);
        // Changing on the second section only leaves that section
        assert_approx_eq!(net.remaining_distance(l1, 7).unwrap(), 100.0);
        assert_approx_eq!(net.remaining_distance(l0, 7).unwrap(), 200.0);
        assert!(!net.leads_to(r1, 8));
    }

    #[test]
    fn lane_changes_respect_permissions() {
        let (mut net, [l0, r0, l1, r1]) = two_lane_road();
        net.set_destination(l1, 9).unwrap();
        net.init_lane_change_info(9);

        // Changing from the right to the left is not allowed on the second section
        assert!(!net.leads_to(r1, 9));
        assert_eq!(net.lane_changes(l0, 9), Some(0));
        assert_eq!(net.lane_changes(r0, 9), Some(1));
        // The change has to happen on the first section
        assert_approx_eq!(net.remaining_distance(r0, 9).unwrap(), 100.0);
        assert!(net.leads_to(l1, 9));
    }

    /// Adds a straight single-lane link along the x axis.
    fn straight(net: &mut Network, name: &str, from: f64, to: f64) -> LaneId {
        let a = net.add_node(&format!("{}-a", name), Point2d::new(from, 0.0));
        let b = net.add_node(&format!("{}-b", name), Point2d::new(to, 0.0));
        let link = net
            .add_link(&LinkAttributes {
                name,
                start: a,
                end: b,
                link_type: LinkType::new("URBAN"),
                priority: LinkPriority::None,
                kind: LinkKind::CrossSection,
            })
            .unwrap();
        net.add_lane(&LaneAttributes {
            name,
            link,
            curve: &LineSegment2d::from_ends(Point2d::new(from, 0.0), Point2d::new(to, 0.0)),
            start_width: 3.5,
            end_width: 3.5,
            lateral_offset: 0.0,
        })
        .unwrap()
    }

    #[test]
    fn splits_keep_the_longest_branch() {
        // Either order of adding the branches gives the same result
        for short_first in [true, false] {
            let mut net = Network::new();
            let a = straight(&mut net, "a", 0.0, 100.0);
            let (short, long) = if short_first {
                let short = straight(&mut net, "short", 100.0, 150.0);
                (short, straight(&mut net, "long", 100.0, 400.0))
            } else {
                let long = straight(&mut net, "long", 100.0, 400.0);
                (straight(&mut net, "short", 100.0, 150.0), long)
            };
            net.connect_longitudinal(a, short).unwrap();
            net.connect_longitudinal(a, long).unwrap();
            net.set_destination(short, 3).unwrap();
            net.set_destination(long, 3).unwrap();
            net.init_lane_change_info(3);

            assert_eq!(net.lane_changes(a, 3), Some(0));
            assert_approx_eq!(net.remaining_distance(a, 3).unwrap(), 400.0);
            assert_approx_eq!(net.remaining_distance(short, 3).unwrap(), 50.0);
        }
    }

    #[test]
    fn loops_are_followed_once() {
        let mut net = Network::new();
        let a = straight(&mut net, "a", 0.0, 10.0);
        let b = straight(&mut net, "b", 10.0, 30.0);
        let c = straight(&mut net, "c", 30.0, 60.0);
        let exit = straight(&mut net, "exit", 60.0, 100.0);
        net.connect_longitudinal(a, b).unwrap();
        net.connect_longitudinal(b, c).unwrap();
        net.connect_longitudinal(c, a).unwrap();
        net.connect_longitudinal(c, exit).unwrap();
        net.set_destination(exit, 1).unwrap();
        net.init_lane_change_info(1);

        assert_approx_eq!(net.remaining_distance(c, 1).unwrap(), 70.0);
        assert_approx_eq!(net.remaining_distance(b, 1).unwrap(), 90.0);
        assert_approx_eq!(net.remaining_distance(a, 1).unwrap(), 100.0);
    }
}
