//! Longitudinal relations between lanes: offsets, and split/merge markers.

use super::Network;
use crate::LaneId;
use std::collections::HashSet;
use std::sync::PoisonError;

impl Network {
    /// Propagates the split and merge markers through the lane graph.
    ///
    /// Every lane learns its nearest split at or downstream of it, and its nearest
    /// merge at or upstream of it. Call this once the lanes are connected.
    pub fn init_topology(&mut self) {
        for lane in self.lanes.values_mut() {
            lane.downstream_split = None;
            lane.upstream_merge = None;
        }
        let splits = self.lanes.values().filter(|l| l.is_split()).map(|l| l.id()).collect::<Vec<_>>();
        for split in splits {
            self.set_downstream_split(split);
        }
        let merges = self.lanes.values().filter(|l| l.is_merge()).map(|l| l.id()).collect::<Vec<_>>();
        for merge in merges {
            self.set_upstream_merge(merge);
        }
        self.offsets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Marks `split` on itself and on all lanes upstream of it, up to the next split.
    fn set_downstream_split(&mut self, split: LaneId) {
        let mut visited = HashSet::new();
        let mut stack = vec![split];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            self.lanes[id].downstream_split = Some(split);
            stack.extend(
                self.lanes[id]
                    .upstream
                    .iter()
                    .copied()
                    .filter(|up| !self.lanes[*up].is_split()),
            );
        }
    }

    /// Marks `merge` on itself and on all lanes downstream of it, up to the next merge.
    fn set_upstream_merge(&mut self, merge: LaneId) {
        let mut visited = HashSet::new();
        let mut stack = vec![merge];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            self.lanes[id].upstream_merge = Some(merge);
            stack.extend(
                self.lanes[id]
                    .downstream
                    .iter()
                    .copied()
                    .filter(|down| !self.lanes[*down].is_merge()),
            );
        }
    }

    /// The distance to add to a position on lane `b` to express it in the coordinates of lane `a`.
    ///
    /// The search runs downstream from `a` first, through every branch of a split,
    /// and then upstream through merges. Returns 0 if the lanes are not connected.
    /// Offsets that are found are memoized for both directions, until lanes are connected.
    pub fn longitudinal_offset(&self, a: LaneId, b: LaneId) -> f64 {
        if a == b {
            return 0.0;
        }
        if let Some(dx) = self
            .offsets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(a, b))
        {
            return *dx;
        }

        let dx = self
            .search_downstream(a, b, &mut HashSet::from([a]))
            .or_else(|| self.search_upstream(a, b, &mut HashSet::from([a])));
        match dx {
            Some(dx) => {
                let mut offsets = self.offsets.write().unwrap_or_else(PoisonError::into_inner);
                offsets.insert((a, b), dx);
                offsets.insert((b, a), -dx);
                dx
            }
            None => 0.0,
        }
    }

    /// Looks for `target` downstream of `from`, returning the start of `target`
    /// relative to the start of `from`.
    fn search_downstream(&self, from: LaneId, target: LaneId, visited: &mut HashSet<LaneId>) -> Option<f64> {
        let lane = &self.lanes[from];
        for down in &lane.downstream {
            if *down == target {
                return Some(lane.length());
            }
        }
        for down in &lane.downstream {
            if visited.insert(*down) {
                if let Some(dx) = self.search_downstream(*down, target, visited) {
                    return Some(lane.length() + dx);
                }
            }
        }
        None
    }

    /// Looks for `target` upstream of `from`, returning the start of `target`
    /// relative to the start of `from`.
    fn search_upstream(&self, from: LaneId, target: LaneId, visited: &mut HashSet<LaneId>) -> Option<f64> {
        let lane = &self.lanes[from];
        for up in &lane.upstream {
            if *up == target {
                return Some(-self.lanes[*up].length());
            }
        }
        for up in &lane.upstream {
            if visited.insert(*up) {
                if let Some(dx) = self.search_upstream(*up, target, visited) {
                    return Some(dx - self.lanes[*up].length());
                }
            }
        }
        None
    }

    /// Returns true if two lanes are sections of the same physical lane, i.e. they are
    /// longitudinally connected without an intermediate split or merge.
    pub fn is_same_physical_lane(&self, a: LaneId, b: LaneId) -> bool {
        if a == b {
            return true;
        }
        let (la, lb) = (&self.lanes[a], &self.lanes[b]);
        self.longitudinal_offset(a, b) != 0.0
            && la.downstream_split == lb.downstream_split
            && la.upstream_merge == lb.upstream_merge
    }
}

#[cfg(test)]
mod test {
    use crate::math::{LineSegment2d, Point2d};
    use crate::{LaneAttributes, LaneId, LinkAttributes, LinkKind, LinkPriority, LinkType, Network, TrafficError};
    use assert_approx_eq::assert_approx_eq;

    /// Adds a straight single-lane link between two points.
    fn straight(net: &mut Network, name: &str, from: (f64, f64), to: (f64, f64)) -> LaneId {
        let a = net.add_node(&format!("{}-a", name), Point2d::new(from.0, from.1));
        let b = net.add_node(&format!("{}-b", name), Point2d::new(to.0, to.1));
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
            curve: &LineSegment2d::from_ends(Point2d::new(from.0, from.1), Point2d::new(to.0, to.1)),
            start_width: 3.5,
            end_width: 3.5,
            lateral_offset: 0.0,
        })
        .unwrap()
    }

    #[test]
    fn offsets_along_a_chain() {
        let mut net = Network::new();
        let a = straight(&mut net, "a", (0.0, 0.0), (100.0, 0.0));
        let b = straight(&mut net, "b", (100.0, 0.0), (150.0, 0.0));
        let c = straight(&mut net, "c", (150.0, 0.0), (170.0, 0.0));
        net.connect_longitudinal(a, b).unwrap();
        net.connect_longitudinal(b, c).unwrap();
        net.init_topology();

        assert_approx_eq!(net.longitudinal_offset(a, c), 150.0);
        assert_approx_eq!(net.longitudinal_offset(c, a), -150.0);
        assert_approx_eq!(net.longitudinal_offset(b, a), -100.0);
        assert!(net.is_same_physical_lane(a, c));
    }

    #[test]
    fn offsets_are_antisymmetric_through_splits() {
        let mut net = Network::new();
        let a = straight(&mut net, "a", (0.0, 0.0), (100.0, 0.0));
        let b = straight(&mut net, "b", (100.0, 0.0), (150.0, 10.0));
        let c = straight(&mut net, "c", (100.0, 0.0), (160.0, -10.0));
        let d = straight(&mut net, "d", (160.0, -10.0), (200.0, -10.0));
        net.connect_longitudinal(a, b).unwrap();
        net.connect_longitudinal(a, c).unwrap();
        net.connect_longitudinal(c, d).unwrap();
        net.init_topology();

        let lanes = [a, b, c, d];
        for x in lanes {
            for y in lanes {
                assert_approx_eq!(net.longitudinal_offset(x, y), -net.longitudinal_offset(y, x));
            }
        }
        assert_approx_eq!(net.longitudinal_offset(a, d), 100.0 + net.lane(c).length());
        assert_eq!(net.longitudinal_offset(b, c), 0.0);
        assert!(!net.is_same_physical_lane(a, b));
        assert!(net.is_same_physical_lane(c, d));
    }

    #[test]
    fn cycles_terminate() {
        let mut net = Network::new();
        let a = straight(&mut net, "a", (0.0, 0.0), (10.0, 0.0));
        let b = straight(&mut net, "b", (10.0, 0.0), (10.0, 10.0));
        let c = straight(&mut net, "c", (10.0, 10.0), (0.0, 0.0));
        let x = straight(&mut net, "x", (50.0, 50.0), (60.0, 50.0));
        net.connect_longitudinal(a, b).unwrap();
        net.connect_longitudinal(b, c).unwrap();
        net.connect_longitudinal(c, a).unwrap();
        net.init_topology();

        assert_approx_eq!(net.longitudinal_offset(a, c), 20.0);
        assert_eq!(net.longitudinal_offset(a, x), 0.0);
        assert!(!net.is_same_physical_lane(a, x));
    }

    #[test]
    fn offsets_follow_new_connections() {
        let mut net = Network::new();
        let a = straight(&mut net, "a", (0.0, 0.0), (100.0, 0.0));
        let b = straight(&mut net, "b", (100.0, 0.0), (150.0, 0.0));
        assert_eq!(net.longitudinal_offset(a, b), 0.0);

        net.connect_longitudinal(a, b).unwrap();
        assert_approx_eq!(net.longitudinal_offset(a, b), 100.0);
        assert_approx_eq!(net.longitudinal_offset(b, a), -100.0);

        // A memoized offset does not outlive a change to the lane graph
        let c = straight(&mut net, "c", (150.0, 0.0), (170.0, 0.0));
        assert_eq!(net.longitudinal_offset(a, c), 0.0);
        net.connect_longitudinal(b, c).unwrap();
        assert_approx_eq!(net.longitudinal_offset(a, c), 150.0);
    }

    #[test]
    fn connections_need_known_lanes() {
        let mut net = Network::new();
        let a = straight(&mut net, "a", (0.0, 0.0), (100.0, 0.0));
        // The second lane of another network has no counterpart here
        let mut other = Network::new();
        straight(&mut other, "y", (0.0, 0.0), (10.0, 0.0));
        let missing = straight(&mut other, "z", (0.0, 0.0), (10.0, 0.0));
        assert!(matches!(
            net.connect_longitudinal(a, missing),
            Err(TrafficError::UnknownLane(_))
        ));
        assert!(matches!(
            net.connect_lateral(missing, a, true, true),
            Err(TrafficError::UnknownLane(_))
        ));
        assert!(matches!(net.set_destination(missing, 1), Err(TrafficError::UnknownLane(_))));
        assert!(net.lane(a).downstream.is_empty());
    }
}
