use super::Network;
use crate::error::{TrafficError, TrafficResult};
use crate::{Lane, LaneId};

impl Network {
    /// Checks that all references between lanes and links are reciprocal.
    ///
    /// Intended for tests and diagnostics, after the network has been built.
    pub fn check_consistency(&self) -> TrafficResult<()> {
        for lane in self.lanes.values() {
            for down in lane.downstream() {
                let other = self.lane_ref(*down, lane.name())?;
                if !other.upstream().contains(&lane.id()) {
                    return Err(TrafficError::Topology(format!(
                        "lane '{}' is downstream of '{}', but does not list it as upstream",
                        other.name(),
                        lane.name()
                    )));
                }
            }
            for up in lane.upstream() {
                let other = self.lane_ref(*up, lane.name())?;
                if !other.downstream().contains(&lane.id()) {
                    return Err(TrafficError::Topology(format!(
                        "lane '{}' is upstream of '{}', but does not list it as downstream",
                        other.name(),
                        lane.name()
                    )));
                }
            }
            if let Some(left) = lane.left() {
                let other = self.lane_ref(left, lane.name())?;
                if other.right() != Some(lane.id()) {
                    return Err(TrafficError::Topology(format!(
                        "lane '{}' is left of '{}', but '{}' is not right of it",
                        other.name(),
                        lane.name(),
                        lane.name()
                    )));
                }
            }
            if let Some(right) = lane.right() {
                let other = self.lane_ref(right, lane.name())?;
                if other.left() != Some(lane.id()) {
                    return Err(TrafficError::Topology(format!(
                        "lane '{}' is right of '{}', but '{}' is not left of it",
                        other.name(),
                        lane.name(),
                        lane.name()
                    )));
                }
            }
            if !self.links.get(lane.link()).map_or(false, |l| l.lanes().contains(&lane.id())) {
                return Err(TrafficError::Topology(format!(
                    "lane '{}' is not listed by its link",
                    lane.name()
                )));
            }
        }
        for link in self.links.values() {
            for lane in link.lanes() {
                if self.lane_ref(*lane, link.name())?.link() != link.id() {
                    return Err(TrafficError::Topology(format!(
                        "link '{}' lists a lane of another link",
                        link.name()
                    )));
                }
            }
        }
        Ok(())
    }

    fn lane_ref(&self, id: LaneId, referrer: &str) -> TrafficResult<&Lane> {
        self.lanes.get(id).ok_or_else(|| {
            TrafficError::Topology(format!("'{}' refers to a lane that is not in the network", referrer))
        })
    }
}

#[cfg(test)]
mod test {
    use crate::math::{LineSegment2d, Point2d};
    use crate::{LaneAttributes, LinkAttributes, LinkKind, LinkPriority, LinkType, Network, TrafficError};

    #[test]
    fn detects_broken_reciprocity() {
        let mut net = Network::new();
        let a = net.add_node("a", Point2d::new(0.0, 0.0));
        let b = net.add_node("b", Point2d::new(50.0, 0.0));
        let link = net
            .add_link(&LinkAttributes {
                name: "ab",
                start: a,
                end: b,
                link_type: LinkType::new("URBAN"),
                priority: LinkPriority::None,
                kind: LinkKind::CrossSection,
            })
            .unwrap();
        let lanes = [1.75, -1.75].map(|y| {
            net.add_lane(&LaneAttributes {
                name: &format!("lane{}", y),
                link,
                curve: &LineSegment2d::from_ends(Point2d::new(0.0, y), Point2d::new(50.0, y)),
                start_width: 3.5,
                end_width: 3.5,
                lateral_offset: y,
            })
            .unwrap()
        });
        net.connect_lateral(lanes[0], lanes[1], true, true).unwrap();
        assert!(net.check_consistency().is_ok());

        net.lanes[lanes[1]].left = None;
        assert!(matches!(net.check_consistency(), Err(TrafficError::Topology(_))));

        net.lanes[lanes[1]].left = Some(lanes[0]);
        net.lanes[lanes[0]].downstream.push(lanes[1]);
        assert!(matches!(net.check_consistency(), Err(TrafficError::Topology(_))));
    }
}
