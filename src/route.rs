use crate::error::{TrafficError, TrafficResult};
use crate::{LinkId, Network, NodeId};
use cgmath::MetricSpace;

/// A sequence of nodes to pass, from an origin to a destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route {
    name: String,
    nodes: Vec<NodeId>,
}

impl Route {
    /// Creates a route. It needs at least one node.
    pub fn new(name: &str, nodes: Vec<NodeId>) -> TrafficResult<Self> {
        if nodes.is_empty() {
            return Err(TrafficError::RouteMismatch(format!("route '{}' has no nodes", name)));
        }
        Ok(Self {
            name: name.to_owned(),
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn origin(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn destination(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }
}

/// The length of a link in m: the length of its first lane, or the
/// distance between its nodes for links without lanes.
fn link_length(network: &Network, link: LinkId) -> f64 {
    let link = network.link(link);
    match link.lanes().first() {
        Some(lane) => network.lane(*lane).length(),
        None => network
            .node(link.start())
            .point()
            .distance(network.node(link.end()).point()),
    }
}

/// Finds the shortest route between two nodes, if there is one.
pub fn shortest_route(network: &Network, origin: NodeId, destination: NodeId) -> Option<Route> {
    let successors = |node: &NodeId| {
        network
            .node(*node)
            .links()
            .iter()
            .filter(|id| network.link(**id).start() == *node)
            .map(|id| {
                // Costs are whole decimetres
                let cost = (10.0 * link_length(network, *id)).round() as u64;
                (network.link(*id).end(), cost)
            })
            .collect::<Vec<_>>()
    };
    let (nodes, _) = pathfinding::directed::dijkstra::dijkstra(&origin, successors, |n| *n == destination)?;
    let name = format!(
        "{}-{}",
        network.node(origin).name(),
        network.node(destination).name()
    );
    Some(Route { name, nodes })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{LineSegment2d, Point2d};
    use crate::{LaneAttributes, LinkAttributes, LinkKind, LinkPriority, LinkType};

    #[test]
    fn shortest_route_prefers_shorter_links() {
        let mut net = Network::new();
        let a = net.add_node("A", Point2d::new(0.0, 0.0));
        let b = net.add_node("B", Point2d::new(50.0, 40.0));
        let c = net.add_node("C", Point2d::new(100.0, 0.0));
        let d = net.add_node("D", Point2d::new(50.0, -5.0));
        for (name, from, to) in [("ab", a, b), ("bc", b, c), ("ad", a, d), ("dc", d, c)] {
            let link = net
                .add_link(&LinkAttributes {
                    name,
                    start: from,
                    end: to,
                    link_type: LinkType::new("URBAN"),
                    priority: LinkPriority::None,
                    kind: LinkKind::CrossSection,
                })
                .unwrap();
            let (p, q) = (net.node(from).point(), net.node(to).point());
            net.add_lane(&LaneAttributes {
                name,
                link,
                curve: &LineSegment2d::from_ends(p, q),
                start_width: 3.5,
                end_width: 3.5,
                lateral_offset: 0.0,
            })
            .unwrap();
        }

        let route = shortest_route(&net, a, c).unwrap();
        assert_eq!(route.nodes(), &[a, d, c]);
        assert_eq!(route.origin(), a);
        assert_eq!(route.destination(), c);
        assert_eq!(route.name(), "A-C");
        assert!(shortest_route(&net, c, a).is_none());
    }
}
