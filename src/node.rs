use crate::math::Point2d;
use crate::{LinkId, NodeId};

/// A point in the network where links start and end.
/// Origins, destinations and zone centroids are nodes too.
#[derive(Clone, Debug)]
pub struct Node {
    /// The node ID.
    id: NodeId,
    /// The name of the node, as referenced by demand data.
    name: String,
    /// The location of the node.
    point: Point2d,
    /// The links starting or ending at this node.
    links: Vec<LinkId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: &str, point: Point2d) -> Self {
        Self {
            id,
            name: name.to_owned(),
            point,
            links: vec![],
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn point(&self) -> Point2d {
        self.point
    }

    /// The links starting or ending at this node.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub(crate) fn add_link(&mut self, link: LinkId) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }
}
