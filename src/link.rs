use crate::{LaneId, LinkId, NodeId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The right-of-way attribute of a link, used to resolve conflicts with other links.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkPriority {
    /// Traffic on this link has priority.
    Priority,
    /// No explicit control; right-of-way follows from the traffic hand.
    #[default]
    None,
    /// Traffic may turn on red, yielding to all other traffic.
    TurnOnRed,
    /// Traffic yields.
    Yield,
    /// Traffic stops, then yields.
    Stop,
    /// All approaches stop.
    AllStop,
    /// A bus stop; buses departing the stop get priority.
    BusStop,
}

impl LinkPriority {
    pub fn is_priority(self) -> bool {
        self == Self::Priority
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }

    pub fn is_turn_on_red(self) -> bool {
        self == Self::TurnOnRed
    }

    pub fn is_yield(self) -> bool {
        self == Self::Yield
    }

    pub fn is_stop(self) -> bool {
        self == Self::Stop
    }

    pub fn is_all_stop(self) -> bool {
        self == Self::AllStop
    }

    pub fn is_bus_stop(self) -> bool {
        self == Self::BusStop
    }
}

/// The type of a link, e.g. "URBAN" or "FREEWAY".
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkType(Arc<str>);

impl LinkType {
    pub fn new(name: &str) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkType({})", self.0)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a link carries lanes or only connects a zone to the network.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LinkKind {
    /// A link with a cross section of lanes.
    CrossSection,
    /// A lane-less link from a zone centroid into the network.
    Connector {
        /// The share of the zone's demand that uses this connector.
        demand_weight: f64,
    },
}

/// A directed road section between two nodes.
#[derive(Clone, Debug)]
pub struct Link {
    /// The link ID.
    id: LinkId,
    /// The name of the link.
    name: String,
    /// The node the link starts at.
    start: NodeId,
    /// The node the link ends at.
    end: NodeId,
    /// The link type.
    link_type: LinkType,
    /// The right-of-way attribute.
    priority: LinkPriority,
    /// Whether this is a cross section or a connector.
    kind: LinkKind,
    /// The lanes of the link, in insertion order.
    lanes: Vec<LaneId>,
}

/// The attributes of a link.
pub struct LinkAttributes<'a> {
    /// The name of the link.
    pub name: &'a str,
    /// The start node.
    pub start: NodeId,
    /// The end node.
    pub end: NodeId,
    /// The link type.
    pub link_type: LinkType,
    /// The right-of-way attribute.
    pub priority: LinkPriority,
    /// Cross section or connector.
    pub kind: LinkKind,
}

impl Link {
    pub(crate) fn new(id: LinkId, attribs: &LinkAttributes) -> Self {
        Self {
            id,
            name: attribs.name.to_owned(),
            start: attribs.start,
            end: attribs.end,
            link_type: attribs.link_type.clone(),
            priority: attribs.priority,
            kind: attribs.kind,
            lanes: vec![],
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn link_type(&self) -> &LinkType {
        &self.link_type
    }

    pub fn priority(&self) -> LinkPriority {
        self.priority
    }

    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    pub fn is_connector(&self) -> bool {
        matches!(self.kind, LinkKind::Connector { .. })
    }

    /// The lanes of the link.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    pub(crate) fn add_lane(&mut self, lane: LaneId) {
        self.lanes.push(lane);
    }
}
