pub use cgmath;
pub use conflict::{
    BuildReport, Conflict, ConflictBuilder, ConflictEnd, ConflictPriority, ConflictRule, ConflictSet,
    ConflictType, FixedWidthGenerator, LaneCombinationList, RelativeWidthGenerator, TrafficHand,
    WidthGenerator,
};
#[cfg(feature = "debug")]
pub use debug::take_debug_frame;
pub use error::{TrafficError, TrafficResult};
pub use gtu::{
    GtuAttributes, GtuCharacteristics, GtuSnapshot, GtuTemplate, GtuType, LaneTraffic,
    ParameterDistribution, TrafficSnapshot, TurnIndicator,
};
pub use lane::{Lane, LaneAttributes};
pub use link::{Link, LinkAttributes, LinkKind, LinkPriority, LinkType};
pub use network::{DestinationId, LaneChangeInfo, Network};
pub use node::Node;
pub use route::{shortest_route, Route};
pub use sim::{seeded_stream, SimClock, Simulator, Stream};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;

pub mod conflict;
mod debug;
mod error;
mod gtu;
mod lane;
mod link;
pub mod math;
mod network;
mod node;
pub mod od;
mod route;
mod sim;
mod util;

new_key_type! {
    /// Unique ID of a [Node].
    pub struct NodeId;
    /// Unique ID of a [Link].
    pub struct LinkId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [Conflict].
    pub struct ConflictId;
}

type NodeSet = SlotMap<NodeId, Node>;
type LinkSet = SlotMap<LinkId, Link>;
type LaneSet = SlotMap<LaneId, Lane>;
