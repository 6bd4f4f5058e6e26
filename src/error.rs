//! Error type shared by the network, conflict and demand modules.

use thiserror::Error;

use crate::link::LinkPriority;

/// Errors raised while building or querying a network, its conflicts, or its demand.
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("topology error: {0}")]
    Topology(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("node '{0}' not found")]
    UnknownNode(String),

    #[error("lane '{0}' not found")]
    UnknownLane(String),

    #[error("could not sort out conflict priority from link priorities {first:?} and {second:?}")]
    UnresolvablePriority {
        first: LinkPriority,
        second: LinkPriority,
    },

    #[error("both priorities are 'bus stop', which is not allowed; use the bus stop rule for bus stops")]
    BothBusStop,

    #[error("the default conflict rule is not for split conflicts")]
    DefaultRuleOnSplit,

    #[error("category error: {0}")]
    Category(String),

    #[error("demand error: {0}")]
    Demand(String),

    #[error("route error: {0}")]
    RouteMismatch(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("generators must be created at time zero, but the simulator is at {0} s")]
    NotAtTimeZero(f64),

    #[error("generator {generator} failed to draw characteristics: {source}")]
    Generation {
        generator: String,
        #[source]
        source: Box<TrafficError>,
    },
}

/// Shorthand result type used throughout the crate.
pub type TrafficResult<T> = Result<T, TrafficError>;
