use super::categorization::Dimension;
use super::characteristics::OdCharacteristicsGenerator;
use super::demand::{DemandLeaf, DestinationNode, OriginNode, SharedMarkovChain};
use super::generator::{GeneratorLanePosition, GeneratorObjects, GeneratorPositions, VehicleGenerator};
use super::headway::ArrivalsHeadwayGenerator;
use super::markov::MarkovChain;
use super::matrix::OdMatrix;
use super::options::OdOptions;
use crate::error::{TrafficError, TrafficResult};
use crate::link::{LinkKind, LinkType};
use crate::sim::{seeded_stream, Simulator, Stream};
use crate::{LaneId, LinkId, Network, NodeId};
use log::{info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Seed of the stream used when the simulator has no stream for generation.
const FALLBACK_SEED: u64 = 1;

/// The demand tree of a generator, with the positions it generates at.
struct GeneratorRoot {
    root: OriginNode,
    positions: Vec<GeneratorLanePosition>,
    /// The lane of a lane-based generator.
    lane: Option<LaneId>,
    link_weights: Option<HashMap<LinkId, f64>>,
    via_nodes: Option<HashMap<LinkId, NodeId>>,
}

/// Positions of a zone, with link weights and via nodes when reached through connectors.
#[derive(Default)]
struct ZonePositions {
    positions: Vec<GeneratorLanePosition>,
    link_weights: HashMap<LinkId, f64>,
    via_nodes: HashMap<LinkId, NodeId>,
}

/// Creates vehicle generators for the demand in an OD matrix. This must happen at simulation
/// time zero.
///
/// If the categorization has a lane dimension, there is one generator per origin lane, with
/// ID `<origin name><n>` where lanes are numbered per origin by link name and then from
/// right to left. Otherwise there is one generator per origin, with the origin name as ID,
/// generating on all links leaving the origin or, through connectors, the zone.
///
/// # Parameters
/// * `network` - The network, whose lanes GTUs are generated on.
/// * `od` - The demand.
/// * `options` - The generation options.
/// * `simulator` - The simulator, which provides the time and random streams.
pub fn apply_od(
    network: &Rc<Network>,
    od: &OdMatrix,
    options: &OdOptions,
    simulator: Rc<dyn Simulator>,
) -> TrafficResult<Vec<GeneratorObjects>> {
    if !simulator.is_time_zero() {
        return Err(TrafficError::NotAtTimeZero(simulator.time()));
    }
    let stream = generation_stream(&*simulator);
    let lane_based = od.categorization().entails(&Dimension::Lane);

    let mut output = vec![];
    for origin in od.origins() {
        let mut roots = build_demand_trees(network, od, options, &stream, *origin)?;
        if lane_based {
            roots.sort_by(|a, b| {
                let key = |root: &GeneratorRoot| {
                    let p = root.positions[0];
                    let lane = network.lane(p.lane);
                    (network.link(lane.link()).name().to_lowercase(), lane.lateral_offset())
                };
                let (name_a, offset_a) = key(a);
                let (name_b, offset_b) = key(b);
                name_a.cmp(&name_b).then(offset_a.total_cmp(&offset_b))
            });
        }
        create_generators(network, od, options, &simulator, &stream, *origin, roots, &mut output)?;
    }
    Ok(output)
}

/// The "generation" stream of the simulator, else its "default" stream, else a new stream.
fn generation_stream(simulator: &dyn Simulator) -> Stream {
    if let Some(stream) = simulator.stream("generation") {
        return stream;
    }
    if let Some(stream) = simulator.stream("default") {
        info!("Using stream 'default' for vehicle generation");
        return stream;
    }
    warn!(
        "Using locally created stream (not from the simulator) for vehicle generation, with seed {}",
        FALLBACK_SEED
    );
    seeded_stream(FALLBACK_SEED)
}

fn markov_chain(
    options: &OdOptions,
    lane: Option<LaneId>,
    origin: NodeId,
    link_type: Option<&LinkType>,
) -> Option<SharedMarkovChain> {
    options
        .get(OdOptions::MARKOV, lane, Some(origin), link_type)
        .map(|correlation| Rc::new(RefCell::new(MarkovChain::new(correlation))))
}

/// Builds the demand trees of an origin: one per lane for lane-based demand, one for the
/// whole origin otherwise.
fn build_demand_trees(
    network: &Network,
    od: &OdMatrix,
    options: &OdOptions,
    stream: &Stream,
    origin: NodeId,
) -> TrafficResult<Vec<GeneratorRoot>> {
    let lane_based = od.categorization().entails(&Dimension::Lane);
    let markovian = od.categorization().entails(&Dimension::GtuType);

    let mut roots: Vec<GeneratorRoot> = vec![];
    let mut zone_root = OriginNode::new(origin, stream.clone(), None);
    // One chain for all destinations of a zone
    let zone_chain = match (lane_based, markovian) {
        (false, true) => markov_chain(options, None, origin, link_type_of_node(network, origin).as_ref()),
        _ => None,
    };

    for destination in od.destinations() {
        let categories = od.get_categories(origin, *destination)?;
        if categories.is_empty() {
            continue;
        }
        let mut zone_destination = DestinationNode::new(*destination, stream.clone(), zone_chain.clone());
        for category in categories {
            let pattern = od
                .get_demand_pattern(origin, *destination, category)?
                .cloned()
                .ok_or_else(|| TrafficError::Demand(format!("no demand for category {}", category)))?;
            let leaf = DemandLeaf::new(category.clone(), pattern);

            let destination_node = if lane_based {
                let lane = category.lane().ok_or_else(|| {
                    TrafficError::Category(format!("category {} has no lane", category))
                })?;
                let index = match roots.iter().position(|r| r.lane == Some(lane)) {
                    Some(index) => index,
                    None => {
                        let lane_ref = network
                            .get_lane(lane)
                            .ok_or_else(|| TrafficError::UnknownLane(format!("{:?}", lane)))?;
                        let position = if network.link(lane_ref.link()).start() == origin {
                            0.0
                        } else {
                            lane_ref.length()
                        };
                        roots.push(GeneratorRoot {
                            root: OriginNode::new(origin, stream.clone(), None),
                            positions: vec![GeneratorLanePosition::new(network, lane, position)],
                            lane: Some(lane),
                            link_weights: None,
                            via_nodes: None,
                        });
                        roots.len() - 1
                    }
                };
                let root = &mut roots[index].root;
                if root.child_mut(destination).is_none() {
                    // One chain per lane, even if several categories share the lane
                    let chain = if markovian {
                        let link_type = network.link(network.lane(lane).link()).link_type();
                        markov_chain(options, Some(lane), origin, Some(link_type))
                    } else {
                        None
                    };
                    root.add_child(DestinationNode::new(*destination, stream.clone(), chain));
                }
                match root.child_mut(destination) {
                    Some(node) => node,
                    None => continue,
                }
            } else {
                &mut zone_destination
            };

            match category.gtu_type() {
                Some(gtu_type) if markovian => destination_node.add_leaf(leaf, gtu_type.clone()),
                _ => destination_node.add_child(leaf),
            }
        }
        if !lane_based {
            zone_root.add_child(zone_destination);
        }
    }

    if !lane_based {
        let zone = zone_positions(network, origin);
        let through_connectors = !zone.link_weights.is_empty();
        roots.push(GeneratorRoot {
            root: zone_root,
            positions: zone.positions,
            lane: None,
            link_weights: through_connectors.then_some(zone.link_weights),
            via_nodes: through_connectors.then_some(zone.via_nodes),
        });
    }
    Ok(roots)
}

/// Positions on all links leaving the origin. Through a connector, the positions are on the
/// links leaving the node at the end of the connector, which share the connector's weight.
fn zone_positions(network: &Network, origin: NodeId) -> ZonePositions {
    let mut zone = ZonePositions::default();
    for link_id in network.node(origin).links() {
        let link = network.link(*link_id);
        match link.kind() {
            LinkKind::Connector { demand_weight } if link.start() == origin => {
                let via = link.end();
                let served = network
                    .node(via)
                    .links()
                    .iter()
                    .filter(|l| !network.link(**l).is_connector())
                    .copied()
                    .collect::<Vec<_>>();
                for served_link in &served {
                    let weight = if demand_weight > 0.0 {
                        demand_weight / served.len() as f64
                    } else {
                        -1.0
                    };
                    zone.link_weights.insert(*served_link, weight);
                    zone.via_nodes.insert(*served_link, via);
                    add_lane_positions(network, *served_link, via, &mut zone.positions);
                }
            }
            LinkKind::Connector { .. } => {}
            LinkKind::CrossSection => add_lane_positions(network, *link_id, origin, &mut zone.positions),
        }
    }
    zone
}

/// Adds the start of each lane of the link, if the link starts at `node`.
fn add_lane_positions(network: &Network, link: LinkId, node: NodeId, positions: &mut Vec<GeneratorLanePosition>) {
    let link = network.link(link);
    if link.start() != node {
        return;
    }
    for lane in link.lanes() {
        let position = GeneratorLanePosition::new(network, *lane, 0.0);
        if !positions.contains(&position) {
            positions.push(position);
        }
    }
}

/// The link type shared by the links at a node, looking through connectors. `None` if the
/// links have different types.
fn link_type_of_node(network: &Network, node: NodeId) -> Option<LinkType> {
    link_type_at(network, node, false)
}

fn link_type_at(network: &Network, node: NodeId, ignore_connectors: bool) -> Option<LinkType> {
    let mut link_type: Option<LinkType> = None;
    for link_id in network.node(node).links() {
        let link = network.link(*link_id);
        let next = if link.is_connector() {
            if ignore_connectors {
                continue;
            }
            let other = if link.start() == node { link.end() } else { link.start() };
            match link_type_at(network, other, true) {
                Some(next) => next,
                None => continue,
            }
        } else {
            link.link_type().clone()
        };
        match &link_type {
            None => link_type = Some(next),
            Some(current) if *current != next => return None,
            Some(_) => {}
        }
    }
    link_type
}

#[allow(clippy::too_many_arguments)]
fn create_generators(
    network: &Rc<Network>,
    od: &OdMatrix,
    options: &OdOptions,
    simulator: &Rc<dyn Simulator>,
    stream: &Stream,
    origin: NodeId,
    roots: Vec<GeneratorRoot>,
    output: &mut Vec<GeneratorObjects>,
) -> TrafficResult<()> {
    let origin_name = od
        .node_name(origin)
        .unwrap_or_else(|| network.node(origin).name())
        .to_owned();

    for (count, generator_root) in roots.into_iter().enumerate() {
        let GeneratorRoot {
            root,
            positions,
            lane,
            link_weights,
            via_nodes,
        } = generator_root;
        let id = match lane {
            Some(_) => format!("{}{}", origin_name, count + 1),
            None => origin_name.clone(),
        };
        let link_type = match lane {
            Some(lane) => Some(network.link(network.lane(lane).link()).link_type().clone()),
            None => link_type_of_node(network, origin),
        };
        let get_node = Some(origin);
        let root = Rc::new(root);

        let distribution = options.get(OdOptions::HEADWAY_DIST, lane, get_node, link_type.as_ref());
        let headway = Rc::new(ArrivalsHeadwayGenerator::new(
            root.clone(),
            simulator.clone(),
            stream.clone(),
            distribution,
        ));
        let characteristics = Rc::new(OdCharacteristicsGenerator::new(
            root,
            simulator.clone(),
            network.clone(),
            options.get(OdOptions::GTU_TYPE, lane, get_node, link_type.as_ref()),
            stream.clone(),
        ));

        let positions = GeneratorPositions::new(
            positions,
            stream.clone(),
            options.get(OdOptions::LANE_BIAS, lane, get_node, link_type.as_ref()),
            link_weights,
            via_nodes,
        );
        let generator = VehicleGenerator::new(
            &id,
            headway.clone(),
            characteristics.clone(),
            positions,
            &**simulator,
            options.get(OdOptions::GTU_ID, lane, get_node, link_type.as_ref()),
        )?
        .with_no_lane_change_distance(options.get(OdOptions::NO_LC_DIST, lane, get_node, link_type.as_ref()))
        .with_instant_lane_change(options.get(OdOptions::INSTANT_LC, lane, get_node, link_type.as_ref()))
        .with_error_handler(options.get(OdOptions::ERROR_HANDLER, lane, get_node, link_type.as_ref()));

        output.push(GeneratorObjects {
            generator,
            headway,
            characteristics,
        });
    }
    Ok(())
}
