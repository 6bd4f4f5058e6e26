use super::characteristics::{DefaultGtuCharacteristicsGeneratorOd, GtuCharacteristicsGeneratorOd};
use super::generator::{ErrorHandler, IdGenerator, LaneBias, LaneBiases};
use super::headway::HeadwayDistribution;
use super::markov::MarkovCorrelation;
use crate::gtu::GtuType;
use crate::link::LinkType;
use crate::{LaneId, NodeId};
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

/// A typed key into [OdOptions], with a default value.
pub struct OdOption<T> {
    id: &'static str,
    default: fn() -> T,
    _type: PhantomData<fn() -> T>,
}

impl<T> OdOption<T> {
    pub const fn new(id: &'static str, default: fn() -> T) -> Self {
        Self {
            id,
            default,
            _type: PhantomData,
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

impl<T> Clone for OdOption<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OdOption<T> {}

type OptionSet = HashMap<&'static str, Box<dyn Any>>;

/// Options for vehicle generation, set globally or for specific lanes, nodes or link types.
///
/// A value is looked up for a lane first, then for a node, then for a link type, then
/// globally, and falls back to the option's default.
pub struct OdOptions {
    global: OptionSet,
    lanes: HashMap<LaneId, OptionSet>,
    nodes: HashMap<NodeId, OptionSet>,
    link_types: HashMap<LinkType, OptionSet>,
}

impl Default for OdOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OdOptions {
    /// The distribution of arrivals per headway.
    pub const HEADWAY_DIST: OdOption<HeadwayDistribution> =
        OdOption::new("headway distribution", HeadwayDistribution::default);

    /// Draws the characteristics of generated GTUs.
    pub const GTU_TYPE: OdOption<Rc<dyn GtuCharacteristicsGeneratorOd>> =
        OdOption::new("gtu type", || -> Rc<dyn GtuCharacteristicsGeneratorOd> {
            Rc::new(DefaultGtuCharacteristicsGeneratorOd::default())
        });

    /// Generates the IDs of generated GTUs.
    pub const GTU_ID: OdOption<Rc<IdGenerator>> = OdOption::new("gtu id", || Rc::new(IdGenerator::new("")));

    /// Correlates the GTU types of consecutive GTUs, for categorizations with GTU types.
    pub const MARKOV: OdOption<Option<MarkovCorrelation<GtuType>>> = OdOption::new("markov", || None);

    /// Distance in m over which generated GTUs do not change lane.
    pub const NO_LC_DIST: OdOption<f64> = OdOption::new("no lc distance", || 0.0);

    /// Whether generated GTUs change lane instantaneously.
    pub const INSTANT_LC: OdOption<bool> = OdOption::new("instant lc", || false);

    pub const ERROR_HANDLER: OdOption<ErrorHandler> = OdOption::new("error handler", ErrorHandler::default);

    /// Lane preferences of GTU types when generating on a road with several lanes.
    pub const LANE_BIAS: OdOption<LaneBiases> = OdOption::new("lane bias", || {
        LaneBiases::new().with_bias(GtuType::truck(), LaneBias::TRUCK_RIGHT)
    });

    /// Creates options with defaults only, except that all generators share one ID generator.
    pub fn new() -> Self {
        let options = Self {
            global: HashMap::new(),
            lanes: HashMap::new(),
            nodes: HashMap::new(),
            link_types: HashMap::new(),
        };
        options.set(Self::GTU_ID, Self::GTU_ID.default_value())
    }

    /// Sets a value for all generators.
    pub fn set<T: 'static>(mut self, option: OdOption<T>, value: T) -> Self {
        self.global.insert(option.id, Box::new(value));
        self
    }

    /// Sets a value for generators on a lane.
    pub fn set_for_lane<T: 'static>(mut self, lane: LaneId, option: OdOption<T>, value: T) -> Self {
        self.lanes.entry(lane).or_default().insert(option.id, Box::new(value));
        self
    }

    /// Sets a value for generators at an origin node.
    pub fn set_for_node<T: 'static>(mut self, node: NodeId, option: OdOption<T>, value: T) -> Self {
        self.nodes.entry(node).or_default().insert(option.id, Box::new(value));
        self
    }

    /// Sets a value for generators on links of a link type.
    pub fn set_for_link_type<T: 'static>(mut self, link_type: LinkType, option: OdOption<T>, value: T) -> Self {
        self.link_types
            .entry(link_type)
            .or_default()
            .insert(option.id, Box::new(value));
        self
    }

    /// Looks up the value of an option.
    ///
    /// # Parameters
    /// * `option` - The option.
    /// * `lane` - The lane of the generator, if it generates on a single lane.
    /// * `node` - The origin node of the generator.
    /// * `link_type` - The link type at the generator, if there is one.
    pub fn get<T: Clone + 'static>(
        &self,
        option: OdOption<T>,
        lane: Option<LaneId>,
        node: Option<NodeId>,
        link_type: Option<&LinkType>,
    ) -> T {
        let lookup = |set: Option<&OptionSet>| {
            set.and_then(|set| set.get(option.id))
                .and_then(|value| value.downcast_ref::<T>())
                .cloned()
        };
        lookup(lane.and_then(|lane| self.lanes.get(&lane)))
            .or_else(|| lookup(node.and_then(|node| self.nodes.get(&node))))
            .or_else(|| lookup(link_type.and_then(|link_type| self.link_types.get(link_type))))
            .or_else(|| lookup(Some(&self.global)))
            .unwrap_or_else(|| option.default_value())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn lookup_order() {
        let lane = LaneId::from(KeyData::from_ffi(1));
        let node = NodeId::from(KeyData::from_ffi(1));
        let freeway = LinkType::new("FREEWAY");
        let options = OdOptions::new()
            .set(OdOptions::NO_LC_DIST, 10.0)
            .set_for_link_type(freeway.clone(), OdOptions::NO_LC_DIST, 20.0)
            .set_for_node(node, OdOptions::NO_LC_DIST, 30.0)
            .set_for_lane(lane, OdOptions::NO_LC_DIST, 40.0);
        let get = |lane: Option<LaneId>, node: Option<NodeId>, link_type: Option<&LinkType>| {
            options.get(OdOptions::NO_LC_DIST, lane, node, link_type)
        };
        assert_eq!(get(Some(lane), Some(node), Some(&freeway)), 40.0);
        assert_eq!(get(None, Some(node), Some(&freeway)), 30.0);
        assert_eq!(get(None, None, Some(&freeway)), 20.0);
        assert_eq!(get(None, None, Some(&LinkType::new("URBAN"))), 10.0);
        assert_eq!(get(None, None, None), 10.0);
    }

    #[test]
    fn defaults_apply() {
        let options = OdOptions::new();
        assert_eq!(
            options.get(OdOptions::HEADWAY_DIST, None, None, None),
            HeadwayDistribution::Exponential
        );
        assert!(!options.get(OdOptions::INSTANT_LC, None, None, None));
        assert!(options.get(OdOptions::MARKOV, None, None, None).is_none());
        assert!(options
            .get(OdOptions::LANE_BIAS, None, None, None)
            .get(&GtuType::truck())
            .is_some());
        // One ID generator for all generators
        let a = options.get(OdOptions::GTU_ID, None, None, None);
        let b = options.get(OdOptions::GTU_ID, None, None, None);
        assert!(Rc::ptr_eq(&a, &b));
    }
}
