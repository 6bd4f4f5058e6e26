use super::categorization::Category;
use super::demand::OriginNode;
use crate::error::{TrafficError, TrafficResult};
use crate::gtu::{GtuCharacteristics, GtuTemplate, GtuType};
use crate::route::shortest_route;
use crate::sim::{Simulator, Stream};
use crate::{Network, NodeId};
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::rc::Rc;

/// Draws the characteristics of a GTU that travels between an origin and a destination.
pub trait GtuCharacteristicsGeneratorOd {
    /// # Parameters
    /// * `network` - The network the GTU travels in.
    /// * `origin` - The origin of the GTU.
    /// * `destination` - The destination of the GTU.
    /// * `category` - The demand category the GTU was drawn from.
    /// * `rng` - The random number generator.
    fn draw(
        &self,
        network: &Network,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
        rng: &mut StdRng,
    ) -> TrafficResult<GtuCharacteristics>;
}

/// Takes the GTU type and route from the category where it has them. Otherwise the GTU is
/// of the default type and takes the shortest route.
#[derive(Clone, Debug)]
pub struct DefaultGtuCharacteristicsGeneratorOd {
    default_type: GtuType,
    templates: HashMap<GtuType, GtuTemplate>,
}

impl Default for DefaultGtuCharacteristicsGeneratorOd {
    fn default() -> Self {
        Self::new(GtuType::car())
            .with_template(GtuTemplate::car())
            .with_template(GtuTemplate::truck())
            .with_template(GtuTemplate::bus())
    }
}

impl DefaultGtuCharacteristicsGeneratorOd {
    /// Creates a generator without templates.
    pub fn new(default_type: GtuType) -> Self {
        Self {
            default_type,
            templates: HashMap::new(),
        }
    }

    /// Adds or replaces the template of a GTU type.
    pub fn with_template(mut self, template: GtuTemplate) -> Self {
        self.templates.insert(template.gtu_type.clone(), template);
        self
    }
}

impl GtuCharacteristicsGeneratorOd for DefaultGtuCharacteristicsGeneratorOd {
    fn draw(
        &self,
        network: &Network,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
        rng: &mut StdRng,
    ) -> TrafficResult<GtuCharacteristics> {
        let gtu_type = category.gtu_type().unwrap_or(&self.default_type);
        let template = self.templates.get(gtu_type).ok_or_else(|| {
            TrafficError::Demand(format!("no template for GTU type {}", gtu_type))
        })?;
        let route = category
            .route()
            .cloned()
            .or_else(|| shortest_route(network, origin, destination));
        Ok(GtuCharacteristics {
            gtu_type: gtu_type.clone(),
            attributes: template.draw(rng),
            origin,
            destination,
            route,
        })
    }
}

/// Draws GTU characteristics for one generator: a destination and category from its demand
/// tree at the current time, then the characteristics for those.
pub struct OdCharacteristicsGenerator {
    root: Rc<OriginNode>,
    simulator: Rc<dyn Simulator>,
    network: Rc<Network>,
    inner: Rc<dyn GtuCharacteristicsGeneratorOd>,
    stream: Stream,
}

impl OdCharacteristicsGenerator {
    pub fn new(
        root: Rc<OriginNode>,
        simulator: Rc<dyn Simulator>,
        network: Rc<Network>,
        inner: Rc<dyn GtuCharacteristicsGeneratorOd>,
        stream: Stream,
    ) -> Self {
        Self {
            root,
            simulator,
            network,
            inner,
            stream,
        }
    }

    /// The demand tree of the generator.
    pub fn root(&self) -> &OriginNode {
        &self.root
    }

    pub fn draw(&self) -> TrafficResult<GtuCharacteristics> {
        let time = self.simulator.time();
        let destination = self.root.draw(time)?;
        let leaf = destination.draw(time)?;
        self.inner.draw(
            &self.network,
            *self.root.object(),
            *destination.object(),
            leaf.category(),
            &mut self.stream.borrow_mut(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::od::categorization::{Categorization, CategoryValue, Dimension};
    use crate::math::{LineSegment2d, Point2d};
    use crate::{LaneAttributes, LinkAttributes, LinkKind, LinkPriority, LinkType};
    use rand::SeedableRng;

    #[test]
    fn takes_type_from_category_and_routes_shortest() {
        let mut net = Network::new();
        let a = net.add_node("A", Point2d::new(0.0, 0.0));
        let b = net.add_node("B", Point2d::new(100.0, 0.0));
        let link = net
            .add_link(&LinkAttributes {
                name: "AB",
                start: a,
                end: b,
                link_type: LinkType::new("FREEWAY"),
                priority: LinkPriority::None,
                kind: LinkKind::CrossSection,
            })
            .unwrap();
        net.add_lane(&LaneAttributes {
            name: "AB1",
            link,
            curve: &LineSegment2d::from_ends(Point2d::new(0.0, 0.0), Point2d::new(100.0, 0.0)),
            start_width: 3.5,
            end_width: 3.5,
            lateral_offset: 0.0,
        })
        .unwrap();

        let cat = Categorization::new("types", vec![Dimension::GtuType]).unwrap();
        let truck = Category::new(&cat, vec![CategoryValue::GtuType(GtuType::truck())]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let gen = DefaultGtuCharacteristicsGeneratorOd::default();
        let gtu = gen.draw(&net, a, b, &truck, &mut rng).unwrap();
        assert_eq!(gtu.gtu_type, GtuType::truck());
        assert_eq!(gtu.attributes.length, 12.0);
        assert_eq!(gtu.route.map(|r| r.nodes().to_vec()), Some(vec![a, b]));

        let gtu = gen.draw(&net, a, b, &Category::uncategorized(), &mut rng).unwrap();
        assert_eq!(gtu.gtu_type, GtuType::car());

        let van = Category::new(&cat, vec![CategoryValue::GtuType(GtuType::new("VAN"))]).unwrap();
        assert!(gen.draw(&net, a, b, &van, &mut rng).is_err());
    }
}
