use super::categorization::{Categorization, Category};
use super::pattern::{check_times, DemandPattern, Interpolation};
use crate::error::{TrafficError, TrafficResult};
use crate::{Network, NodeId};
use itertools::iproduct;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Added before truncating trip counts, so that round-off does not lose a trip.
const TRIP_ROUNDING: f64 = 1e-6;

/// Seconds per hour; demand is in veh/h, times in s.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Origin-destination demand, split by category and varying over time.
#[derive(Clone, Debug)]
pub struct OdMatrix {
    id: String,
    /// Origins, ordered by name.
    origins: Vec<NodeId>,
    /// Destinations, ordered by name.
    destinations: Vec<NodeId>,
    names: HashMap<NodeId, String>,
    categorization: Arc<Categorization>,
    /// Times used for demand that is put without its own time vector, in s.
    times: Vec<f64>,
    interpolation: Interpolation,
    demand: HashMap<(NodeId, NodeId), BTreeMap<Category, DemandPattern>>,
}

impl OdMatrix {
    /// Creates an empty OD matrix.
    ///
    /// # Parameters
    /// * `id` - The ID of the matrix.
    /// * `origins` - The origin nodes.
    /// * `destinations` - The destination nodes.
    /// * `categorization` - How demand is split into categories.
    /// * `times` - The default time vector, in s.
    /// * `interpolation` - The default interpolation.
    /// * `network` - The network the nodes are in.
    pub fn new(
        id: &str,
        origins: &[NodeId],
        destinations: &[NodeId],
        categorization: Arc<Categorization>,
        times: Vec<f64>,
        interpolation: Interpolation,
        network: &Network,
    ) -> TrafficResult<Self> {
        check_times(&times)?;
        if times.len() < 2 {
            return Err(TrafficError::Demand("time vector needs at least 2 values".into()));
        }
        let mut names = HashMap::new();
        for node in origins.iter().chain(destinations) {
            let name = network
                .get_node(*node)
                .ok_or_else(|| TrafficError::UnknownNode(format!("{:?}", node)))?
                .name();
            names.insert(*node, name.to_owned());
        }
        let sorted = |nodes: &[NodeId]| {
            let mut nodes = nodes.to_vec();
            nodes.sort_by(|a, b| names[a].cmp(&names[b]).then(a.cmp(b)));
            nodes.dedup();
            nodes
        };
        let origins = sorted(origins);
        let destinations = sorted(destinations);
        Ok(Self {
            id: id.to_owned(),
            origins,
            destinations,
            names,
            categorization,
            times,
            interpolation,
            demand: HashMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origins(&self) -> &[NodeId] {
        &self.origins
    }

    pub fn destinations(&self) -> &[NodeId] {
        &self.destinations
    }

    pub fn categorization(&self) -> &Arc<Categorization> {
        &self.categorization
    }

    pub fn global_time_vector(&self) -> &[f64] {
        &self.times
    }

    pub fn global_interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// The name of a node in the matrix.
    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.names.get(&node).map(String::as_str)
    }

    fn check_od(&self, origin: NodeId, destination: NodeId) -> TrafficResult<()> {
        if !self.origins.contains(&origin) {
            return Err(TrafficError::UnknownNode(format!(
                "origin {:?} of OD matrix '{}'",
                origin, self.id
            )));
        }
        if !self.destinations.contains(&destination) {
            return Err(TrafficError::UnknownNode(format!(
                "destination {:?} of OD matrix '{}'",
                destination, self.id
            )));
        }
        Ok(())
    }

    fn check(&self, origin: NodeId, destination: NodeId, category: &Category) -> TrafficResult<()> {
        self.check_od(origin, destination)?;
        if !self.categorization.accepts(category) {
            return Err(TrafficError::Category(format!(
                "category {} does not belong to categorization {}",
                category, self.categorization
            )));
        }
        Ok(())
    }

    /// Sets the demand of a category, on the default time vector and interpolation.
    pub fn put_demand_vector(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        category: Category,
        demand: Vec<f64>,
    ) -> TrafficResult<()> {
        let times = self.times.clone();
        self.put_demand_vector_with(origin, destination, category, demand, times, self.interpolation)
    }

    /// Sets the demand of a category.
    ///
    /// # Parameters
    /// * `origin` - The origin, which must be in the matrix.
    /// * `destination` - The destination, which must be in the matrix.
    /// * `category` - The category, which must belong to the categorization. If it has a route,
    ///   the route must run from the origin to the destination.
    /// * `demand` - The demand at each time, in veh/h.
    /// * `times` - The times, strictly increasing, in s.
    /// * `interpolation` - How demand changes between the times.
    pub fn put_demand_vector_with(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        category: Category,
        demand: Vec<f64>,
        times: Vec<f64>,
        interpolation: Interpolation,
    ) -> TrafficResult<()> {
        self.check(origin, destination, &category)?;
        if let Some(route) = category.route() {
            if route.origin() != origin || route.destination() != destination {
                return Err(TrafficError::RouteMismatch(format!(
                    "route '{}' does not run from origin {:?} to destination {:?}",
                    route.name(),
                    origin,
                    destination
                )));
            }
        }
        let pattern = DemandPattern::new(demand, times, interpolation)?;
        self.demand
            .entry((origin, destination))
            .or_default()
            .insert(category, pattern);
        Ok(())
    }

    /// Sets the demand of a category as a fraction of the given demand.
    #[allow(clippy::too_many_arguments)]
    pub fn put_demand_vector_scaled(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        category: Category,
        demand: &[f64],
        times: Vec<f64>,
        interpolation: Interpolation,
        fraction: f64,
    ) -> TrafficResult<()> {
        let scaled = demand.iter().map(|q| q * fraction).collect();
        self.put_demand_vector_with(origin, destination, category, scaled, times, interpolation)
    }

    /// Sets the demand of a category as a fraction of the given demand, with a fraction per time.
    #[allow(clippy::too_many_arguments)]
    pub fn put_demand_vector_scaled_per_period(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        category: Category,
        demand: &[f64],
        times: Vec<f64>,
        interpolation: Interpolation,
        fractions: &[f64],
    ) -> TrafficResult<()> {
        if demand.len() != times.len() || times.len() != fractions.len() {
            return Err(TrafficError::Demand(format!(
                "unequal lengths: demand={}, times={}, fractions={}",
                demand.len(),
                times.len(),
                fractions.len()
            )));
        }
        let scaled = demand.iter().zip(fractions).map(|(q, f)| q * f).collect();
        self.put_demand_vector_with(origin, destination, category, scaled, times, interpolation)
    }

    /// The demand pattern of a category, if demand was put for it.
    pub fn get_demand_pattern(
        &self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
    ) -> TrafficResult<Option<&DemandPattern>> {
        self.check(origin, destination, category)?;
        Ok(self
            .demand
            .get(&(origin, destination))
            .and_then(|categories| categories.get(category)))
    }

    pub fn get_demand_vector(
        &self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
    ) -> TrafficResult<Option<&[f64]>> {
        Ok(self
            .get_demand_pattern(origin, destination, category)?
            .map(DemandPattern::demand))
    }

    pub fn get_time_vector(
        &self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
    ) -> TrafficResult<Option<&[f64]>> {
        Ok(self
            .get_demand_pattern(origin, destination, category)?
            .map(DemandPattern::times))
    }

    pub fn get_interpolation(
        &self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
    ) -> TrafficResult<Option<Interpolation>> {
        Ok(self
            .get_demand_pattern(origin, destination, category)?
            .map(DemandPattern::interpolation))
    }

    /// The demand of a category at `time`, in veh/h. Zero if no demand was put for it.
    pub fn get_demand(
        &self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
        time: f64,
        slice_start: bool,
    ) -> TrafficResult<f64> {
        Ok(self
            .get_demand_pattern(origin, destination, category)?
            .map_or(0.0, |pattern| pattern.frequency(time, slice_start)))
    }

    pub fn contains(&self, origin: NodeId, destination: NodeId, category: &Category) -> bool {
        matches!(self.get_demand_pattern(origin, destination, category), Ok(Some(_)))
    }

    /// The categories with demand from `origin` to `destination`, in order.
    pub fn get_categories(&self, origin: NodeId, destination: NodeId) -> TrafficResult<Vec<&Category>> {
        self.check_od(origin, destination)?;
        Ok(self
            .demand
            .get(&(origin, destination))
            .map(|categories| categories.keys().collect())
            .unwrap_or_default())
    }

    /// Sets the demand of a category by the number of trips per period of the default time
    /// vector.
    pub fn put_trips_vector(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        category: Category,
        trips: &[u32],
    ) -> TrafficResult<()> {
        let times = self.times.clone();
        self.put_trips_vector_with(origin, destination, category, trips, times)
    }

    /// Sets the demand of a category by the number of trips per period. Demand is stepwise,
    /// with one value less in `trips` than in `times`.
    pub fn put_trips_vector_with(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        category: Category,
        trips: &[u32],
        times: Vec<f64>,
    ) -> TrafficResult<()> {
        if trips.len() + 1 != times.len() {
            return Err(TrafficError::Demand(format!(
                "{} trip values need {} times, got {}",
                trips.len(),
                trips.len() + 1,
                times.len()
            )));
        }
        let mut flow = vec![0.0; times.len()];
        for (i, n) in trips.iter().enumerate() {
            flow[i] = *n as f64 / ((times[i + 1] - times[i]) / SECONDS_PER_HOUR);
        }
        self.put_demand_vector_with(origin, destination, category, flow, times, Interpolation::Stepwise)
    }

    /// The number of trips per period, if demand was put for the category.
    pub fn get_trips_vector(
        &self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
    ) -> TrafficResult<Option<Vec<u32>>> {
        match self.get_demand_pattern(origin, destination, category)? {
            Some(pattern) => (0..pattern.periods())
                .map(|period| pattern.trips(period).map(truncate_trips))
                .collect::<TrafficResult<Vec<_>>>()
                .map(Some),
            None => Ok(None),
        }
    }

    /// The number of trips in a period. Zero if no demand was put for the category.
    pub fn get_trips(
        &self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
        period: usize,
    ) -> TrafficResult<u32> {
        match self.get_demand_pattern(origin, destination, category)? {
            Some(pattern) => pattern.trips(period).map(truncate_trips),
            None => Ok(0),
        }
    }

    /// Adds trips to a period, which may be negative as long as demand stays non-negative.
    /// Only stepwise demand can be changed this way.
    pub fn increase_trips(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        category: &Category,
        period: usize,
        trips: i64,
    ) -> TrafficResult<()> {
        let pattern = self
            .get_demand_pattern(origin, destination, category)?
            .ok_or_else(|| TrafficError::Demand(format!("no demand for category {}", category)))?;
        if !pattern.interpolation().is_stepwise() {
            return Err(TrafficError::Unsupported(
                "only stepwise demand can be increased by a number of trips".into(),
            ));
        }
        if period >= pattern.periods() {
            return Err(TrafficError::IndexOutOfRange {
                index: period,
                len: pattern.periods(),
            });
        }
        let times = pattern.times().to_vec();
        let mut demand = pattern.demand().to_vec();
        let additional = trips as f64 / ((times[period + 1] - times[period]) / SECONDS_PER_HOUR);
        if demand[period] < -additional {
            return Err(TrafficError::Unsupported("demand may not become negative".into()));
        }
        demand[period] += additional;
        self.put_demand_vector_with(
            origin,
            destination,
            category.clone(),
            demand,
            times,
            Interpolation::Stepwise,
        )
    }

    /// The total number of trips from `origin` to `destination`, over all categories and periods.
    pub fn origin_destination_total(&self, origin: NodeId, destination: NodeId) -> TrafficResult<u64> {
        let mut sum = 0;
        for category in self.get_categories(origin, destination)? {
            if let Some(trips) = self.get_trips_vector(origin, destination, category)? {
                sum += trips.iter().map(|n| *n as u64).sum::<u64>();
            }
        }
        Ok(sum)
    }

    pub fn origin_total(&self, origin: NodeId) -> TrafficResult<u64> {
        self.destinations
            .iter()
            .map(|destination| self.origin_destination_total(origin, *destination))
            .sum()
    }

    pub fn destination_total(&self, destination: NodeId) -> TrafficResult<u64> {
        self.origins
            .iter()
            .map(|origin| self.origin_destination_total(*origin, destination))
            .sum()
    }

    pub fn matrix_total(&self) -> u64 {
        iproduct!(&self.origins, &self.destinations)
            .map(|(origin, destination)| self.origin_destination_total(*origin, *destination).unwrap_or(0))
            .sum()
    }
}

fn truncate_trips(trips: f64) -> u32 {
    (trips + TRIP_ROUNDING).floor() as u32
}

impl fmt::Display for OdMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "OdMatrix [{}, {} origins, {} destinations, {}]",
            self.id,
            self.origins.len(),
            self.destinations.len(),
            self.categorization
        )?;
        let name = |node: &NodeId| self.names.get(node).map_or("?", String::as_str);
        let o_width = self.origins.iter().map(|o| name(o).len()).max().unwrap_or(1);
        let d_width = self.destinations.iter().map(|d| name(d).len()).max().unwrap_or(1);
        for origin in &self.origins {
            for destination in &self.destinations {
                let prefix = format!(
                    "{:<ow$} -> {:<dw$} | ",
                    name(origin),
                    name(destination),
                    ow = o_width,
                    dw = d_width
                );
                match self.demand.get(&(*origin, *destination)) {
                    Some(categories) if !categories.is_empty() => {
                        for (category, pattern) in categories {
                            writeln!(f, "{}{} | {:?}", prefix, category, pattern.demand())?;
                        }
                    }
                    _ => writeln!(f, "{}-no data-", prefix)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gtu::GtuType;
    use crate::math::Point2d;
    use crate::od::categorization::{CategoryValue, Dimension};
    use crate::route::Route;

    fn setup() -> (Network, NodeId, NodeId, OdMatrix) {
        let mut net = Network::new();
        let b = net.add_node("B", Point2d::new(100.0, 0.0));
        let a = net.add_node("A", Point2d::new(0.0, 0.0));
        let cat = Arc::new(Categorization::new("types", vec![Dimension::GtuType]).unwrap());
        let od = OdMatrix::new(
            "od",
            &[b, a],
            &[b],
            cat,
            vec![0.0, 1800.0, 3600.0],
            Interpolation::Stepwise,
            &net,
        )
        .unwrap();
        (net, a, b, od)
    }

    fn car(od: &OdMatrix) -> Category {
        Category::new(od.categorization(), vec![CategoryValue::GtuType(GtuType::car())]).unwrap()
    }

    #[test]
    fn origins_sorted_by_name() {
        let (_, a, b, od) = setup();
        assert_eq!(od.origins(), &[a, b]);
        assert_eq!(od.node_name(a), Some("A"));
    }

    #[test]
    fn trips_round_trip() {
        let (_, a, b, mut od) = setup();
        let car = car(&od);
        od.put_trips_vector(a, b, car.clone(), &[7, 13]).unwrap();
        assert_eq!(od.get_trips_vector(a, b, &car).unwrap(), Some(vec![7, 13]));
        assert_eq!(od.get_demand_vector(a, b, &car).unwrap(), Some(&[14.0, 26.0, 0.0][..]));
        assert_eq!(od.get_trips(a, b, &car, 1).unwrap(), 13);
        assert!(matches!(
            od.get_trips(a, b, &car, 2),
            Err(TrafficError::IndexOutOfRange { index: 2, len: 2 })
        ));

        od.increase_trips(a, b, &car, 0, -3).unwrap();
        assert_eq!(od.get_trips(a, b, &car, 0).unwrap(), 4);
        assert!(od.increase_trips(a, b, &car, 0, -5).is_err());
        assert_eq!(od.origin_total(a).unwrap(), 17);
        assert_eq!(od.destination_total(b).unwrap(), 17);
        assert_eq!(od.matrix_total(), 17);
    }

    #[test]
    fn increase_needs_stepwise() {
        let (_, a, b, mut od) = setup();
        let car = car(&od);
        od.put_demand_vector_with(a, b, car.clone(), vec![100.0, 200.0], vec![0.0, 3600.0], Interpolation::Linear)
            .unwrap();
        assert!(matches!(
            od.increase_trips(a, b, &car, 0, 1),
            Err(TrafficError::Unsupported(_))
        ));
        assert_eq!(od.get_trips(a, b, &car, 0).unwrap(), 150);
    }

    #[test]
    fn put_validates_input() {
        let (_, a, b, mut od) = setup();
        let car = car(&od);
        // Wrong length
        assert!(od.put_demand_vector(a, b, car.clone(), vec![1.0, 2.0]).is_err());
        // Not a destination
        assert!(matches!(
            od.put_demand_vector(a, a, car.clone(), vec![1.0, 2.0, 3.0]),
            Err(TrafficError::UnknownNode(_))
        ));
        // Wrong categorization
        assert!(matches!(
            od.put_demand_vector(a, b, Category::uncategorized(), vec![1.0, 2.0, 3.0]),
            Err(TrafficError::Category(_))
        ));
        od.put_demand_vector_scaled_per_period(
            a,
            b,
            car.clone(),
            &[100.0, 100.0, 0.0],
            vec![0.0, 1800.0, 3600.0],
            Interpolation::Stepwise,
            &[0.5, 1.0, 1.0],
        )
        .unwrap();
        assert_eq!(od.get_demand(a, b, &car, 100.0, true).unwrap(), 50.0);
        assert!(od.contains(a, b, &car));
        assert!(od.to_string().contains("A -> B | [CAR] | [50.0, 100.0, 0.0]"));
        assert!(od.to_string().contains("B -> B | -no data-"));
    }

    #[test]
    fn route_must_match_od() {
        let (net, a, b, _) = setup();
        let cat = Arc::new(Categorization::new("routes", vec![Dimension::Route]).unwrap());
        let mut od = OdMatrix::new("od", &[a], &[b], cat.clone(), vec![0.0, 3600.0], Interpolation::Stepwise, &net)
            .unwrap();
        let reverse = Route::new("BA", vec![b, a]).unwrap();
        let category = Category::new(&cat, vec![CategoryValue::Route(reverse)]).unwrap();
        assert!(matches!(
            od.put_demand_vector(a, b, category, vec![1.0, 1.0]),
            Err(TrafficError::RouteMismatch(_))
        ));
    }
}
