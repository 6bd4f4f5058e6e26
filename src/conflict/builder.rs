use super::combinations::LaneCombinationList;
use super::geometry::{conflict_side, find_regions, LaneEdges, PairTopology, Region};
use super::rule::{resolve_priorities, BusStopConflictRule, ConflictRule, DefaultConflictRule, TrafficHand};
use super::width::{RelativeWidthGenerator, WidthGenerator};
use super::{ConflictPair, ConflictType};
use crate::debug::debug_polygon;
use crate::error::{TrafficError, TrafficResult};
use crate::gtu::GtuType;
use crate::link::LinkPriority;
use crate::{Lane, LaneId, Network};
use log::{debug, trace};
use once_cell::sync::OnceCell;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// The number of lane pair combinations between progress messages.
const PROGRESS_INTERVAL: u64 = 100_000_000;

/// The maximum number of lane tasks queued at once when building in parallel.
pub const MAX_IN_FLIGHT: usize = 200;

/// How long to wait for queued tasks after the last one is submitted.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Finds the conflicts between the lanes of a network.
///
/// ```ignore
/// let builder = ConflictBuilder::new()
///     .with_width_generator(FixedWidthGenerator::new(2.5))
///     .with_traffic_hand(TrafficHand::Left);
/// let report = network.build_conflicts(&builder)?;
/// ```
pub struct ConflictBuilder {
    /// The width of the lane areas that may conflict.
    width: Box<dyn WidthGenerator>,
    /// Lane pairs for which no conflicts are built.
    ignore: LaneCombinationList,
    /// Lane pairs whose conflicts are permitted by traffic control.
    permitted: LaneCombinationList,
    /// The side of the road traffic drives on.
    traffic_hand: TrafficHand,
    /// The type of GTU given priority at bus stops.
    bus_type: GtuType,
    /// The maximum number of queued tasks when building in parallel.
    pub(super) max_in_flight: usize,
    /// How long to wait for queued tasks when building in parallel.
    pub(super) drain_timeout: Duration,
}

impl Default for ConflictBuilder {
    fn default() -> Self {
        Self {
            width: Box::new(RelativeWidthGenerator::default()),
            ignore: LaneCombinationList::new(),
            permitted: LaneCombinationList::new(),
            traffic_hand: TrafficHand::default(),
            bus_type: GtuType::bus(),
            max_in_flight: MAX_IN_FLIGHT,
            drain_timeout: DRAIN_TIMEOUT,
        }
    }
}

impl ConflictBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_width_generator(mut self, width: impl WidthGenerator + 'static) -> Self {
        self.width = Box::new(width);
        self
    }

    /// Sets the lane pairs for which no conflicts are built.
    pub fn with_ignore_list(mut self, ignore: LaneCombinationList) -> Self {
        self.ignore = ignore;
        self
    }

    /// Sets the lane pairs whose conflicts are permitted by traffic control.
    pub fn with_permitted_list(mut self, permitted: LaneCombinationList) -> Self {
        self.permitted = permitted;
        self
    }

    pub fn with_traffic_hand(mut self, traffic_hand: TrafficHand) -> Self {
        self.traffic_hand = traffic_hand;
        self
    }

    pub fn with_bus_type(mut self, bus_type: GtuType) -> Self {
        self.bus_type = bus_type;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn width_generator(&self) -> &dyn WidthGenerator {
        &*self.width
    }

    pub fn traffic_hand(&self) -> TrafficHand {
        self.traffic_hand
    }

    /// Finds the conflicts between all pairs of the given lanes, one lane at a time.
    pub(crate) fn build(&self, network: &Network, lanes: &[LaneId]) -> TrafficResult<ConflictBatch> {
        let mut progress = Progress::new(lanes.len());
        trace!(
            "Generating conflicts (sequential), {} combinations",
            progress.total()
        );
        let cache = EdgeCache::new(self.width_generator(), lanes);
        let counters = ConflictCounters::default();
        let mut pairs = vec![];
        for i in 0..lanes.len() {
            progress.lane_started(i, &counters);
            pairs.extend(self.scan_lane(network, &cache, lanes, i, &counters)?);
        }
        let report = counters.report();
        report.log_complete();
        Ok(ConflictBatch { pairs, report })
    }

    /// Finds the conflicts between two lanes. The ignore list does not apply.
    pub(crate) fn build_pair(
        &self,
        network: &Network,
        lane1: LaneId,
        lane2: LaneId,
        permitted: bool,
    ) -> TrafficResult<ConflictBatch> {
        let cache = EdgeCache::new(self.width_generator(), &[lane1, lane2]);
        let counters = ConflictCounters::default();
        let pairs = self.scan_pair(network, &cache, lane1, lane2, permitted, &counters)?;
        Ok(ConflictBatch {
            pairs,
            report: counters.report(),
        })
    }

    /// Finds the conflicts of lane `i` with all lanes after it.
    pub(super) fn scan_lane(
        &self,
        network: &Network,
        cache: &EdgeCache,
        lanes: &[LaneId],
        i: usize,
        counters: &ConflictCounters,
    ) -> TrafficResult<Vec<ConflictPair>> {
        let lane1 = lanes[i];
        let mut out = vec![];
        for &lane2 in &lanes[i + 1..] {
            if self.ignore.contains(lane1, lane2) {
                counters.ignored_pairs.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            let permitted = self.permitted.contains(lane1, lane2);
            out.extend(self.scan_pair(network, cache, lane1, lane2, permitted, counters)?);
        }
        Ok(out)
    }

    fn scan_pair(
        &self,
        network: &Network,
        cache: &EdgeCache,
        lane1: LaneId,
        lane2: LaneId,
        permitted: bool,
        counters: &ConflictCounters,
    ) -> TrafficResult<Vec<ConflictPair>> {
        let (l1, l2) = (lookup(network, lane1)?, lookup(network, lane2)?);
        if !l1.contour().intersects(l2.contour()) {
            counters.disjoint_pairs.fetch_add(1, Ordering::Relaxed);
            return Ok(vec![]);
        }

        let topology = PairTopology {
            merge: l1.downstream().iter().any(|d| l2.downstream().contains(d)),
            split: l1.upstream().iter().any(|u| l2.upstream().contains(u)),
            same_link: l1.link() == l2.link(),
        };
        let edges1 = cache.get(network, lane1)?;
        let edges2 = cache.get(network, lane2)?;
        find_regions(edges1, edges2, topology, counters)
            .into_iter()
            .map(|region| self.make_pair(network, l1, l2, region, permitted, counters))
            .collect()
    }

    fn make_pair(
        &self,
        network: &Network,
        lane1: &Lane,
        lane2: &Lane,
        region: Region,
        permitted: bool,
        counters: &ConflictCounters,
    ) -> TrafficResult<ConflictPair> {
        let (rule, permitted) = match region.conflict_type {
            ConflictType::Split => (ConflictRule::Split, false),
            _ => (self.rule_for(network, lane1, lane2)?, permitted),
        };
        let sides = [
            conflict_side(lane1, region.fractions1, self.width_generator())?,
            conflict_side(lane2, region.fractions2, self.width_generator())?,
        ];
        for side in &sides {
            debug_polygon("conflict", &side.footprint);
        }
        let counter = match region.conflict_type {
            ConflictType::Merge => &counters.merge,
            ConflictType::Split => &counters.split,
            ConflictType::Crossing => &counters.crossing,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(ConflictPair {
            conflict_type: region.conflict_type,
            rule,
            permitted,
            sides,
        })
    }

    /// The rule for a merge or crossing between two lanes.
    fn rule_for(&self, network: &Network, lane1: &Lane, lane2: &Lane) -> TrafficResult<ConflictRule> {
        let priorities = [lane1, lane2].map(|lane| network.link(lane.link()).priority());
        match priorities.map(LinkPriority::is_bus_stop) {
            [true, true] => Err(TrafficError::BothBusStop),
            [true, false] | [false, true] => Ok(ConflictRule::BusStop(BusStopConflictRule::new(
                self.bus_type.clone(),
            ))),
            [false, false] => {
                // Fail now on combinations that cannot be resolved for any geometry
                resolve_priorities(priorities, [0.0; 2], self.traffic_hand)?;
                Ok(ConflictRule::Default(DefaultConflictRule::new(self.traffic_hand)))
            }
        }
    }
}

fn lookup(network: &Network, lane: LaneId) -> TrafficResult<&Lane> {
    network
        .get_lane(lane)
        .ok_or_else(|| TrafficError::UnknownLane(format!("{:?}", lane)))
}

/// The outcome of building conflicts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuildReport {
    /// The number of merge conflict pairs.
    pub merge: usize,
    /// The number of split conflict pairs.
    pub split: usize,
    /// The number of crossing conflict pairs.
    pub crossing: usize,
    /// Merges where no edge intersection was found, which start at the start of the lanes.
    pub merge_fixes: usize,
    /// Splits where no edge intersection was found, which end at the end of the lanes.
    pub split_fixes: usize,
    /// Crossings that were never closed, and were skipped.
    pub crossing_fixes: usize,
    /// Lane pairs skipped by the ignore list.
    pub ignored_pairs: usize,
    /// Lane pairs whose contours do not overlap.
    pub disjoint_pairs: usize,
    /// Lane tasks that failed when building in parallel.
    pub failed_tasks: usize,
    /// Whether building in parallel gave up waiting for tasks.
    pub timed_out: bool,
}

impl BuildReport {
    /// The total number of conflict pairs.
    pub fn conflict_pairs(&self) -> usize {
        self.merge + self.split + self.crossing
    }

    pub(super) fn log_complete(&self) {
        trace!(
            "Generating conflicts complete ({} merge, {} split, {} crossing conflicts)",
            self.merge,
            self.split,
            self.crossing
        );
    }
}

/// Counters shared by the tasks that build conflicts.
#[derive(Debug, Default)]
pub(crate) struct ConflictCounters {
    pub merge: AtomicUsize,
    pub split: AtomicUsize,
    pub crossing: AtomicUsize,
    pub merge_fixes: AtomicUsize,
    pub split_fixes: AtomicUsize,
    pub crossing_fixes: AtomicUsize,
    pub ignored_pairs: AtomicUsize,
    pub disjoint_pairs: AtomicUsize,
    pub failed_tasks: AtomicUsize,
}

impl ConflictCounters {
    pub fn report(&self) -> BuildReport {
        let get = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        BuildReport {
            merge: get(&self.merge),
            split: get(&self.split),
            crossing: get(&self.crossing),
            merge_fixes: get(&self.merge_fixes),
            split_fixes: get(&self.split_fixes),
            crossing_fixes: get(&self.crossing_fixes),
            ignored_pairs: get(&self.ignored_pairs),
            disjoint_pairs: get(&self.disjoint_pairs),
            failed_tasks: get(&self.failed_tasks),
            timed_out: false,
        }
    }
}

/// The conflict pairs found by a build, ready to be added to the network.
pub(crate) struct ConflictBatch {
    pub pairs: Vec<ConflictPair>,
    pub report: BuildReport,
}

/// Lane edges, computed at most once per lane.
/// Each lane has its own cell, so different lanes can be computed concurrently.
pub(super) struct EdgeCache<'a> {
    width: &'a dyn WidthGenerator,
    edges: SecondaryMap<LaneId, OnceCell<LaneEdges>>,
}

impl<'a> EdgeCache<'a> {
    pub fn new(width: &'a dyn WidthGenerator, lanes: &[LaneId]) -> Self {
        let mut edges = SecondaryMap::new();
        for lane in lanes {
            edges.insert(*lane, OnceCell::new());
        }
        Self { width, edges }
    }

    pub fn get(&self, network: &Network, lane: LaneId) -> TrafficResult<&LaneEdges> {
        let cell = self
            .edges
            .get(lane)
            .ok_or_else(|| TrafficError::UnknownLane(format!("{:?}", lane)))?;
        cell.get_or_try_init(|| LaneEdges::new(lookup(network, lane)?, self.width))
    }
}

/// Reports progress through the triangle of lane pairs.
pub(super) struct Progress {
    lanes: u64,
    total: u64,
    last_reported: u64,
}

impl Progress {
    pub fn new(lanes: usize) -> Self {
        let lanes = lanes as u64;
        Self {
            lanes,
            total: lanes * lanes.saturating_sub(1) / 2,
            last_reported: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Logs progress if another interval of combinations has passed before lane `i`.
    pub fn lane_started(&mut self, i: usize, counters: &ConflictCounters) {
        let remaining = self.lanes - i as u64;
        let done = self.total.saturating_sub(remaining * remaining / 2);
        if done / PROGRESS_INTERVAL > self.last_reported {
            let report = counters.report();
            debug!(
                "Generating conflicts at {:.0}% ({} merge, {} split, {} crossing conflicts)",
                100.0 * done as f64 / self.total as f64,
                report.merge,
                report.split,
                report.crossing
            );
            self.last_reported = done / PROGRESS_INTERVAL;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn progress_is_reported_per_interval() {
        let counters = ConflictCounters::default();
        let mut progress = Progress::new(30_000);
        assert_eq!(progress.total(), 449_985_000);
        progress.lane_started(0, &counters);
        assert_eq!(progress.last_reported, 0);
        progress.lane_started(10_000, &counters);
        assert_eq!(progress.last_reported, 2);
        progress.lane_started(29_999, &counters);
        assert_eq!(progress.last_reported, 4);
    }
}
