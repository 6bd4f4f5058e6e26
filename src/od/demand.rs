use super::categorization::Category;
use super::markov::MarkovChain;
use super::pattern::DemandPattern;
use crate::error::{TrafficError, TrafficResult};
use crate::gtu::GtuType;
use crate::sim::Stream;
use crate::NodeId;
use rand::distributions::{Distribution, WeightedIndex};
use std::cell::RefCell;
use std::rc::Rc;

/// Anything that has a demand over time, in veh/h.
pub trait DemandFrequency {
    /// The demand at `time`. At the start of a time slice, `slice_start` selects the slice
    /// that starts at `time` over the one that ends there.
    fn frequency(&self, time: f64, slice_start: bool) -> f64;

    /// The first time after `time` at which the demand changes course.
    fn next_time_slice(&self, time: f64) -> Option<f64>;
}

/// The demand of one category, at the bottom of a demand tree.
#[derive(Clone, Debug)]
pub struct DemandLeaf {
    category: Category,
    pattern: DemandPattern,
}

impl DemandLeaf {
    pub fn new(category: Category, pattern: DemandPattern) -> Self {
        Self { category, pattern }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn pattern(&self) -> &DemandPattern {
        &self.pattern
    }
}

impl DemandFrequency for DemandLeaf {
    fn frequency(&self, time: f64, slice_start: bool) -> f64 {
        self.pattern.frequency(time, slice_start)
    }

    fn next_time_slice(&self, time: f64) -> Option<f64> {
        self.pattern.next_time_slice(time)
    }
}

/// A branch in a demand tree, from which a child is drawn in proportion to its demand.
///
/// With a Markov chain, the GTU type is drawn first, correlated to the previously drawn
/// GTU type, and the child is then drawn among the children of that type.
#[derive(Debug)]
pub struct DemandNode<T, K> {
    object: T,
    children: Vec<K>,
    /// The GTU type of each child, if registered with one.
    child_gtu_types: Vec<Option<GtuType>>,
    /// The distinct GTU types of the children, in order of registration.
    gtu_types: Vec<GtuType>,
    stream: Stream,
    /// Shared by the branches of one generator, so that all of them continue the same chain.
    markov: Option<SharedMarkovChain>,
}

/// A Markov chain over GTU types, shared between demand branches.
pub type SharedMarkovChain = Rc<RefCell<MarkovChain<GtuType>>>;

/// Branch of the destinations of one origin.
pub type OriginNode = DemandNode<NodeId, DestinationNode>;

/// Branch of the categories of one origin-destination pair.
pub type DestinationNode = DemandNode<NodeId, DemandLeaf>;

impl<T, K: DemandFrequency> DemandNode<T, K> {
    pub fn new(object: T, stream: Stream, markov: Option<SharedMarkovChain>) -> Self {
        Self {
            object,
            children: vec![],
            child_gtu_types: vec![],
            gtu_types: vec![],
            stream,
            markov,
        }
    }

    pub fn object(&self) -> &T {
        &self.object
    }

    pub fn children(&self) -> &[K] {
        &self.children
    }

    pub fn is_markovian(&self) -> bool {
        self.markov.is_some()
    }

    pub fn add_child(&mut self, child: K) {
        self.children.push(child);
        self.child_gtu_types.push(None);
    }

    /// Adds a child of the given GTU type, which a Markov chain can select on.
    pub fn add_leaf(&mut self, child: K, gtu_type: GtuType) {
        if !self.gtu_types.contains(&gtu_type) {
            self.gtu_types.push(gtu_type.clone());
        }
        self.children.push(child);
        self.child_gtu_types.push(Some(gtu_type));
    }

    /// Draws a child in proportion to the children's demand at `time`.
    pub fn draw(&self, time: f64) -> TrafficResult<&K> {
        // The slice that starts at `time` applies to what is generated from it
        let frequencies = self
            .children
            .iter()
            .map(|child| child.frequency(time, true))
            .collect::<Vec<_>>();
        let mut rng = self.stream.borrow_mut();

        let mut weights = frequencies.clone();
        if let Some(markov) = &self.markov {
            let steady_state = self
                .gtu_types
                .iter()
                .map(|gtu_type| {
                    self.child_gtu_types
                        .iter()
                        .zip(&frequencies)
                        .filter(|(t, _)| t.as_ref() == Some(gtu_type))
                        .map(|(_, f)| *f)
                        .sum::<f64>()
                })
                .collect::<Vec<_>>();
            let next = markov
                .borrow_mut()
                .draw(&self.gtu_types, &steady_state, &mut *rng)?;
            if let Some(next) = next {
                let selected = self
                    .child_gtu_types
                    .iter()
                    .zip(&frequencies)
                    .map(|(t, f)| if t.as_ref() == Some(&next) { *f } else { 0.0 })
                    .collect::<Vec<_>>();
                // The chain may stay on a type that has no demand left at this time
                if selected.iter().any(|f| *f > 0.0) {
                    weights = selected;
                }
            }
        }

        let index = WeightedIndex::new(&weights)
            .map_err(|_| TrafficError::Demand(format!("no demand to draw from at {} s", time)))?
            .sample(&mut *rng);
        Ok(&self.children[index])
    }
}

impl<T, U: PartialEq, L: DemandFrequency> DemandNode<T, DemandNode<U, L>> {
    /// The child branch for `object`, if there is one.
    pub fn child_mut(&mut self, object: &U) -> Option<&mut DemandNode<U, L>> {
        self.children.iter_mut().find(|child| child.object == *object)
    }
}

impl<T, K: DemandFrequency> DemandFrequency for DemandNode<T, K> {
    fn frequency(&self, time: f64, slice_start: bool) -> f64 {
        self.children
            .iter()
            .map(|child| child.frequency(time, slice_start))
            .sum()
    }

    fn next_time_slice(&self, time: f64) -> Option<f64> {
        self.children
            .iter()
            .filter_map(|child| child.next_time_slice(time))
            .min_by(|a, b| a.total_cmp(b))
    }
}
