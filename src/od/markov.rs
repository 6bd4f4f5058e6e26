use crate::error::{TrafficError, TrafficResult};
use rand::Rng;
use std::collections::HashMap;
use std::hash::Hash;

/// Index of the top-level transition matrix in the arena.
const ROOT: usize = 0;

#[derive(Clone, Debug)]
enum MarkovNode<S> {
    /// A single state.
    State { state: S, correlation: f64 },
    /// A group of states or sub-groups, drawn between by a transition matrix.
    Matrix {
        /// The state that was split into this group, none for the root.
        state: Option<S>,
        correlation: f64,
        /// Arena indices of the nodes in this matrix.
        nodes: Vec<usize>,
        /// For each node, the states it contains.
        members: Vec<Vec<S>>,
    },
}

impl<S> MarkovNode<S> {
    fn correlation(&self) -> f64 {
        match self {
            Self::State { correlation, .. } | Self::Matrix { correlation, .. } => *correlation,
        }
    }
}

/// Correlation between consecutive states drawn from a steady-state distribution.
///
/// A state with correlation `c` is drawn again after itself more often than its steady-state
/// share, while the steady-state shares themselves are kept. States can be grouped under a
/// super state, so that states within the group correlate more strongly with each other than
/// with states outside of it.
#[derive(Clone, Debug)]
pub struct MarkovCorrelation<S> {
    nodes: Vec<MarkovNode<S>>,
    /// Arena index of each state's leaf node.
    leaves: HashMap<S, usize>,
    /// Arena index of the group matrix created for each super state.
    groups: HashMap<S, usize>,
    /// Arena index of the matrix containing each state.
    containing: HashMap<S, usize>,
}

impl<S: Clone + Eq + Hash> Default for MarkovCorrelation<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Eq + Hash> MarkovCorrelation<S> {
    pub fn new() -> Self {
        Self {
            nodes: vec![MarkovNode::Matrix {
                state: None,
                correlation: 0.0,
                nodes: vec![],
                members: vec![],
            }],
            leaves: HashMap::new(),
            groups: HashMap::new(),
            containing: HashMap::new(),
        }
    }

    /// Adds a state at the top level.
    ///
    /// # Parameters
    /// * `state` - The state, which must not have been added before.
    /// * `correlation` - The correlation, in the range (-1, 1).
    pub fn add_state(&mut self, state: S, correlation: f64) -> TrafficResult<()> {
        if self.leaves.contains_key(&state) {
            return Err(TrafficError::Demand("state already defined in Markov correlation".into()));
        }
        if !(correlation > -1.0 && correlation < 1.0) {
            return Err(TrafficError::Demand(format!(
                "correlation {} at the top level must be in the range (-1, 1)",
                correlation
            )));
        }
        let leaf = self.push(MarkovNode::State {
            state: state.clone(),
            correlation,
        });
        self.add_to_matrix(ROOT, state.clone(), leaf);
        self.containing.insert(state.clone(), ROOT);
        self.leaves.insert(state, leaf);
        Ok(())
    }

    /// Adds a state to the group of `super_state`, creating the group if needed.
    ///
    /// # Parameters
    /// * `super_state` - A state added before, which becomes the group.
    /// * `state` - The state, which must not have been added before.
    /// * `correlation` - The correlation within the group, in the range [0, 1). It may not be
    ///   lower than the correlation of the super state.
    pub fn add_grouped_state(&mut self, super_state: S, state: S, correlation: f64) -> TrafficResult<()> {
        if self.leaves.contains_key(&state) {
            return Err(TrafficError::Demand("state already defined in Markov correlation".into()));
        }
        if !(correlation >= 0.0 && correlation < 1.0) {
            return Err(TrafficError::Demand(format!(
                "correlation {} in a group must be in the range [0, 1)",
                correlation
            )));
        }
        let group = match self.groups.get(&super_state) {
            Some(group) => *group,
            None => self.split_into_group(&super_state)?,
        };
        let group_correlation = self.nodes[group].correlation();
        if correlation < group_correlation {
            return Err(TrafficError::Demand(
                "states in a group can not have a lower correlation than the group".into(),
            ));
        }
        let leaf = self.push(MarkovNode::State {
            state: state.clone(),
            correlation: (correlation - group_correlation) / (1.0 - group_correlation),
        });
        self.add_to_matrix(group, state.clone(), leaf);
        self.containing.insert(state.clone(), group);
        self.leaves.insert(state.clone(), leaf);

        // Matrices that hold the group as one node now also hold the new state
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if i == group {
                continue;
            }
            if let MarkovNode::Matrix { members, .. } = node {
                if let Some(set) = members.iter_mut().find(|set| set.contains(&super_state)) {
                    set.push(state.clone());
                }
            }
        }
        Ok(())
    }

    /// Draws the state that follows `previous`.
    ///
    /// States that were not added before are added at the top level without correlation.
    /// Returns `None` if the steady state has no positive intensity.
    ///
    /// # Parameters
    /// * `previous` - The previously drawn state, if any.
    /// * `states` - The states to draw from.
    /// * `steady_state` - The intensity of each state, e.g. its demand.
    /// * `rng` - The random number generator.
    pub fn draw_state(
        &mut self,
        previous: Option<&S>,
        states: &[S],
        steady_state: &[f64],
        rng: &mut impl Rng,
    ) -> TrafficResult<Option<S>> {
        if states.len() != steady_state.len() {
            return Err(TrafficError::Demand(format!(
                "{} states but {} steady-state intensities",
                states.len(),
                steady_state.len()
            )));
        }
        let mut intensities = HashMap::new();
        for (state, intensity) in states.iter().zip(steady_state) {
            if !self.leaves.contains_key(state) {
                self.add_state(state.clone(), 0.0)?;
            }
            intensities.insert(state.clone(), *intensity);
        }
        Ok(self.draw_from(ROOT, previous, &intensities, rng))
    }

    fn push(&mut self, node: MarkovNode<S>) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn add_to_matrix(&mut self, matrix: usize, state: S, node: usize) {
        if let MarkovNode::Matrix { nodes, members, .. } = &mut self.nodes[matrix] {
            nodes.push(node);
            members.push(vec![state]);
        }
    }

    /// Replaces the leaf of `super_state` by a group matrix that contains the leaf.
    fn split_into_group(&mut self, super_state: &S) -> TrafficResult<usize> {
        let (leaf, parent) = match (self.leaves.get(super_state), self.containing.get(super_state)) {
            (Some(leaf), Some(parent)) => (*leaf, *parent),
            _ => {
                return Err(TrafficError::Demand(
                    "no state has been defined for the super state".into(),
                ))
            }
        };
        let correlation = self.nodes[leaf].correlation();
        let group = self.push(MarkovNode::Matrix {
            state: Some(super_state.clone()),
            correlation,
            nodes: vec![leaf],
            members: vec![vec![super_state.clone()]],
        });
        if let MarkovNode::Matrix { nodes, .. } = &mut self.nodes[parent] {
            if let Some(slot) = nodes.iter_mut().find(|n| **n == leaf) {
                *slot = group;
            }
        }
        if let MarkovNode::State { correlation, .. } = &mut self.nodes[leaf] {
            *correlation = 0.0;
        }
        self.groups.insert(super_state.clone(), group);
        self.containing.insert(super_state.clone(), group);
        Ok(group)
    }

    fn intensity(&self, node: usize, intensities: &HashMap<S, f64>) -> f64 {
        match &self.nodes[node] {
            MarkovNode::State { state, .. } => intensities.get(state).copied().unwrap_or(0.0),
            MarkovNode::Matrix { nodes, .. } => nodes.iter().map(|n| self.intensity(*n, intensities)).sum(),
        }
    }

    fn draw_from(
        &self,
        node: usize,
        previous: Option<&S>,
        intensities: &HashMap<S, f64>,
        rng: &mut impl Rng,
    ) -> Option<S> {
        let (nodes, members) = match &self.nodes[node] {
            MarkovNode::State { state, .. } => return Some(state.clone()),
            MarkovNode::Matrix { nodes, members, .. } => (nodes, members),
        };
        let node_intensities = nodes
            .iter()
            .map(|n| self.intensity(*n, intensities))
            .collect::<Vec<_>>();
        let total: f64 = node_intensities.iter().sum();
        if !(total > 0.0) {
            return None;
        }

        // Row of the previous state, if this matrix contains it
        let row = previous.and_then(|prev| members.iter().position(|set| set.contains(prev)));
        let mut p = vec![0.0; nodes.len()];
        match row {
            None => {
                for (j, intensity) in node_intensities.iter().enumerate() {
                    p[j] = intensity / total;
                }
            }
            Some(i) => {
                let i_factor = 1.0 - self.nodes[nodes[i]].correlation();
                let mut sum = 0.0;
                for (j, intensity) in node_intensities.iter().enumerate() {
                    if j != i {
                        let j_factor = 1.0 - self.nodes[nodes[j]].correlation();
                        p[j] = j_factor * i_factor * intensity / total;
                        sum += p[j];
                    }
                }
                // The diagonal completes the row; negative correlations may overshoot
                if sum <= 1.0 {
                    p[i] = 1.0 - sum;
                } else {
                    p.iter_mut().for_each(|pj| *pj /= sum);
                }
            }
        }

        let r: f64 = rng.gen();
        let mut cumulative = 0.0;
        let mut chosen = None;
        for (j, pj) in p.iter().enumerate() {
            cumulative += pj;
            if *pj > 0.0 {
                chosen = Some(j);
                if r < cumulative {
                    break;
                }
            }
        }
        self.draw_from(nodes[chosen?], previous, intensities, rng)
    }
}

/// A Markov correlation together with the last state drawn from it.
#[derive(Clone, Debug)]
pub struct MarkovChain<S> {
    correlation: MarkovCorrelation<S>,
    previous: Option<S>,
}

impl<S: Clone + Eq + Hash> MarkovChain<S> {
    pub fn new(correlation: MarkovCorrelation<S>) -> Self {
        Self {
            correlation,
            previous: None,
        }
    }

    pub fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }

    /// Draws the next state, and remembers it.
    pub fn draw(&mut self, states: &[S], steady_state: &[f64], rng: &mut impl Rng) -> TrafficResult<Option<S>> {
        let next = self
            .correlation
            .draw_state(self.previous.as_ref(), states, steady_state, rng)?;
        if next.is_some() {
            self.previous = next.clone();
        }
        Ok(next)
    }
}
