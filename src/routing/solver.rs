//! The abstract routing back-end.
//!
//! The engine never talks to a concrete solver directly; it programs this
//! interface. Any back-end able to evaluate per-vehicle transit callbacks,
//! carry cumulative dimensions with slack and windows, honor per-node
//! vehicle restrictions and price node drops through disjunctions can sit
//! behind it.

use std::collections::HashMap;
use std::time::Duration;

/// Per-vehicle transit evaluator over node ids.
pub type TransitCallback = Box<dyn Fn(usize, usize) -> i64 + Send + Sync>;

/// How the back-end finds its first solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstSolutionStrategy {
    /// Let the back-end pick.
    #[default]
    Automatic,
    /// Repeatedly extend routes along the cheapest feasible arc.
    PathCheapestArc,
}

/// Local-search strategy applied after the first solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalSearchMetaheuristic {
    /// Let the back-end pick.
    #[default]
    Automatic,
    /// Plain descent; stops at the first local optimum.
    GreedyDescent,
}

/// Search controls handed to [`RoutingSolver::solve`].
#[derive(Debug, Clone)]
pub struct SearchParameters {
    pub first_solution: FirstSolutionStrategy,
    pub metaheuristic: LocalSearchMetaheuristic,
    pub time_limit: Duration,
}

/// A cumulative dimension: per-vehicle transit callbacks, bounded slack at
/// every node, a hard cap on the cumulative value, and optionally a start
/// pinned to zero.
pub struct DimensionSpec {
    pub name: String,
    /// One callback per vehicle, indexed by vehicle id.
    pub transits: Vec<TransitCallback>,
    pub slack_max: i64,
    pub capacity: i64,
    pub fix_start: bool,
}

/// One vehicle's share of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAssignment {
    /// Visited nodes from start hub to end hub inclusive.
    pub nodes: Vec<usize>,
    /// Cumulative values per dimension name, parallel to `nodes`.
    pub cumuls: HashMap<String, Vec<i64>>,
}

/// A complete solution returned by the back-end.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Arc costs plus disjunction penalties for dropped nodes.
    pub objective: i64,
    /// One route per vehicle, in vehicle order.
    pub routes: Vec<RouteAssignment>,
}

impl Assignment {
    /// Iterates every node visited by any vehicle.
    pub fn visited_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.routes.iter().flat_map(|r| r.nodes.iter().copied())
    }
}

/// Model-building and solving API of a routing back-end.
///
/// A back-end is constructed for a fixed node count and per-vehicle
/// start/end nodes; the model then programs it through these calls, in any
/// order, before a single time-bounded [`solve`](Self::solve). Callbacks
/// registered on one back-end instance must never be invoked by another.
pub trait RoutingSolver {
    /// Sets the arc-cost evaluator for one vehicle; arcs contribute to the
    /// objective through it.
    fn set_arc_cost(&mut self, vehicle: usize, cost: TransitCallback);

    /// Registers a cumulative dimension.
    fn add_dimension(&mut self, dimension: DimensionSpec);

    /// Constrains a node's cumulative value on a dimension.
    ///
    /// # Panics
    ///
    /// Panics if the dimension has not been registered; constraining an
    /// unknown dimension is a programming error.
    fn set_cumul_range(&mut self, dimension: &str, node: usize, min: i64, max: i64);

    /// Constrains one vehicle's start and end cumulative values.
    ///
    /// # Panics
    ///
    /// Panics if the dimension has not been registered.
    fn set_vehicle_cumul_ranges(
        &mut self,
        dimension: &str,
        vehicle: usize,
        start: (i64, i64),
        end: (i64, i64),
    );

    /// Makes the nodes droppable as a set at the given penalty.
    fn add_disjunction(&mut self, nodes: &[usize], penalty: i64);

    /// Restricts which vehicles may visit a node. An empty list makes the
    /// node unvisitable.
    fn set_allowed_vehicles(&mut self, node: usize, vehicles: &[usize]);

    /// Runs the search. `None` means no feasible assignment was found
    /// within the time limit.
    fn solve(&mut self, parameters: &SearchParameters) -> Option<Assignment>;
}
