//! Reference routing back-end: deterministic cheapest insertion.
//!
//! Mandatory nodes (those in no disjunction) are inserted first, cheapest
//! feasible insertion at a time; droppable nodes follow while the avoided
//! disjunction penalty exceeds the marginal arc cost. Dimensions are
//! enforced generically through interval propagation over each candidate
//! route, so arrival windows and the capacity-0 precedence dimension go
//! through the same code path. All iteration orders are fixed, making the
//! search fully deterministic for a given model.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::solver::{
    Assignment, DimensionSpec, RouteAssignment, RoutingSolver, SearchParameters, TransitCallback,
};

/// Stand-ins for "no bound", kept far from the i64 edges so saturating
/// propagation cannot wrap.
const UNBOUNDED_MIN: i64 = i64::MIN / 4;
const UNBOUNDED_MAX: i64 = i64::MAX / 4;

struct Dimension {
    spec: DimensionSpec,
    node_ranges: HashMap<usize, (i64, i64)>,
    vehicle_start: Vec<(i64, i64)>,
    vehicle_end: Vec<(i64, i64)>,
}

impl Dimension {
    fn node_range(&self, node: usize) -> (i64, i64) {
        self.node_ranges
            .get(&node)
            .copied()
            .unwrap_or((UNBOUNDED_MIN, UNBOUNDED_MAX))
    }
}

/// Deterministic cheapest-insertion solver.
pub struct GreedySolver {
    node_count: usize,
    starts: Vec<usize>,
    ends: Vec<usize>,
    arc_costs: Vec<Option<TransitCallback>>,
    dimensions: Vec<Dimension>,
    disjunctions: Vec<(Vec<usize>, i64)>,
    allowed: HashMap<usize, Vec<usize>>,
}

impl GreedySolver {
    /// Creates a solver for `node_count` nodes and one vehicle per
    /// start/end pair.
    pub fn new(node_count: usize, starts: Vec<usize>, ends: Vec<usize>) -> Self {
        assert_eq!(
            starts.len(),
            ends.len(),
            "every vehicle needs a start and an end"
        );
        let vehicles = starts.len();
        Self {
            node_count,
            starts,
            ends,
            arc_costs: (0..vehicles).map(|_| None).collect(),
            dimensions: Vec::new(),
            disjunctions: Vec::new(),
            allowed: HashMap::new(),
        }
    }

    fn vehicle_count(&self) -> usize {
        self.starts.len()
    }

    fn arc_cost(&self, vehicle: usize, from: usize, to: usize) -> i64 {
        self.arc_costs[vehicle]
            .as_ref()
            .map(|cost| cost(from, to))
            .unwrap_or(0)
    }

    fn dimension(&self, name: &str) -> &Dimension {
        self.dimensions
            .iter()
            .find(|d| d.spec.name == name)
            .unwrap_or_else(|| panic!("unknown dimension '{name}'"))
    }

    fn dimension_mut(&mut self, name: &str) -> &mut Dimension {
        self.dimensions
            .iter_mut()
            .find(|d| d.spec.name == name)
            .unwrap_or_else(|| panic!("unknown dimension '{name}'"))
    }

    fn allowed_vehicles(&self, node: usize) -> Vec<usize> {
        match self.allowed.get(&node) {
            Some(vehicles) => vehicles.clone(),
            None => (0..self.vehicle_count()).collect(),
        }
    }

    /// Earliest feasible cumulative values along `route` for one
    /// dimension, or `None` if the route violates it.
    ///
    /// Bounds propagation over the chain: forward tightens successors
    /// (travel plus at most `slack_max` idle per arc), backward tightens
    /// predecessors, repeated to fixpoint. The earliest schedule is the
    /// final lower-bound vector.
    fn propagate(&self, dim: &Dimension, vehicle: usize, route: &[usize]) -> Option<Vec<i64>> {
        let n = route.len();
        let transit = &dim.spec.transits[vehicle];
        let slack = dim.spec.slack_max;

        let mut lo = Vec::with_capacity(n);
        let mut hi = Vec::with_capacity(n);
        for (i, &node) in route.iter().enumerate() {
            let (mut l, mut h) = dim.node_range(node);
            h = h.min(dim.spec.capacity);
            if i == 0 {
                let (smin, smax) = dim.vehicle_start[vehicle];
                l = l.max(smin);
                h = h.min(smax);
            }
            if i == n - 1 {
                let (emin, emax) = dim.vehicle_end[vehicle];
                l = l.max(emin);
                h = h.min(emax);
            }
            lo.push(l);
            hi.push(h);
        }

        let arcs: Vec<i64> = route
            .windows(2)
            .map(|pair| transit(pair[0], pair[1]))
            .collect();

        loop {
            let mut changed = false;
            for i in 0..n - 1 {
                let l = lo[i].saturating_add(arcs[i]);
                if l > lo[i + 1] {
                    lo[i + 1] = l;
                    changed = true;
                }
                let h = hi[i].saturating_add(arcs[i]).saturating_add(slack);
                if h < hi[i + 1] {
                    hi[i + 1] = h;
                    changed = true;
                }
            }
            for i in (0..n - 1).rev() {
                let h = hi[i + 1].saturating_sub(arcs[i]);
                if h < hi[i] {
                    hi[i] = h;
                    changed = true;
                }
                let l = lo[i + 1].saturating_sub(arcs[i]).saturating_sub(slack);
                if l > lo[i] {
                    lo[i] = l;
                    changed = true;
                }
            }
            if lo.iter().zip(&hi).any(|(l, h)| l > h) {
                return None;
            }
            if !changed {
                return Some(lo);
            }
        }
    }

    fn feasible(&self, vehicle: usize, route: &[usize]) -> bool {
        self.dimensions
            .iter()
            .all(|dim| self.propagate(dim, vehicle, route).is_some())
    }

    /// Arc-cost delta of inserting `node` before position `pos`.
    fn insertion_delta(&self, vehicle: usize, route: &[usize], pos: usize, node: usize) -> i64 {
        let before = route[pos - 1];
        let after = route[pos];
        self.arc_cost(vehicle, before, node) + self.arc_cost(vehicle, node, after)
            - self.arc_cost(vehicle, before, after)
    }

    /// Cheapest feasible insertion of `node` across vehicles and
    /// positions, bounded by `cap` when given (only strictly cheaper
    /// candidates are considered).
    fn best_insertion(
        &self,
        routes: &[Vec<usize>],
        node: usize,
        cap: Option<i64>,
    ) -> Option<(i64, usize, usize)> {
        let mut best: Option<(i64, usize, usize)> = None;
        for vehicle in self.allowed_vehicles(node) {
            let route = &routes[vehicle];
            for pos in 1..route.len() {
                let delta = self.insertion_delta(vehicle, route, pos, node);
                if let Some(cap) = cap {
                    if delta >= cap {
                        continue;
                    }
                }
                if best.is_some_and(|(d, _, _)| delta >= d) {
                    continue;
                }
                let mut candidate = route.clone();
                candidate.insert(pos, node);
                if self.feasible(vehicle, &candidate) {
                    best = Some((delta, vehicle, pos));
                }
            }
        }
        best
    }

    fn objective(&self, routes: &[Vec<usize>], visited: &HashSet<usize>) -> i64 {
        let mut total = 0;
        for (vehicle, route) in routes.iter().enumerate() {
            for pair in route.windows(2) {
                total += self.arc_cost(vehicle, pair[0], pair[1]);
            }
        }
        for (nodes, penalty) in &self.disjunctions {
            if !nodes.iter().any(|n| visited.contains(n)) {
                total += penalty;
            }
        }
        total
    }
}

impl RoutingSolver for GreedySolver {
    fn set_arc_cost(&mut self, vehicle: usize, cost: TransitCallback) {
        self.arc_costs[vehicle] = Some(cost);
    }

    fn add_dimension(&mut self, dimension: DimensionSpec) {
        assert_eq!(
            dimension.transits.len(),
            self.vehicle_count(),
            "one transit callback per vehicle"
        );
        let vehicles = self.vehicle_count();
        let default_span = if dimension.fix_start {
            (0, 0)
        } else {
            (UNBOUNDED_MIN, UNBOUNDED_MAX)
        };
        self.dimensions.push(Dimension {
            spec: dimension,
            node_ranges: HashMap::new(),
            vehicle_start: vec![default_span; vehicles],
            vehicle_end: vec![(UNBOUNDED_MIN, UNBOUNDED_MAX); vehicles],
        });
    }

    fn set_cumul_range(&mut self, dimension: &str, node: usize, min: i64, max: i64) {
        assert!(node < self.node_count, "node {node} out of range");
        self.dimension_mut(dimension)
            .node_ranges
            .insert(node, (min, max));
    }

    fn set_vehicle_cumul_ranges(
        &mut self,
        dimension: &str,
        vehicle: usize,
        start: (i64, i64),
        end: (i64, i64),
    ) {
        let dim = self.dimension_mut(dimension);
        dim.vehicle_start[vehicle] = start;
        dim.vehicle_end[vehicle] = end;
    }

    fn add_disjunction(&mut self, nodes: &[usize], penalty: i64) {
        self.disjunctions.push((nodes.to_vec(), penalty));
    }

    fn set_allowed_vehicles(&mut self, node: usize, vehicles: &[usize]) {
        self.allowed.insert(node, vehicles.to_vec());
    }

    fn solve(&mut self, parameters: &SearchParameters) -> Option<Assignment> {
        let deadline = Instant::now() + parameters.time_limit;

        let mut routes: Vec<Vec<usize>> = (0..self.vehicle_count())
            .map(|v| vec![self.starts[v], self.ends[v]])
            .collect();
        let mut visited: HashSet<usize> = routes.iter().flatten().copied().collect();

        let droppable: HashSet<usize> = self
            .disjunctions
            .iter()
            .flat_map(|(nodes, _)| nodes.iter().copied())
            .collect();
        let mut mandatory: Vec<usize> = (0..self.node_count)
            .filter(|n| !visited.contains(n) && !droppable.contains(n))
            .collect();

        // Every mandatory node must land somewhere; failure here is
        // infeasibility, not a cost decision.
        while !mandatory.is_empty() {
            if Instant::now() >= deadline {
                tracing::warn!("time limit reached before all required nodes were placed");
                return None;
            }
            let mut best: Option<(i64, usize, usize, usize)> = None;
            for &node in &mandatory {
                let cap = best.map(|(delta, _, _, _)| delta);
                if let Some((delta, vehicle, pos)) = self.best_insertion(&routes, node, cap) {
                    best = Some((delta, node, vehicle, pos));
                }
            }
            let (_, node, vehicle, pos) = best?;
            routes[vehicle].insert(pos, node);
            visited.insert(node);
            mandatory.retain(|&n| n != node);
        }

        // Droppable nodes pay their way in: insert while the avoided
        // penalty exceeds the marginal arc cost.
        loop {
            if Instant::now() >= deadline {
                break;
            }
            let mut best: Option<(i64, usize, usize, usize)> = None;
            for (nodes, penalty) in &self.disjunctions {
                if nodes.iter().any(|n| visited.contains(n)) {
                    continue;
                }
                for &node in nodes {
                    if let Some((delta, vehicle, pos)) =
                        self.best_insertion(&routes, node, Some(*penalty))
                    {
                        let savings = penalty - delta;
                        if best.map_or(true, |(s, _, _, _)| savings > s) {
                            best = Some((savings, node, vehicle, pos));
                        }
                    }
                }
            }
            let Some((_, node, vehicle, pos)) = best else {
                break;
            };
            routes[vehicle].insert(pos, node);
            visited.insert(node);
        }

        let objective = self.objective(&routes, &visited);
        let routes = routes
            .iter()
            .enumerate()
            .map(|(vehicle, route)| {
                let cumuls = self
                    .dimensions
                    .iter()
                    .map(|dim| {
                        let values = self
                            .propagate(dim, vehicle, route)
                            .expect("committed routes stay feasible");
                        (dim.spec.name.clone(), values)
                    })
                    .collect();
                RouteAssignment {
                    nodes: route.clone(),
                    cumuls,
                }
            })
            .collect();

        Some(Assignment { objective, routes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::routing::solver::{FirstSolutionStrategy, LocalSearchMetaheuristic};
    use std::sync::Arc;
    use std::time::Duration;

    fn params() -> SearchParameters {
        SearchParameters {
            first_solution: FirstSolutionStrategy::Automatic,
            metaheuristic: LocalSearchMetaheuristic::Automatic,
            time_limit: Duration::from_secs(5),
        }
    }

    fn callback(matrix: &Arc<Matrix<i64>>) -> TransitCallback {
        let matrix = Arc::clone(matrix);
        Box::new(move |a, b| matrix[(a, b)])
    }

    /// 4 nodes: hub 0, three sites 1..=3 on a line; cost = |a-b| scaled.
    fn line_costs() -> Arc<Matrix<i64>> {
        let mut m = Matrix::new(4);
        for a in 0..4i64 {
            for b in 0..4i64 {
                m.set(a as usize, b as usize, (a - b).abs() * 10);
            }
        }
        Arc::new(m)
    }

    #[test]
    fn mandatory_nodes_are_all_visited() {
        let costs = line_costs();
        let mut solver = GreedySolver::new(4, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        let assignment = solver.solve(&params()).unwrap();
        let mut nodes = assignment.routes[0].nodes.clone();
        nodes.sort_unstable();
        assert_eq!(nodes, vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn tour_on_a_line_costs_one_sweep() {
        let costs = line_costs();
        let mut solver = GreedySolver::new(4, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        let assignment = solver.solve(&params()).unwrap();
        // Any single out-and-back sweep over 1..=3 costs 60.
        assert_eq!(assignment.routes[0].nodes.len(), 5);
        assert_eq!(assignment.objective, 60);
    }

    #[test]
    fn droppable_node_is_skipped_when_penalty_is_low() {
        let costs = line_costs();
        let mut solver = GreedySolver::new(4, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.add_disjunction(&[3], 5);
        let assignment = solver.solve(&params()).unwrap();
        assert!(!assignment.routes[0].nodes.contains(&3));
        // 0→1→2→0 is 40 plus the 5 penalty.
        assert_eq!(assignment.objective, 45);
    }

    #[test]
    fn droppable_node_is_visited_when_penalty_dominates() {
        let costs = line_costs();
        let mut solver = GreedySolver::new(4, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.add_disjunction(&[3], 1_000);
        let assignment = solver.solve(&params()).unwrap();
        assert!(assignment.routes[0].nodes.contains(&3));
    }

    #[test]
    fn allowed_vehicles_are_respected() {
        let costs = line_costs();
        let mut solver = GreedySolver::new(4, vec![0, 0], vec![0, 0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.set_arc_cost(1, callback(&costs));
        solver.set_allowed_vehicles(1, &[1]);
        solver.set_allowed_vehicles(2, &[1]);
        solver.set_allowed_vehicles(3, &[1]);
        let assignment = solver.solve(&params()).unwrap();
        assert_eq!(assignment.routes[0].nodes, vec![0, 0]);
        assert_eq!(assignment.routes[1].nodes.len(), 5);
    }

    #[test]
    fn unvisitable_mandatory_node_means_no_assignment() {
        let costs = line_costs();
        let mut solver = GreedySolver::new(4, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.set_allowed_vehicles(2, &[]);
        assert!(solver.solve(&params()).is_none());
    }

    // ── Dimensions ────────────────────────────────────────────────────

    fn time_dimension(transits: Vec<TransitCallback>, slack: i64) -> DimensionSpec {
        DimensionSpec {
            name: "time".into(),
            transits,
            slack_max: slack,
            capacity: i64::MAX,
            fix_start: false,
        }
    }

    #[test]
    fn window_forces_ordering() {
        let costs = line_costs();
        let times = line_costs();
        let mut solver = GreedySolver::new(4, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.add_dimension(time_dimension(vec![callback(&times)], 0));
        solver.set_vehicle_cumul_ranges("time", 0, (0, 0), (0, i64::MAX));
        // Node 3 must be reached within 30 time units of the start; the
        // out-and-back sweep does that, any detour-first order would not.
        solver.set_cumul_range("time", 3, 0, 30);
        let assignment = solver.solve(&params()).unwrap();
        let route = &assignment.routes[0].nodes;
        let time = &assignment.routes[0].cumuls["time"];
        let at_3 = route.iter().position(|&n| n == 3).unwrap();
        assert!(time[at_3] <= 30);
    }

    #[test]
    fn unreachable_window_without_slack_is_infeasible() {
        let costs = line_costs();
        let times = line_costs();
        let mut solver = GreedySolver::new(2, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.add_dimension(time_dimension(vec![callback(&times)], 0));
        // Start pinned to 0, node 1 opens at 100, travel is 10, no idling.
        solver.set_vehicle_cumul_ranges("time", 0, (0, 0), (0, i64::MAX));
        solver.set_cumul_range("time", 1, 100, 200);
        assert!(solver.solve(&params()).is_none());
    }

    #[test]
    fn slack_allows_waiting_for_a_window() {
        let costs = line_costs();
        let times = line_costs();
        let mut solver = GreedySolver::new(2, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.add_dimension(time_dimension(vec![callback(&times)], 200));
        solver.set_vehicle_cumul_ranges("time", 0, (0, 0), (0, i64::MAX));
        solver.set_cumul_range("time", 1, 100, 200);
        let assignment = solver.solve(&params()).unwrap();
        let time = &assignment.routes[0].cumuls["time"];
        assert_eq!(assignment.routes[0].nodes, vec![0, 1, 0]);
        assert_eq!(time[1], 100);
    }

    #[test]
    fn floating_start_reaches_late_windows_without_slack() {
        let costs = line_costs();
        let times = line_costs();
        let mut solver = GreedySolver::new(2, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.add_dimension(time_dimension(vec![callback(&times)], 0));
        // Start may float: the vehicle leaves late instead of idling.
        solver.set_vehicle_cumul_ranges("time", 0, (0, i64::MAX), (0, i64::MAX));
        solver.set_cumul_range("time", 1, 100, 200);
        let assignment = solver.solve(&params()).unwrap();
        let time = &assignment.routes[0].cumuls["time"];
        assert_eq!(time[0], 90);
        assert_eq!(time[1], 100);
    }

    #[test]
    fn capacity_zero_dimension_blocks_invalid_arcs() {
        let costs = line_costs();
        // Forbid every arc into node 2 except from node 1.
        let mut invalid = Matrix::new(4);
        for a in 0..4 {
            if a != 1 {
                invalid.set(a, 2, 1);
            }
        }
        let invalid = Arc::new(invalid);
        let mut solver = GreedySolver::new(4, vec![0], vec![0]);
        solver.set_arc_cost(0, callback(&costs));
        solver.add_dimension(DimensionSpec {
            name: "precedence".into(),
            transits: vec![callback(&invalid)],
            slack_max: 0,
            capacity: 0,
            fix_start: true,
        });
        let assignment = solver.solve(&params()).unwrap();
        let route = &assignment.routes[0].nodes;
        let at_2 = route.iter().position(|&n| n == 2).unwrap();
        assert_eq!(route[at_2 - 1], 1, "node 2 must follow node 1");
    }

    #[test]
    fn solving_twice_is_deterministic() {
        let build = || {
            let costs = line_costs();
            let mut solver = GreedySolver::new(4, vec![0], vec![0]);
            solver.set_arc_cost(0, callback(&costs));
            solver.add_disjunction(&[2], 25);
            solver.solve(&params()).unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    #[should_panic(expected = "unknown dimension")]
    fn constraining_unknown_dimension_panics() {
        let mut solver = GreedySolver::new(2, vec![0], vec![0]);
        solver.set_cumul_range("ghost", 1, 0, 10);
    }
}
