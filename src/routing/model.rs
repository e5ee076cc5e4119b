//! Constraint-model construction over the abstract solver.

use std::sync::Arc;
use std::time::Duration;

use super::error::ModelError;
use super::solver::{
    DimensionSpec, FirstSolutionStrategy, LocalSearchMetaheuristic, RoutingSolver,
    SearchParameters,
};
use crate::graph::{Node, NodeRole};
use crate::matrix::Matrix;
use crate::model::{ProblemModel, WorkerId};
use crate::vehicle::{Vehicle, COST_SCALE};

/// Name of the time dimension; cumulative values are seconds since T₀.
pub const TIME_DIMENSION: &str = "SecondsSinceT0";

/// Name of the precedence dimension; any positive cumulative value is
/// infeasible.
pub const PRECEDENCE_DIMENSION: &str = "Precedence";

/// The fully-derived constraint model, ready to program any
/// [`RoutingSolver`].
///
/// Construction performs every check that must fail before search:
/// start/end hub resolution, window sanity against T₀, and vehicle
/// eligibility (a required job nobody can serve is a
/// [`ModelError::NoViableWorker`]).
#[derive(Debug)]
pub struct RoutingModel {
    vehicles: Arc<Vec<Vehicle>>,
    invalid: Arc<Matrix<i64>>,
    starts: Vec<usize>,
    ends: Vec<usize>,
    /// Head-node arrival windows, seconds since T₀.
    windows: Vec<(usize, (i64, i64))>,
    /// Per vehicle: allowed cumulative range at route start and end.
    spans: Vec<((i64, i64), (i64, i64))>,
    /// Per restricted node: vehicles that may visit it.
    allowed: Vec<(usize, Vec<usize>)>,
    /// Per droppable node: its disjunction penalty.
    disjunctions: Vec<(usize, i64)>,
    max_idle_seconds: i64,
}

impl RoutingModel {
    pub fn new(
        model: &ProblemModel,
        nodes: &[Node],
        vehicles: Vec<Vehicle>,
        invalid: Matrix<i64>,
    ) -> Result<Self, ModelError> {
        let hub_node = |place| {
            nodes
                .iter()
                .find(|n| n.role == NodeRole::Hub && n.place == place)
                .expect("validated workers start and end at hub nodes")
                .id
        };

        let mut starts = Vec::with_capacity(vehicles.len());
        let mut ends = Vec::with_capacity(vehicles.len());
        let mut spans = Vec::with_capacity(vehicles.len());
        for vehicle in &vehicles {
            let worker = model.worker(vehicle.driver);
            starts.push(hub_node(worker.start_hub));
            ends.push(hub_node(worker.end_hub));

            let lo = worker
                .earliest_start
                .map(|t| model.seconds_since_t_zero(t).max(0))
                .unwrap_or(0);
            let hi = match worker.latest_end {
                Some(t) => {
                    let seconds = model.seconds_since_t_zero(t);
                    if seconds < 0 {
                        return Err(ModelError::InvalidWindow(worker.id.clone()));
                    }
                    seconds
                }
                None => i64::MAX,
            };
            spans.push(((lo, hi), (lo, hi)));
        }

        let mut windows = Vec::new();
        let mut allowed = Vec::new();
        let mut disjunctions = Vec::new();

        for node in nodes {
            match node.role {
                NodeRole::Hub => {
                    // Hubs that no vehicle starts or ends at must still be
                    // droppable, at no cost, or they would be forced into
                    // a route.
                    if !starts.contains(&node.id) && !ends.contains(&node.id) {
                        disjunctions.push((node.id, 0));
                    }
                }
                NodeRole::JobHead => {
                    let place = model.place(node.place);
                    let (open, close) = node.window.expect("job heads carry the arrival window");
                    if close < 0 {
                        return Err(ModelError::InvalidWindow(place.id.clone()));
                    }
                    windows.push((node.id, (open.max(0), close)));

                    let eligible = eligible_vehicles(model, node);
                    let must_visit = model
                        .guarantees
                        .iter()
                        .any(|g| g.place == node.place && g.must_visit);
                    if eligible.is_empty() && !node.skippable {
                        return Err(ModelError::NoViableWorker(place.id.clone()));
                    }
                    allowed.push((node.id, eligible));

                    if node.skippable && !must_visit {
                        disjunctions.push((node.id, drop_penalty(node)));
                    }
                }
                NodeRole::OptionalTask => {
                    disjunctions.push((node.id, drop_penalty(node)));
                }
            }
        }

        Ok(Self {
            vehicles: Arc::new(vehicles),
            invalid: Arc::new(invalid),
            starts,
            ends,
            windows,
            spans,
            allowed,
            disjunctions,
            max_idle_seconds: model.options.max_idle_seconds(),
        })
    }

    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Vehicles allowed at a node, or `None` when unrestricted.
    pub fn allowed_vehicles(&self, node: usize) -> Option<&[usize]> {
        self.allowed
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, v)| v.as_slice())
    }

    /// Search controls: automatic strategies under the configured limit.
    pub fn search_parameters(timeout: Duration) -> SearchParameters {
        SearchParameters {
            first_solution: FirstSolutionStrategy::Automatic,
            metaheuristic: LocalSearchMetaheuristic::Automatic,
            time_limit: timeout,
        }
    }

    /// Programs a solver with the derived model: arc costs, the time
    /// dimension with windows and vehicle spans, eligibility,
    /// disjunctions, and the precedence dimension.
    pub fn install<S: RoutingSolver>(&self, solver: &mut S) {
        for index in 0..self.vehicles.len() {
            let vehicles = Arc::clone(&self.vehicles);
            solver.set_arc_cost(index, Box::new(move |a, b| vehicles[index].cost[(a, b)]));
        }

        let time_transits: Vec<super::solver::TransitCallback> = (0..self.vehicles.len())
            .map(|index| {
                let vehicles = Arc::clone(&self.vehicles);
                Box::new(move |a: usize, b: usize| vehicles[index].time[(a, b)]) as _
            })
            .collect();
        solver.add_dimension(DimensionSpec {
            name: TIME_DIMENSION.into(),
            transits: time_transits,
            slack_max: self.max_idle_seconds,
            capacity: i64::MAX,
            fix_start: false,
        });
        for &(node, (open, close)) in &self.windows {
            solver.set_cumul_range(TIME_DIMENSION, node, open, close);
        }
        for (vehicle, &(start, end)) in self.spans.iter().enumerate() {
            solver.set_vehicle_cumul_ranges(TIME_DIMENSION, vehicle, start, end);
        }

        for (node, vehicles) in &self.allowed {
            solver.set_allowed_vehicles(*node, vehicles);
        }

        for &(node, penalty) in &self.disjunctions {
            solver.add_disjunction(&[node], penalty);
        }

        let precedence_transits: Vec<super::solver::TransitCallback> = (0..self.vehicles.len())
            .map(|_| {
                let invalid = Arc::clone(&self.invalid);
                Box::new(move |a: usize, b: usize| invalid[(a, b)]) as _
            })
            .collect();
        solver.add_dimension(DimensionSpec {
            name: PRECEDENCE_DIMENSION.into(),
            transits: precedence_transits,
            slack_max: 0,
            capacity: 0,
            fix_start: true,
        });
    }
}

/// Penalty for dropping a node: proportional to the work lost.
fn drop_penalty(node: &Node) -> i64 {
    COST_SCALE * (node.tasks.len() as i64 + 1)
}

/// Vehicles whose driver can attempt every required task at the node,
/// narrowed by guarantees.
fn eligible_vehicles(model: &ProblemModel, node: &Node) -> Vec<usize> {
    let mut eligible: Vec<usize> = (0..model.workers.len())
        .filter(|&index| {
            let worker = model.worker(WorkerId(index as u32));
            node.tasks.iter().all(|task| {
                let default_chance = model.tool(task.tool).completion_chance;
                worker.can_use(task.tool, default_chance)
            })
        })
        .collect();

    for guarantee in model.guarantees.iter().filter(|g| g.place == node.place) {
        let worker = guarantee.worker.0 as usize;
        if guarantee.must_visit {
            eligible.retain(|&v| v == worker);
        } else {
            eligible.retain(|&v| v != worker);
        }
    }
    eligible
}
