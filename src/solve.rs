//! End-to-end pipeline: model → matrices → routing → itinerary.

use std::time::Duration;

use thiserror::Error;

use crate::geometry::{build_geometry, GeometryError};
use crate::graph::{expand_nodes, invalid_transit_matrix};
use crate::model::{ProblemModel, ValidationError};
use crate::routing::{GreedySolver, ModelError, RoutingModel, RoutingSolver};
use crate::solution::{extract, Itinerary};
use crate::vehicle::build_vehicles;

/// Anything that can abort a solve before search starts.
///
/// Timeouts and infeasibility are deliberately absent: they produce an
/// empty itinerary, not an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Per-solve knobs that do not come from the input document.
#[derive(Debug, Clone, Default)]
pub struct SolveConfig {
    /// Fixes every stochastic work outcome. `None` draws a fresh seed,
    /// which is the production mode.
    pub seed: Option<u64>,
    /// Overrides the document's `timeoutSeconds` when set.
    pub timeout: Option<Duration>,
}

impl SolveConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }
}

/// Solves the problem with the in-tree reference back-end.
pub fn solve(model: &ProblemModel, config: &SolveConfig) -> Result<Itinerary, SolveError> {
    solve_with(model, config, GreedySolver::new)
}

/// Solves the problem with a caller-supplied routing back-end.
///
/// `make_solver` receives the node count and the per-vehicle start/end
/// node ids; the returned solver is programmed by the routing model and
/// then run once under the configured time limit.
pub fn solve_with<S, F>(
    model: &ProblemModel,
    config: &SolveConfig,
    make_solver: F,
) -> Result<Itinerary, SolveError>
where
    S: RoutingSolver,
    F: FnOnce(usize, Vec<usize>, Vec<usize>) -> S,
{
    let run = crate::generate_id();
    let span = tracing::info_span!("solve", run = %run);
    let _guard = span.enter();

    let nodes = expand_nodes(model);
    tracing::debug!(nodes = nodes.len(), workers = model.workers.len(), "expanded node graph");

    let geometry = build_geometry(model, &nodes)?;
    let vehicles = build_vehicles(model, &nodes, &geometry, config.seed);
    let invalid = invalid_transit_matrix(&nodes);
    let routing = RoutingModel::new(model, &nodes, vehicles, invalid)?;

    let mut solver = make_solver(
        nodes.len(),
        routing.starts().to_vec(),
        routing.ends().to_vec(),
    );
    routing.install(&mut solver);

    let timeout = config
        .timeout
        .unwrap_or_else(|| Duration::from_secs(model.options.timeout_seconds as u64));
    let assignment = solver.solve(&RoutingModel::search_parameters(timeout));
    if assignment.is_none() {
        tracing::warn!("no assignment within the time limit; every job is skipped");
    }

    Ok(extract(model, &nodes, routing.vehicles(), assignment.as_ref()))
}
