//! Per-worker matrices and their fusion into one cost matrix.
//!
//! Every worker becomes a solver-side vehicle owning a transit-time
//! matrix, one value matrix per metric, the per-arc simulated work
//! outcomes, and a fused cost matrix. Population is independent per
//! vehicle and runs in parallel; fusion needs the per-metric maxima
//! across the whole fleet, so it runs as a second parallel pass after a
//! global reduction.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::geometry::Geometry;
use crate::graph::Node;
use crate::matrix::Matrix;
use crate::model::{MetricKind, MetricMode, ProblemModel, ToolId, WorkerId};
use crate::simulate::{simulate_node, Completion};

/// Fixed-point scale applied to fused costs before they reach the solver.
pub const COST_SCALE: i64 = 1_000_000;

/// The solver-side twin of a worker.
#[derive(Debug, Clone)]
pub struct Vehicle {
    /// Vehicle index; equals the driver's position in the worker list.
    pub id: usize,
    pub driver: WorkerId,
    /// Integer seconds for the driver to use each tool; 0 if incapable.
    pub tool_times: HashMap<ToolId, i64>,
    /// Transit seconds a→b: work performed at a plus travel to b.
    pub time: Matrix<i64>,
    /// Raw per-metric values per arc, indexed by `MetricId`.
    pub metrics: Vec<Matrix<f64>>,
    /// Simulated work at the origin of each arc.
    pub work: Matrix<Vec<Completion>>,
    /// Normalized, weighted, fixed-point cost per arc.
    pub cost: Matrix<i64>,
}

/// Builds one vehicle per worker and fuses their cost matrices.
///
/// `seed` fixes every stochastic outcome; each vehicle derives its own RNG
/// from it, so fleet-level parallelism cannot perturb determinism. Without
/// a seed a random one is drawn once per build.
pub fn build_vehicles(
    model: &ProblemModel,
    nodes: &[Node],
    geometry: &Geometry,
    seed: Option<u64>,
) -> Vec<Vehicle> {
    let base_seed = seed.unwrap_or_else(|| rand::thread_rng().gen());

    let mut vehicles: Vec<Vehicle> = (0..model.workers.len())
        .into_par_iter()
        .map(|index| populate_vehicle(model, nodes, geometry, index, base_seed))
        .collect();

    let m_max = metric_maxima(model, &vehicles);
    vehicles
        .par_iter_mut()
        .for_each(|vehicle| fuse_cost(model, vehicle, &m_max));

    vehicles
}

/// Largest entry per metric across every vehicle's value matrix.
fn metric_maxima(model: &ProblemModel, vehicles: &[Vehicle]) -> Vec<f64> {
    (0..model.metrics.len())
        .map(|m| {
            vehicles
                .iter()
                .filter_map(|v| v.metrics[m].max_value())
                .fold(0.0_f64, f64::max)
        })
        .collect()
}

fn populate_vehicle(
    model: &ProblemModel,
    nodes: &[Node],
    geometry: &Geometry,
    index: usize,
    base_seed: u64,
) -> Vehicle {
    let driver = WorkerId(index as u32);
    let worker = model.worker(driver);
    let seconds_per_unit = model.options.time_unit.seconds_per_unit();
    let n = nodes.len();

    let tool_times = model
        .tools
        .iter()
        .enumerate()
        .map(|(t, tool)| {
            let tool_id = ToolId(t as u32);
            let seconds = worker
                .capability(tool_id)
                .map(|cap| {
                    let units = cap.work_time.unwrap_or(tool.work_time) * cap.work_time_factor;
                    (units * seconds_per_unit).round() as i64
                })
                .unwrap_or(0);
            (tool_id, seconds)
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(index as u64));
    let mut time: Matrix<i64> = Matrix::new(n);
    let mut metrics: Vec<Matrix<f64>> = vec![Matrix::new(n); model.metrics.len()];
    let mut work: Matrix<Vec<Completion>> = Matrix::new(n);

    for a in nodes {
        for b in nodes {
            let completions = simulate_node(model, driver, a, &mut rng);
            let work_seconds: i64 = completions.iter().map(|c| c.work_seconds).sum();
            let travel_seconds =
                (geometry.travel_time.get(a.id, b.id) / worker.travel_speed_factor).round();

            for (m, metric) in model.metrics.iter().enumerate() {
                let value = match metric.kind {
                    MetricKind::Distance => *geometry.distance.get(a.id, b.id),
                    MetricKind::WorkTime => work_seconds as f64,
                    MetricKind::TravelTime => travel_seconds,
                    MetricKind::Custom => {
                        let metric_id = crate::model::MetricId(m as u32);
                        completions
                            .iter()
                            .flat_map(|c| c.earned.iter())
                            .filter(|(id, _)| *id == metric_id)
                            .map(|(_, amount)| amount)
                            .sum()
                    }
                };
                metrics[m].set(a.id, b.id, value);

                // Time-typed metrics feed the transit-time matrix too; the
                // validator guarantees at most one metric of each kind.
                match metric.kind {
                    MetricKind::WorkTime => time[(a.id, b.id)] += work_seconds,
                    MetricKind::TravelTime => time[(a.id, b.id)] += travel_seconds as i64,
                    _ => {}
                }
            }

            work.set(a.id, b.id, completions);
        }
    }

    Vehicle {
        id: index,
        driver,
        tool_times,
        time,
        metrics,
        work,
        cost: Matrix::new(n),
    }
}

/// Normalizes, orients and weights each metric, then rounds the blend to
/// fixed point.
fn fuse_cost(model: &ProblemModel, vehicle: &mut Vehicle, m_max: &[f64]) {
    let total_weight: f64 = model.metrics.iter().map(|m| m.weight).sum();
    let n = vehicle.cost.size();

    for a in 0..n {
        for b in 0..n {
            let mut cost = 0.0;
            if total_weight > 0.0 {
                for (m, metric) in model.metrics.iter().enumerate() {
                    if m_max[m] <= 0.0 {
                        continue;
                    }
                    let mut norm = vehicle.metrics[m].get(a, b) / m_max[m];
                    if metric.mode == MetricMode::Maximize {
                        norm = (norm - 1.0).abs();
                    }
                    cost += norm * (metric.weight / total_weight);
                }
            }
            vehicle
                .cost
                .set(a, b, (cost * COST_SCALE as f64).round() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::build_geometry;
    use crate::graph::expand_nodes;
    use crate::model::{validate, MetricId, ProblemModel};
    use crate::test_utils::{base_problem, metric_input};

    fn built(model: &ProblemModel) -> Vec<Vehicle> {
        let nodes = expand_nodes(model);
        let geometry = build_geometry(model, &nodes).unwrap();
        build_vehicles(model, &nodes, &geometry, Some(7))
    }

    fn first(model: &ProblemModel) -> Vehicle {
        built(model).remove(0)
    }

    // Node 0 is the depot hub, node 1 the fix-pump job head.

    // ── Time matrix ───────────────────────────────────────────────────

    #[test]
    fn transit_time_is_origin_work_plus_travel() {
        let model = validate(&base_problem()).unwrap();
        let vehicle = first(&model);
        // depot → job: no work at the hub, 1 second of travel.
        assert_eq!(*vehicle.time.get(0, 1), 1);
        // job → depot: 60 seconds of work, then 1 second of travel.
        assert_eq!(*vehicle.time.get(1, 0), 61);
    }

    #[test]
    fn travel_speed_factor_divides_travel_time() {
        let mut input = base_problem();
        input.workers.as_mut().unwrap()[0].travel_speed_factor = Some(2.0);
        input.jobs.as_mut().unwrap()[0].location =
            Some(crate::format::input::LocationInput { x: 2.0, y: 0.0 });
        let model = validate(&input).unwrap();
        let vehicle = first(&model);
        // 2 seconds of travel halved by the speed factor.
        assert_eq!(*vehicle.time.get(0, 1), 1);
    }

    // ── Tool times ────────────────────────────────────────────────────

    #[test]
    fn tool_times_are_zero_for_incapable_drivers() {
        let mut input = base_problem();
        input.workers.as_mut().unwrap()[0].capabilities = None;
        let model = validate(&input).unwrap();
        let vehicle = first(&model);
        assert_eq!(vehicle.tool_times[&ToolId(0)], 0);
    }

    #[test]
    fn tool_times_apply_capability_overrides() {
        let mut input = base_problem();
        input.workers.as_mut().unwrap()[0]
            .capabilities
            .as_mut()
            .unwrap()[0]
            .work_time_factor = Some(1.5);
        let model = validate(&input).unwrap();
        let vehicle = first(&model);
        assert_eq!(vehicle.tool_times[&ToolId(0)], 90);
    }

    // ── Work matrix ───────────────────────────────────────────────────

    #[test]
    fn work_matrix_holds_origin_completions() {
        let model = validate(&base_problem()).unwrap();
        let vehicle = first(&model);
        assert!(vehicle.work.get(0, 1).is_empty());
        let at_job = vehicle.work.get(1, 0);
        assert_eq!(at_job.len(), 1);
        assert_eq!(at_job[0].task_id, "tighten");
    }

    // ── Cost fusion ───────────────────────────────────────────────────

    #[test]
    fn fused_cost_blends_normalized_weighted_metrics() {
        let model = validate(&base_problem()).unwrap();
        let vehicle = first(&model);
        // travel norm 1 × weight ½ plus reward norm 0 flipped to 1 × ½.
        assert_eq!(*vehicle.cost.get(0, 1), COST_SCALE);
        // travel norm 1 × ½ plus reward norm 1 flipped to 0.
        assert_eq!(*vehicle.cost.get(1, 0), COST_SCALE / 2);
    }

    #[test]
    fn cost_entries_are_non_negative() {
        let model = validate(&base_problem()).unwrap();
        for vehicle in built(&model) {
            assert!(vehicle.cost.values().all(|&c| c >= 0));
        }
    }

    #[test]
    fn normalized_entries_never_exceed_one() {
        let model = validate(&base_problem()).unwrap();
        let vehicles = built(&model);
        let m_max = metric_maxima(&model, &vehicles);
        for vehicle in &vehicles {
            for (m, matrix) in vehicle.metrics.iter().enumerate() {
                if m_max[m] <= 0.0 {
                    continue;
                }
                assert!(matrix.values().all(|v| v / m_max[m] <= 1.0 + 1e-12));
            }
        }
    }

    #[test]
    fn zero_weight_metric_does_not_change_cost() {
        let with_zero = {
            let mut input = base_problem();
            input
                .metrics
                .as_mut()
                .unwrap()
                .push(metric_input("noise", "custom", "minimize", 0.0));
            validate(&input).unwrap()
        };
        let without = validate(&base_problem()).unwrap();
        let a = first(&with_zero);
        let b = first(&without);
        for from in 0..a.cost.size() {
            for to in 0..a.cost.size() {
                let delta = (a.cost.get(from, to) - b.cost.get(from, to)).abs();
                assert!(delta <= 1, "rounding drift at ({from},{to}): {delta}");
            }
        }
    }

    #[test]
    fn doubling_a_reward_cannot_increase_any_cost() {
        let base = validate(&base_problem()).unwrap();
        let doubled = {
            let mut input = base_problem();
            input.jobs.as_mut().unwrap()[0].tasks.as_mut().unwrap()[0].rewards =
                Some(vec![crate::format::input::RewardInput {
                    metric: Some("payout".into()),
                    amount: Some(200.0),
                }]);
            validate(&input).unwrap()
        };
        let a = first(&base);
        let b = first(&doubled);
        for from in 0..a.cost.size() {
            for to in 0..a.cost.size() {
                assert!(b.cost.get(from, to) <= a.cost.get(from, to));
            }
        }
    }

    #[test]
    fn custom_metric_accumulates_earned_rewards() {
        let model = validate(&base_problem()).unwrap();
        let vehicle = first(&model);
        let payout = MetricId(1);
        assert!((vehicle.metrics[payout.0 as usize].get(1, 0) - 100.0).abs() < 1e-9);
        assert_eq!(*vehicle.metrics[payout.0 as usize].get(0, 1), 0.0);
    }

    // ── Determinism ───────────────────────────────────────────────────

    #[test]
    fn same_seed_builds_identical_vehicles() {
        let model = validate(&base_problem()).unwrap();
        let nodes = expand_nodes(&model);
        let geometry = build_geometry(&model, &nodes).unwrap();
        let a = build_vehicles(&model, &nodes, &geometry, Some(11));
        let b = build_vehicles(&model, &nodes, &geometry, Some(11));
        for (va, vb) in a.iter().zip(&b) {
            assert_eq!(va.cost, vb.cost);
            assert_eq!(va.time, vb.time);
            assert_eq!(va.work, vb.work);
        }
    }
}
