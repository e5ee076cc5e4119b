//! Work outcome simulation.
//!
//! For a (worker, node) pair the simulator walks the node's tasks in order
//! and decides, per task, whether the worker completes it: capability
//! lookup, effective work time and completion chance, then a uniform draw
//! from the injected RNG. The simulator is pure with respect to its inputs
//! plus the RNG state, so a fixed seed reproduces outcomes exactly.

use rand::Rng;

use crate::graph::{Node, NodeRole};
use crate::model::{MetricId, PlaceId, ProblemModel, WorkerId};
use crate::Id;

/// Name of the synthetic pseudo-task that carries flat visit rewards.
///
/// It always completes, takes one second and sorts before real tasks.
pub const ARRIVAL_TASK: &str = "arrival";

/// One completed task at one place.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub worker: WorkerId,
    pub place: PlaceId,
    pub task_id: Id,
    /// 1-based task order within the job; 0 for the arrival pseudo-task.
    pub task_order: u32,
    pub work_seconds: i64,
    pub earned: Vec<(MetricId, f64)>,
}

/// Simulates the worker performing the node's tasks.
///
/// Tasks whose tool the worker has no capability for are unattempted; their
/// rewards are logged as missed. A completed task earns, per reward,
/// `amount × capability reward factor × worker factor modifiers`. Visit
/// amounts bound to the node's place are granted through the arrival
/// pseudo-task, on job head nodes only so a job's optional-task nodes do
/// not grant them again.
pub fn simulate_node(
    model: &ProblemModel,
    worker_id: WorkerId,
    node: &Node,
    rng: &mut impl Rng,
) -> Vec<Completion> {
    let worker = model.worker(worker_id);
    let seconds_per_unit = model.options.time_unit.seconds_per_unit();
    let mut completions = Vec::new();

    if node.role == NodeRole::JobHead {
        let amounts: Vec<(MetricId, f64)> = worker.visit_amounts(node.place).collect();
        if !amounts.is_empty() {
            completions.push(Completion {
                worker: worker_id,
                place: node.place,
                task_id: ARRIVAL_TASK.to_string(),
                task_order: 0,
                work_seconds: 1,
                earned: amounts,
            });
        }
    }

    for task in &node.tasks {
        let tool = model.tool(task.tool);
        let Some(capability) = worker.capability(task.tool) else {
            tracing::debug!(
                worker = %worker.id,
                task = %task.id,
                tool = %tool.id,
                missed_rewards = task.rewards.len(),
                "no capability for tool; task unattempted"
            );
            continue;
        };

        let work_units = capability.work_time.unwrap_or(tool.work_time) * capability.work_time_factor;
        let work_seconds = (work_units * seconds_per_unit).round() as i64;
        let chance = capability
            .completion_chance
            .unwrap_or(tool.completion_chance);

        let draw: f64 = rng.gen();
        if draw >= chance || work_seconds <= 0 {
            tracing::debug!(
                worker = %worker.id,
                task = %task.id,
                chance,
                "task attempt failed"
            );
            continue;
        }

        let earned = task
            .rewards
            .iter()
            .map(|reward| {
                let factor = capability.reward_factor(reward.metric)
                    * worker.factor_modifier(reward.metric, task.tool, node.place);
                (reward.metric, reward.amount * factor)
            })
            .collect();

        completions.push(Completion {
            worker: worker_id,
            place: node.place,
            task_id: task.id.clone(),
            task_order: task.order,
            work_seconds,
            earned,
        });
    }

    completions
}
