//! Loose input document, exactly as it appears on the wire.
//!
//! Every reference is a string id and nearly every field is optional; the
//! validator is the single place that rejects bad documents, so decoding
//! here never fails on semantic grounds. Enumerated options (units, metric
//! types, engine) stay as strings and are parsed case-insensitively during
//! validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{
    Capability, Guarantee, Metric, ModifierValue, Place, ProblemModel, RewardModifier, TaskSpec,
    Tool, Worker,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_zero: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_travel_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<MetricInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubs: Option<Vec<HubInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<JobInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<Vec<WorkerInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantees: Option<Vec<GuaranteeInput>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_chance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationInput>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArrivalWindowInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_window: Option<ArrivalWindowInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskInput>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewards: Option<Vec<RewardInput>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RewardInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_hub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_hub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_speed_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<CapabilityInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_modifiers: Option<Vec<RewardModifierInput>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapabilityInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_time_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_chance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_factors: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RewardModifierInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuaranteeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_visit: Option<bool>,
}

// A validated model serializes back to the loose form, so a model can be
// re-emitted, re-read and re-validated to an equal model.

impl From<&ProblemModel> for ProblemInput {
    fn from(model: &ProblemModel) -> Self {
        let tools = model.tools.iter().map(ToolInput::from).collect::<Vec<_>>();
        let metrics = model.metrics.iter().map(metric_to_input).collect::<Vec<_>>();
        let hubs = model
            .hubs()
            .map(|(_, place)| HubInput {
                id: Some(place.id.clone()),
                location: place.location.map(|(x, y)| LocationInput { x, y }),
            })
            .collect::<Vec<_>>();
        let jobs = model
            .jobs()
            .map(|(_, place, detail)| job_to_input(model, place, detail))
            .collect::<Vec<_>>();
        let workers = model
            .workers
            .iter()
            .map(|w| worker_to_input(model, w))
            .collect::<Vec<_>>();
        let guarantees = model
            .guarantees
            .iter()
            .map(|g| guarantee_to_input(model, g))
            .collect::<Vec<_>>();

        ProblemInput {
            t_zero: model.options.t_zero,
            timeout_seconds: Some(model.options.timeout_seconds as i64),
            default_travel_speed: Some(model.options.default_travel_speed),
            distance_unit: Some(model.options.distance_unit.to_string()),
            time_unit: Some(model.options.time_unit.to_string()),
            max_idle_time: Some(model.options.max_idle_time),
            engine: Some(
                match model.options.engine {
                    crate::model::GeometryMode::Simple => "Simple",
                    crate::model::GeometryMode::Osrm => "Osrm",
                }
                .to_string(),
            ),
            tools: (!tools.is_empty()).then_some(tools),
            metrics: (!metrics.is_empty()).then_some(metrics),
            hubs: (!hubs.is_empty()).then_some(hubs),
            jobs: (!jobs.is_empty()).then_some(jobs),
            workers: (!workers.is_empty()).then_some(workers),
            guarantees: (!guarantees.is_empty()).then_some(guarantees),
        }
    }
}

impl From<&Tool> for ToolInput {
    fn from(tool: &Tool) -> Self {
        ToolInput {
            id: Some(tool.id.clone()),
            work_time: Some(tool.work_time),
            completion_chance: Some(tool.completion_chance),
        }
    }
}

fn metric_to_input(metric: &Metric) -> MetricInput {
    MetricInput {
        id: Some(metric.id.clone()),
        kind: Some(metric.kind.type_name().to_string()),
        mode: Some(
            match metric.mode {
                crate::model::MetricMode::Minimize => "Minimize",
                crate::model::MetricMode::Maximize => "Maximize",
            }
            .to_string(),
        ),
        weight: Some(metric.weight),
    }
}

fn task_to_input(model: &ProblemModel, task: &TaskSpec) -> TaskInput {
    TaskInput {
        id: Some(task.id.clone()),
        tool: Some(model.tool(task.tool).id.clone()),
        optional: Some(task.optional),
        rewards: (!task.rewards.is_empty()).then(|| {
            task.rewards
                .iter()
                .map(|r| RewardInput {
                    metric: Some(model.metric(r.metric).id.clone()),
                    amount: Some(r.amount),
                })
                .collect()
        }),
    }
}

fn job_to_input(
    model: &ProblemModel,
    place: &Place,
    detail: &crate::model::JobDetail,
) -> JobInput {
    JobInput {
        id: Some(place.id.clone()),
        location: place.location.map(|(x, y)| LocationInput { x, y }),
        arrival_window: Some(ArrivalWindowInput {
            open: Some(detail.open),
            close: Some(detail.close),
        }),
        optional: Some(detail.optional),
        tasks: Some(
            detail
                .tasks
                .iter()
                .map(|t| task_to_input(model, t))
                .collect(),
        ),
    }
}

fn capability_to_input(model: &ProblemModel, cap: &Capability) -> CapabilityInput {
    CapabilityInput {
        tool: Some(model.tool(cap.tool).id.clone()),
        work_time: cap.work_time,
        work_time_factor: Some(cap.work_time_factor),
        completion_chance: cap.completion_chance,
        reward_factors: (!cap.reward_factors.is_empty()).then(|| {
            cap.reward_factors
                .iter()
                .map(|(metric, factor)| (model.metric(*metric).id.clone(), *factor))
                .collect()
        }),
    }
}

fn modifier_to_input(model: &ProblemModel, modifier: &RewardModifier) -> RewardModifierInput {
    let (factor, amount) = match modifier.value {
        ModifierValue::Factor(f) => (Some(f), None),
        ModifierValue::Amount(a) => (None, Some(a)),
    };
    RewardModifierInput {
        metric: Some(model.metric(modifier.metric).id.clone()),
        tool: modifier.tool.map(|t| model.tool(t).id.clone()),
        place: modifier.place.map(|p| model.place(p).id.clone()),
        factor,
        amount,
    }
}

fn worker_to_input(model: &ProblemModel, worker: &Worker) -> WorkerInput {
    let mut capabilities: Vec<_> = worker.capabilities.values().collect();
    capabilities.sort_by_key(|c| c.tool);
    WorkerInput {
        id: Some(worker.id.clone()),
        start_hub: Some(model.place(worker.start_hub).id.clone()),
        end_hub: Some(model.place(worker.end_hub).id.clone()),
        earliest_start_time: worker.earliest_start,
        latest_end_time: worker.latest_end,
        travel_speed_factor: Some(worker.travel_speed_factor),
        capabilities: (!capabilities.is_empty()).then(|| {
            capabilities
                .into_iter()
                .map(|c| capability_to_input(model, c))
                .collect()
        }),
        reward_modifiers: (!worker.modifiers.is_empty()).then(|| {
            worker
                .modifiers
                .iter()
                .map(|m| modifier_to_input(model, m))
                .collect()
        }),
    }
}

fn guarantee_to_input(model: &ProblemModel, guarantee: &Guarantee) -> GuaranteeInput {
    GuaranteeInput {
        worker: Some(model.worker(guarantee.worker).id.clone()),
        place: Some(model.place(guarantee.place).id.clone()),
        must_visit: Some(guarantee.must_visit),
    }
}
