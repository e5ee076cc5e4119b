//! Shared helpers for unit tests.

use chrono::{DateTime, Utc};

use crate::format::input::{
    ArrivalWindowInput, CapabilityInput, HubInput, JobInput, LocationInput, MetricInput,
    ProblemInput, RewardInput, TaskInput, ToolInput, WorkerInput,
};
use crate::model::{validate, ProblemModel};

/// Parses an ISO-8601 timestamp, panicking on malformed test data.
pub fn iso(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid ISO-8601 timestamp")
}

pub fn tool_input(id: &str, work_time: f64, chance: f64) -> ToolInput {
    ToolInput {
        id: Some(id.into()),
        work_time: Some(work_time),
        completion_chance: Some(chance),
    }
}

pub fn metric_input(id: &str, kind: &str, mode: &str, weight: f64) -> MetricInput {
    MetricInput {
        id: Some(id.into()),
        kind: Some(kind.into()),
        mode: Some(mode.into()),
        weight: Some(weight),
    }
}

pub fn hub_input(id: &str, x: f64, y: f64) -> HubInput {
    HubInput {
        id: Some(id.into()),
        location: Some(LocationInput { x, y }),
    }
}

pub fn task_input(id: &str, tool: &str, optional: bool, rewards: Vec<(&str, f64)>) -> TaskInput {
    TaskInput {
        id: Some(id.into()),
        tool: Some(tool.into()),
        optional: Some(optional),
        rewards: (!rewards.is_empty()).then(|| {
            rewards
                .into_iter()
                .map(|(metric, amount)| RewardInput {
                    metric: Some(metric.into()),
                    amount: Some(amount),
                })
                .collect()
        }),
    }
}

pub fn job_input(
    id: &str,
    x: f64,
    y: f64,
    open: &str,
    close: &str,
    optional: bool,
    tasks: Vec<TaskInput>,
) -> JobInput {
    JobInput {
        id: Some(id.into()),
        location: Some(LocationInput { x, y }),
        arrival_window: Some(ArrivalWindowInput {
            open: Some(iso(open)),
            close: Some(iso(close)),
        }),
        optional: Some(optional),
        tasks: Some(tasks),
    }
}

pub fn capability_input(tool: &str) -> CapabilityInput {
    CapabilityInput {
        tool: Some(tool.into()),
        ..Default::default()
    }
}

pub fn worker_input(id: &str, hub: &str, capabilities: Vec<CapabilityInput>) -> WorkerInput {
    WorkerInput {
        id: Some(id.into()),
        start_hub: Some(hub.into()),
        end_hub: Some(hub.into()),
        capabilities: (!capabilities.is_empty()).then_some(capabilities),
        ..Default::default()
    }
}

/// One hub, one job with a single rewarded task, one capable worker.
///
/// The job window is 2026-03-01 08:00–16:00 UTC; no worker time bounds, so
/// T₀ degrades to the minimum representable timestamp unless a test sets
/// an earliest start.
pub fn base_problem() -> ProblemInput {
    ProblemInput {
        default_travel_speed: Some(1.0),
        distance_unit: Some("metre".into()),
        time_unit: Some("second".into()),
        tools: Some(vec![tool_input("wrench", 60.0, 1.0)]),
        metrics: Some(vec![
            metric_input("travel", "travelTime", "minimize", 1.0),
            metric_input("payout", "custom", "maximize", 1.0),
        ]),
        hubs: Some(vec![hub_input("depot", 0.0, 0.0)]),
        jobs: Some(vec![job_input(
            "fix-pump",
            1.0,
            0.0,
            "2026-03-01T08:00:00Z",
            "2026-03-01T16:00:00Z",
            false,
            vec![task_input("tighten", "wrench", false, vec![("payout", 100.0)])],
        )]),
        workers: Some(vec![worker_input(
            "alice",
            "depot",
            vec![capability_input("wrench")],
        )]),
        ..Default::default()
    }
}

/// Validates [`base_problem`], panicking if the fixture drifts.
pub fn base_model() -> ProblemModel {
    validate(&base_problem()).expect("base problem is valid")
}
