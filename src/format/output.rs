//! Result document, exactly as it leaves on the wire.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MetricKind, ProblemModel};
use crate::solution::{Itinerary, Visit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitOutput {
    pub place_id: String,
    pub worker_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<DateTime<Utc>>,
    pub earned_rewards: BTreeMap<String, f64>,
    pub completed_tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryOutput {
    pub visits: Vec<VisitOutput>,
    pub skipped_jobs: Vec<String>,
    /// Keyed by metric id for custom metrics and by the builtin type name
    /// otherwise.
    pub total_metrics: BTreeMap<String, f64>,
    pub total_cost: i64,
}

impl ItineraryOutput {
    pub fn new(model: &ProblemModel, itinerary: &Itinerary) -> Self {
        let visits = itinerary
            .visits
            .iter()
            .map(|visit| visit_output(model, visit))
            .collect();

        let skipped_jobs = itinerary
            .skipped_jobs
            .iter()
            .map(|&place| model.place(place).id.clone())
            .collect();

        let total_metrics = model
            .metrics
            .iter()
            .zip(&itinerary.totals)
            .map(|(metric, &total)| {
                let key = match metric.kind {
                    MetricKind::Custom => metric.id.clone(),
                    builtin => builtin.type_name().to_string(),
                };
                (key, total)
            })
            .collect();

        ItineraryOutput {
            visits,
            skipped_jobs,
            total_metrics,
            total_cost: itinerary.total_cost,
        }
    }

    /// Renders the document, optionally pretty-printed.
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

fn visit_output(model: &ProblemModel, visit: &Visit) -> VisitOutput {
    VisitOutput {
        place_id: model.place(visit.place).id.clone(),
        worker_id: model.worker(visit.worker).id.clone(),
        arrival_time: visit.arrival,
        departure_time: visit.departure,
        earned_rewards: visit
            .earned
            .iter()
            .map(|&(metric, amount)| (model.metric(metric).id.clone(), amount))
            .collect(),
        completed_tasks: visit
            .completed
            .iter()
            .map(|completion| completion.task_id.clone())
            .collect(),
    }
}
