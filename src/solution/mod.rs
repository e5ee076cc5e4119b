//! Assignment walking and itinerary assembly.
//!
//! The extractor turns a solver assignment back into the user's world:
//! timestamped visits per worker, completed tasks with their earnings,
//! per-metric totals in input units, and the jobs nobody took. A missing
//! assignment (timeout, infeasibility) extracts to an empty itinerary
//! with every job skipped.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::graph::Node;
use crate::matrix::Matrix;
use crate::model::{MetricId, MetricKind, PlaceId, ProblemModel, WorkerId};
use crate::routing::{Assignment, TIME_DIMENSION};
use crate::simulate::Completion;
use crate::vehicle::Vehicle;

/// One stay of one worker at one place.
///
/// The start-hub visit has only a departure, the end-hub visit only an
/// arrival; every other visit has both, with
/// `departure = arrival + work_seconds`.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub place: PlaceId,
    pub worker: WorkerId,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
    pub work_seconds: i64,
    /// Aggregated earnings at this visit, ordered by metric handle.
    pub earned: Vec<(MetricId, f64)>,
    /// Completed tasks ordered by task order.
    pub completed: Vec<Completion>,
}

/// The full result of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    /// Visits grouped by vehicle, in route order.
    pub visits: Vec<Visit>,
    /// Jobs no worker took, in input order.
    pub skipped_jobs: Vec<PlaceId>,
    /// Per-metric totals indexed by `MetricId`, converted back to input
    /// units for distance- and time-typed metrics.
    pub totals: Vec<f64>,
    /// The assignment's objective value.
    pub total_cost: i64,
}

/// Builds the itinerary from a solver assignment.
pub fn extract(
    model: &ProblemModel,
    nodes: &[Node],
    vehicles: &[Vehicle],
    assignment: Option<&Assignment>,
) -> Itinerary {
    let mut skipped: BTreeSet<PlaceId> = model.jobs().map(|(place, _, _)| place).collect();
    let mut totals = vec![0.0; model.metrics.len()];
    let mut visits = Vec::new();

    let Some(assignment) = assignment else {
        return Itinerary {
            visits,
            skipped_jobs: skipped.into_iter().collect(),
            totals,
            total_cost: 0,
        };
    };

    for (index, route) in assignment.routes.iter().enumerate() {
        let vehicle = &vehicles[index];
        let times = &route.cumuls[TIME_DIMENSION];
        extract_route(
            model,
            nodes,
            vehicle,
            &route.nodes,
            times,
            &mut visits,
            &mut skipped,
            &mut totals,
        );
    }

    convert_totals(model, &mut totals);

    Itinerary {
        visits,
        skipped_jobs: skipped.into_iter().collect(),
        totals,
        total_cost: assignment.objective,
    }
}

#[allow(clippy::too_many_arguments)]
fn extract_route(
    model: &ProblemModel,
    nodes: &[Node],
    vehicle: &Vehicle,
    route: &[usize],
    times: &[i64],
    visits: &mut Vec<Visit>,
    skipped: &mut BTreeSet<PlaceId>,
    totals: &mut [f64],
) {
    let worker = vehicle.driver;
    let at = |seconds: i64| model.t_zero + Duration::seconds(seconds);

    // Leaving the start hub: departure only.
    visits.push(Visit {
        place: nodes[route[0]].place,
        worker,
        arrival: None,
        departure: Some(at(times[0])),
        work_seconds: 0,
        earned: Vec::new(),
        completed: Vec::new(),
    });

    let mut current: Option<Visit> = None;
    for i in 1..route.len() {
        let (a, b) = (route[i - 1], route[i]);

        accumulate_metrics(&vehicle.metrics, a, b, totals);

        // Work simulated at the origin of this arc belongs to the open
        // visit; the start hub has no tasks, so nothing is lost there.
        if let Some(visit) = current.as_mut() {
            for completion in vehicle.work.get(a, b) {
                visit.work_seconds += completion.work_seconds;
                visit.completed.push(completion.clone());
            }
        }

        let last = i == route.len() - 1;
        let entering_new_place = current
            .as_ref()
            .map(|v| v.place != nodes[b].place)
            .unwrap_or(true);

        if last || entering_new_place {
            if let Some(visit) = current.take() {
                visits.push(finish_visit(visit));
            }
        }

        if last {
            // Arriving at the end hub: arrival only.
            visits.push(Visit {
                place: nodes[b].place,
                worker,
                arrival: Some(at(times[i])),
                departure: None,
                work_seconds: 0,
                earned: Vec::new(),
                completed: Vec::new(),
            });
        } else if entering_new_place {
            skipped.remove(&nodes[b].place);
            current = Some(Visit {
                place: nodes[b].place,
                worker,
                arrival: Some(at(times[i])),
                departure: None,
                work_seconds: 0,
                earned: Vec::new(),
                completed: Vec::new(),
            });
        }
    }
}

/// Orders completions, aggregates earnings and stamps the departure.
fn finish_visit(mut visit: Visit) -> Visit {
    visit.completed.sort_by_key(|c| c.task_order);

    let mut earned: Vec<(MetricId, f64)> = Vec::new();
    for completion in &visit.completed {
        for &(metric, amount) in &completion.earned {
            match earned.iter_mut().find(|(m, _)| *m == metric) {
                Some((_, total)) => *total += amount,
                None => earned.push((metric, amount)),
            }
        }
    }
    earned.sort_by_key(|&(metric, _)| metric);
    visit.earned = earned;

    visit.departure = visit
        .arrival
        .map(|arrival| arrival + Duration::seconds(visit.work_seconds));
    visit
}

fn accumulate_metrics(metrics: &[Matrix<f64>], a: usize, b: usize, totals: &mut [f64]) {
    for (m, matrix) in metrics.iter().enumerate() {
        totals[m] += matrix.get(a, b);
    }
}

/// Distance and time totals leave in the units the document used.
fn convert_totals(model: &ProblemModel, totals: &mut [f64]) {
    for (m, metric) in model.metrics.iter().enumerate() {
        totals[m] = match metric.kind {
            MetricKind::Distance => model.options.distance_unit.from_meters(totals[m]),
            MetricKind::TravelTime | MetricKind::WorkTime => {
                model.options.time_unit.from_seconds(totals[m])
            }
            MetricKind::Custom => totals[m],
        };
    }
}
