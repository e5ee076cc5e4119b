//! Distance and travel-time matrices over the node graph.
//!
//! The simple engine works on planar coordinates with Manhattan metric;
//! road-network geometry (OSRM) is an extension point and currently
//! unimplemented. Distances are held in meters, travel times in seconds
//! at the fleet's default speed — per-worker speed factors apply later,
//! in the vehicle matrix builder.

use thiserror::Error;

use crate::graph::Node;
use crate::matrix::Matrix;
use crate::model::{GeometryMode, MetricKind, ProblemModel};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("geometry engine '{0}' is not implemented")]
    NotImplemented(&'static str),
}

/// Pairwise geometry over nodes.
///
/// Matrices that no metric asks for stay zero-filled; entries between
/// nodes at the same place, or where either location is missing, are zero.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Meters, row = origin node, column = destination node.
    pub distance: Matrix<f64>,
    /// Seconds at the default travel speed.
    pub travel_time: Matrix<f64>,
}

/// Builds the geometry for the node list.
///
/// The distance matrix is populated only when a Distance metric exists or
/// a TravelTime metric exists under the simple engine; the travel-time
/// matrix only when a TravelTime metric exists.
pub fn build_geometry(model: &ProblemModel, nodes: &[Node]) -> Result<Geometry, GeometryError> {
    if model.options.engine == GeometryMode::Osrm {
        return Err(GeometryError::NotImplemented("osrm"));
    }

    let has_distance_metric = model
        .metrics
        .iter()
        .any(|m| m.kind == MetricKind::Distance);
    let has_travel_metric = model
        .metrics
        .iter()
        .any(|m| m.kind == MetricKind::TravelTime);

    let needs_distance = has_distance_metric || has_travel_metric;

    let n = nodes.len();
    let mut distance: Matrix<f64> = Matrix::new(n);
    let mut travel_time: Matrix<f64> = Matrix::new(n);

    if !needs_distance && !has_travel_metric {
        return Ok(Geometry {
            distance,
            travel_time,
        });
    }

    let meters_per_unit = model.options.distance_unit.meters_per_unit();
    let seconds_per_unit = model.options.time_unit.seconds_per_unit();
    let speed = model.options.default_travel_speed;

    for a in nodes {
        let from = model.place(a.place);
        for b in nodes {
            if a.place == b.place {
                continue;
            }
            let to = model.place(b.place);
            let (Some((ax, ay)), Some((bx, by))) = (from.location, to.location) else {
                continue;
            };

            let units = (ax - bx).abs() + (ay - by).abs();
            let meters = units * meters_per_unit;
            if needs_distance {
                distance.set(a.id, b.id, meters);
            }
            if has_travel_metric {
                travel_time.set(a.id, b.id, units / speed * seconds_per_unit);
            }
        }
    }

    Ok(Geometry {
        distance,
        travel_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::expand_nodes;
    use crate::model::validate;
    use crate::test_utils::{base_problem, hub_input, metric_input};

    fn with_metrics(metrics: Vec<crate::format::input::MetricInput>) -> crate::model::ProblemModel {
        let mut input = base_problem();
        input.metrics = Some(metrics);
        validate(&input).unwrap()
    }

    // ── Manhattan distances ───────────────────────────────────────────

    #[test]
    fn distance_is_manhattan_in_meters() {
        let mut input = base_problem();
        input.metrics = Some(vec![metric_input("dist", "distance", "minimize", 1.0)]);
        input.hubs.as_mut().unwrap().push(hub_input("north", 3.0, 4.0));
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        let geometry = build_geometry(&model, &nodes).unwrap();
        // depot (0,0) → north (3,4): |3| + |4| = 7 units, metre factor 1.
        assert!((geometry.distance.get(0, 1) - 7.0).abs() < 1e-9);
        assert!((geometry.distance.get(1, 0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn distance_unit_factor_scales_meters() {
        let mut input = base_problem();
        input.metrics = Some(vec![metric_input("dist", "distance", "minimize", 1.0)]);
        input.distance_unit = Some("fathom".into());
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        let geometry = build_geometry(&model, &nodes).unwrap();
        // depot (0,0) → job (1,0): 1 fathom = 1.8288 m.
        assert!((geometry.distance.get(0, 1) - 1.8288).abs() < 1e-9);
    }

    #[test]
    fn travel_time_honors_speed_and_time_unit() {
        let mut input = base_problem();
        input.metrics = Some(vec![metric_input("tt", "travelTime", "minimize", 1.0)]);
        input.default_travel_speed = Some(2.0);
        input.time_unit = Some("minute".into());
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        let geometry = build_geometry(&model, &nodes).unwrap();
        // 1 unit at 2 units/minute = 0.5 minutes = 30 seconds.
        assert!((geometry.travel_time.get(0, 1) - 30.0).abs() < 1e-9);
    }

    // ── Zero entries ──────────────────────────────────────────────────

    #[test]
    fn same_place_transits_are_zero() {
        let model = with_metrics(vec![metric_input("dist", "distance", "minimize", 1.0)]);
        let nodes = expand_nodes(&model);
        let geometry = build_geometry(&model, &nodes).unwrap();
        assert_eq!(*geometry.distance.get(0, 0), 0.0);
        assert_eq!(*geometry.distance.get(1, 1), 0.0);
    }

    #[test]
    fn missing_location_yields_zero() {
        let mut input = base_problem();
        input.metrics = Some(vec![metric_input("dist", "distance", "minimize", 1.0)]);
        input.hubs.as_mut().unwrap()[0].location = None;
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        let geometry = build_geometry(&model, &nodes).unwrap();
        assert_eq!(*geometry.distance.get(0, 1), 0.0);
    }

    #[test]
    fn matrices_stay_zero_without_geometry_metrics() {
        let model = with_metrics(vec![metric_input("wt", "workTime", "minimize", 1.0)]);
        let nodes = expand_nodes(&model);
        let geometry = build_geometry(&model, &nodes).unwrap();
        assert!(geometry.distance.values().all(|&v| v == 0.0));
        assert!(geometry.travel_time.values().all(|&v| v == 0.0));
    }

    // ── Engine selection ──────────────────────────────────────────────

    #[test]
    fn osrm_engine_is_unimplemented() {
        let mut input = base_problem();
        input.engine = Some("osrm".into());
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        let err = build_geometry(&model, &nodes).unwrap_err();
        assert_eq!(err, GeometryError::NotImplemented("osrm"));
    }
}
