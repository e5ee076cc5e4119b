//! itinera - multi-worker itinerary optimization
//!
//! A routing-and-scheduling library: a fleet of workers housed at hubs visits
//! jobs within arrival windows, performs tool-using tasks at each, and
//! minimizes a weighted blend of distance, travel time, work time and
//! (negated) reward metrics. The output is a per-worker timestamped itinerary
//! plus the list of jobs no worker took.

pub mod format;
pub mod geometry;
pub mod graph;
pub mod matrix;
pub mod model;
pub mod routing;
pub mod simulate;
pub mod solution;
pub mod solve;
pub mod units;
pub mod vehicle;

#[cfg(test)]
pub(crate) mod test_utils;

pub use solve::{solve, solve_with, SolveConfig};

/// Identifier type used for tools, metrics, places, workers and tasks.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
///
/// Used for synthetic artifacts such as the arrival pseudo-task; real entity
/// ids come from the input document.
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
