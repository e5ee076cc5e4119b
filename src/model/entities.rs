use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use crate::Id;
use crate::units::{DistanceUnit, TimeUnit};

/// Handle into [`ProblemModel::tools`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolId(pub u32);

/// Handle into [`ProblemModel::metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId(pub u32);

/// Handle into [`ProblemModel::places`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceId(pub u32);

/// Handle into [`ProblemModel::workers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

/// A tool a task needs and a worker may be capable of.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub id: Id,
    /// Default time to use the tool once, in input time units. Positive.
    pub work_time: f64,
    /// Default probability of a use succeeding, in (0, 1].
    pub completion_chance: f64,
}

/// Built-in or user-defined cost dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Distance,
    TravelTime,
    WorkTime,
    Custom,
}

impl MetricKind {
    /// Builtin type name used as the key in `totalMetrics` for non-Custom
    /// metrics.
    pub const fn type_name(self) -> &'static str {
        match self {
            MetricKind::Distance => "Distance",
            MetricKind::TravelTime => "TravelTime",
            MetricKind::WorkTime => "WorkTime",
            MetricKind::Custom => "Custom",
        }
    }
}

impl FromStr for MetricKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "distance" => Ok(MetricKind::Distance),
            "traveltime" => Ok(MetricKind::TravelTime),
            "worktime" => Ok(MetricKind::WorkTime),
            "custom" => Ok(MetricKind::Custom),
            _ => Err(()),
        }
    }
}

/// Direction a metric pulls the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricMode {
    Minimize,
    Maximize,
}

impl FromStr for MetricMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimize" => Ok(MetricMode::Minimize),
            "maximize" => Ok(MetricMode::Maximize),
            _ => Err(()),
        }
    }
}

/// A dimension contributing to route cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub id: Id,
    pub kind: MetricKind,
    pub mode: MetricMode,
    /// Non-negative; normalized against the sum of all weights at fusion.
    pub weight: f64,
}

/// A single reward a completed task earns on a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reward {
    pub metric: MetricId,
    pub amount: f64,
}

/// A tool-using task within a job, after validation.
///
/// `order` is the 1-based index within the job's task list, assigned by the
/// validator; it drives intra-job precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub id: Id,
    pub order: u32,
    pub tool: ToolId,
    pub optional: bool,
    pub rewards: Vec<Reward>,
}

/// Job-only payload of a [`Place`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobDetail {
    /// Arrival window: a worker must arrive within `[open, close]`.
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
    /// Optional jobs may be skipped at a penalty.
    pub optional: bool,
    /// At least one task, ordered.
    pub tasks: Vec<TaskSpec>,
}

/// Discriminates hubs from jobs.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceKind {
    Hub,
    Job(JobDetail),
}

/// A visitable location: a worker hub or a job site.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: Id,
    /// Planar coordinates in input distance units. Transits to or from a
    /// place without a location cost nothing.
    pub location: Option<(f64, f64)>,
    pub kind: PlaceKind,
}

impl Place {
    pub fn is_hub(&self) -> bool {
        matches!(self.kind, PlaceKind::Hub)
    }

    pub fn job(&self) -> Option<&JobDetail> {
        match &self.kind {
            PlaceKind::Job(detail) => Some(detail),
            PlaceKind::Hub => None,
        }
    }

    fn job_mut(&mut self) -> Option<&mut JobDetail> {
        match &mut self.kind {
            PlaceKind::Job(detail) => Some(detail),
            PlaceKind::Hub => None,
        }
    }
}

/// What a worker can do with one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub tool: ToolId,
    /// Overrides the tool's default work time (input time units) when set.
    pub work_time: Option<f64>,
    /// Multiplies the effective work time. Positive, defaults to 1.
    pub work_time_factor: f64,
    /// Overrides the tool's default completion chance when set, in [0, 1].
    pub completion_chance: Option<f64>,
    /// Per-metric multipliers on rewards earned with this tool.
    pub reward_factors: HashMap<MetricId, f64>,
}

impl Capability {
    /// Reward multiplier for a metric; unspecified metrics multiply by 1.
    pub fn reward_factor(&self, metric: MetricId) -> f64 {
        self.reward_factors.get(&metric).copied().unwrap_or(1.0)
    }
}

/// Multiplicative or additive reward adjustment carried by a worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifierValue {
    /// Multiplies task rewards on the metric.
    Factor(f64),
    /// Adds a flat visit reward on the metric when the place is entered.
    Amount(f64),
}

/// Worker-level reward adjustment keyed by metric plus optionally a tool or
/// a place, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardModifier {
    pub metric: MetricId,
    pub tool: Option<ToolId>,
    pub place: Option<PlaceId>,
    pub value: ModifierValue,
}

/// A fleet member housed at start and end hubs.
#[derive(Debug, Clone, PartialEq)]
pub struct Worker {
    pub id: Id,
    pub start_hub: PlaceId,
    pub end_hub: PlaceId,
    pub earliest_start: Option<DateTime<Utc>>,
    pub latest_end: Option<DateTime<Utc>>,
    /// Divides travel times; a factor of 2 halves them. Positive.
    pub travel_speed_factor: f64,
    pub capabilities: HashMap<ToolId, Capability>,
    pub modifiers: Vec<RewardModifier>,
}

impl Worker {
    pub fn capability(&self, tool: ToolId) -> Option<&Capability> {
        self.capabilities.get(&tool)
    }

    /// Returns true if this worker can attempt the tool with a nonzero
    /// chance of success.
    pub fn can_use(&self, tool: ToolId, default_chance: f64) -> bool {
        self.capability(tool)
            .map(|cap| cap.completion_chance.unwrap_or(default_chance) > 0.0)
            .unwrap_or(false)
    }

    /// Product of all factor modifiers applicable to `(metric, tool, place)`.
    ///
    /// A factor modifier applies when its metric matches and it is either
    /// unkeyed, keyed to the tool in use, or keyed to the place being
    /// worked. Unspecified combinations multiply by 1.
    pub fn factor_modifier(&self, metric: MetricId, tool: ToolId, place: PlaceId) -> f64 {
        self.modifiers
            .iter()
            .filter(|m| m.metric == metric)
            .filter_map(|m| match m.value {
                ModifierValue::Factor(f) => {
                    let applies = match (m.tool, m.place) {
                        (None, None) => true,
                        (Some(t), None) => t == tool,
                        (None, Some(p)) => p == place,
                        (Some(_), Some(_)) => unreachable!("rejected by the validator"),
                    };
                    applies.then_some(f)
                }
                ModifierValue::Amount(_) => None,
            })
            .product()
    }

    /// Flat visit rewards this worker earns on entering `place`, per metric.
    pub fn visit_amounts(&self, place: PlaceId) -> impl Iterator<Item = (MetricId, f64)> + '_ {
        self.modifiers.iter().filter_map(move |m| match m.value {
            ModifierValue::Amount(a) if m.place == Some(place) => Some((m.metric, a)),
            _ => None,
        })
    }
}

/// Per-(worker, place) allow/deny directive overriding normal eligibility.
#[derive(Debug, Clone, PartialEq)]
pub struct Guarantee {
    pub worker: WorkerId,
    pub place: PlaceId,
    /// True pins the place to the worker; false bans the worker from it.
    pub must_visit: bool,
}

/// Geometry back-end selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryMode {
    /// Manhattan distances on planar coordinates.
    #[default]
    Simple,
    /// Road-network distances from an OSRM service. Extension point.
    Osrm,
}

impl FromStr for GeometryMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(GeometryMode::Simple),
            "osrm" => Ok(GeometryMode::Osrm),
            _ => Err(()),
        }
    }
}

/// Validated top-level options.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Explicit reference timestamp, when the document carries one.
    pub t_zero: Option<DateTime<Utc>>,
    pub timeout_seconds: u32,
    /// Distance units covered per time unit.
    pub default_travel_speed: f64,
    pub distance_unit: DistanceUnit,
    pub time_unit: TimeUnit,
    /// Maximum idle wait at a node, in input time units.
    pub max_idle_time: f64,
    pub engine: GeometryMode,
}

impl Options {
    /// Maximum idle wait in whole seconds.
    pub fn max_idle_seconds(&self) -> i64 {
        self.time_unit.to_seconds(self.max_idle_time).round() as i64
    }
}

/// The validated problem. All references are handles; all invariants hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemModel {
    pub options: Options,
    pub tools: Vec<Tool>,
    pub metrics: Vec<Metric>,
    /// Hubs first, then jobs, in input order.
    pub places: Vec<Place>,
    pub workers: Vec<Worker>,
    pub guarantees: Vec<Guarantee>,
    /// Reference timestamp; all internal time arithmetic is seconds since
    /// this instant.
    pub t_zero: DateTime<Utc>,
}

impl ProblemModel {
    pub fn tool(&self, id: ToolId) -> &Tool {
        &self.tools[id.0 as usize]
    }

    pub fn metric(&self, id: MetricId) -> &Metric {
        &self.metrics[id.0 as usize]
    }

    pub fn place(&self, id: PlaceId) -> &Place {
        &self.places[id.0 as usize]
    }

    pub(crate) fn place_mut(&mut self, id: PlaceId) -> &mut Place {
        &mut self.places[id.0 as usize]
    }

    pub fn worker(&self, id: WorkerId) -> &Worker {
        &self.workers[id.0 as usize]
    }

    /// Iterates `(handle, place)` over hub places.
    pub fn hubs(&self) -> impl Iterator<Item = (PlaceId, &Place)> {
        self.places
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_hub())
            .map(|(i, p)| (PlaceId(i as u32), p))
    }

    /// Iterates `(handle, place, detail)` over job places.
    pub fn jobs(&self) -> impl Iterator<Item = (PlaceId, &Place, &JobDetail)> {
        self.places.iter().enumerate().filter_map(|(i, p)| {
            p.job().map(|detail| (PlaceId(i as u32), p, detail))
        })
    }

    /// Whole seconds between `t` and the reference timestamp.
    pub fn seconds_since_t_zero(&self, t: DateTime<Utc>) -> i64 {
        (t - self.t_zero).num_seconds()
    }

    /// Marks any job whose window closes before a worker could ever start
    /// as optional. Called once at the end of validation.
    pub(crate) fn demote_unreachable_jobs(&mut self) {
        let earliest = self.workers.iter().filter_map(|w| w.earliest_start).min();
        let Some(earliest) = earliest else { return };

        let unreachable: Vec<(PlaceId, Id)> = self
            .jobs()
            .filter(|(_, _, detail)| detail.close < earliest && !detail.optional)
            .map(|(id, place, _)| (id, place.id.clone()))
            .collect();
        for (id, name) in unreachable {
            tracing::warn!(
                job = %name,
                "arrival window closes before any worker can start; marking optional"
            );
            if let Some(detail) = self.place_mut(id).job_mut() {
                detail.optional = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_id() -> MetricId {
        MetricId(0)
    }

    fn worker_with_modifiers(modifiers: Vec<RewardModifier>) -> Worker {
        Worker {
            id: "w".into(),
            start_hub: PlaceId(0),
            end_hub: PlaceId(0),
            earliest_start: None,
            latest_end: None,
            travel_speed_factor: 1.0,
            capabilities: HashMap::new(),
            modifiers,
        }
    }

    // ── Parsing ───────────────────────────────────────────────────────

    #[test]
    fn metric_kind_parses_case_insensitively() {
        assert_eq!("DISTANCE".parse::<MetricKind>(), Ok(MetricKind::Distance));
        assert_eq!("travelTime".parse::<MetricKind>(), Ok(MetricKind::TravelTime));
        assert_eq!("worktime".parse::<MetricKind>(), Ok(MetricKind::WorkTime));
        assert_eq!("Custom".parse::<MetricKind>(), Ok(MetricKind::Custom));
        assert!("reward".parse::<MetricKind>().is_err());
    }

    #[test]
    fn metric_mode_and_geometry_parse() {
        assert_eq!("maximize".parse::<MetricMode>(), Ok(MetricMode::Maximize));
        assert_eq!("SIMPLE".parse::<GeometryMode>(), Ok(GeometryMode::Simple));
        assert_eq!("osrm".parse::<GeometryMode>(), Ok(GeometryMode::Osrm));
        assert!("euclid".parse::<GeometryMode>().is_err());
    }

    // ── Capability defaults ───────────────────────────────────────────

    #[test]
    fn reward_factor_defaults_to_one() {
        let cap = Capability {
            tool: ToolId(0),
            work_time: None,
            work_time_factor: 1.0,
            completion_chance: None,
            reward_factors: HashMap::from([(MetricId(1), 2.5)]),
        };
        assert!((cap.reward_factor(MetricId(1)) - 2.5).abs() < 1e-12);
        assert!((cap.reward_factor(MetricId(0)) - 1.0).abs() < 1e-12);
    }

    // ── Modifier lookup ───────────────────────────────────────────────

    #[test]
    fn factor_modifier_defaults_to_one() {
        let worker = worker_with_modifiers(vec![]);
        let f = worker.factor_modifier(metric_id(), ToolId(0), PlaceId(0));
        assert!((f - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tool_keyed_factor_applies_only_to_that_tool() {
        let worker = worker_with_modifiers(vec![RewardModifier {
            metric: metric_id(),
            tool: Some(ToolId(3)),
            place: None,
            value: ModifierValue::Factor(2.0),
        }]);
        assert!((worker.factor_modifier(metric_id(), ToolId(3), PlaceId(0)) - 2.0).abs() < 1e-12);
        assert!((worker.factor_modifier(metric_id(), ToolId(1), PlaceId(0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unkeyed_and_place_keyed_factors_multiply() {
        let worker = worker_with_modifiers(vec![
            RewardModifier {
                metric: metric_id(),
                tool: None,
                place: None,
                value: ModifierValue::Factor(2.0),
            },
            RewardModifier {
                metric: metric_id(),
                tool: None,
                place: Some(PlaceId(7)),
                value: ModifierValue::Factor(3.0),
            },
        ]);
        assert!((worker.factor_modifier(metric_id(), ToolId(0), PlaceId(7)) - 6.0).abs() < 1e-12);
        assert!((worker.factor_modifier(metric_id(), ToolId(0), PlaceId(1)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn visit_amounts_filter_by_place() {
        let worker = worker_with_modifiers(vec![
            RewardModifier {
                metric: metric_id(),
                tool: None,
                place: Some(PlaceId(2)),
                value: ModifierValue::Amount(50.0),
            },
            RewardModifier {
                metric: MetricId(1),
                tool: None,
                place: Some(PlaceId(3)),
                value: ModifierValue::Amount(10.0),
            },
        ]);
        let at_two: Vec<_> = worker.visit_amounts(PlaceId(2)).collect();
        assert_eq!(at_two, vec![(metric_id(), 50.0)]);
        assert!(worker.visit_amounts(PlaceId(9)).next().is_none());
    }
}
