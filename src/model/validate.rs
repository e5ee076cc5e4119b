//! Structural validation and reference resolution.
//!
//! Validation runs in a fixed order: options → tools → metrics → hubs →
//! jobs → workers → guarantees, because each step resolves string
//! references against the indexes built by earlier steps. Running a step
//! before its prerequisites is a programming error and panics.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::entities::{
    Capability, GeometryMode, Guarantee, JobDetail, Metric, MetricId, MetricKind, MetricMode,
    ModifierValue, Options, Place, PlaceId, PlaceKind, ProblemModel, Reward, RewardModifier,
    TaskSpec, Tool, ToolId, Worker, WorkerId,
};
use super::error::{ValidationError, ValidationKind};
use crate::format::input::{
    CapabilityInput, GuaranteeInput, JobInput, ProblemInput, RewardModifierInput, TaskInput,
    WorkerInput,
};
use crate::units::{DistanceUnit, TimeUnit};

const DEFAULT_TIMEOUT_SECONDS: u32 = 30;

/// Validates a wire document into a [`ProblemModel`].
pub fn validate(input: &ProblemInput) -> Result<ProblemModel, ValidationError> {
    Validator::new(input).run()
}

struct Validator<'a> {
    input: &'a ProblemInput,
    options: Option<Options>,
    tools: Option<Vec<Tool>>,
    tool_index: HashMap<String, ToolId>,
    metrics: Option<Vec<Metric>>,
    metric_index: HashMap<String, MetricId>,
    places: Option<Vec<Place>>,
    place_index: HashMap<String, PlaceId>,
    hub_ids: HashSet<PlaceId>,
    workers: Option<Vec<Worker>>,
    worker_index: HashMap<String, WorkerId>,
    guarantees: Option<Vec<Guarantee>>,
}

/// Shorthand for the failure paths below.
fn fail(context: impl Into<String>, kind: ValidationKind) -> ValidationError {
    ValidationError::new(context, kind)
}

/// Context path element: the entity's own id when present, its position
/// otherwise.
fn id_or_index(prefix: &str, id: Option<&str>, index: usize) -> String {
    match id {
        Some(id) if !id.is_empty() => format!("{prefix}.{id}"),
        _ => format!("{prefix}[{index}]"),
    }
}

impl<'a> Validator<'a> {
    fn new(input: &'a ProblemInput) -> Self {
        Self {
            input,
            options: None,
            tools: None,
            tool_index: HashMap::new(),
            metrics: None,
            metric_index: HashMap::new(),
            places: None,
            place_index: HashMap::new(),
            hub_ids: HashSet::new(),
            workers: None,
            worker_index: HashMap::new(),
            guarantees: None,
        }
    }

    fn run(mut self) -> Result<ProblemModel, ValidationError> {
        self.options()?;
        self.tools()?;
        self.metrics()?;
        self.hubs()?;
        self.jobs()?;
        self.workers()?;
        self.guarantees()?;
        self.finish()
    }

    // ── Phase 0: options ──────────────────────────────────────────────

    fn options(&mut self) -> Result<(), ValidationError> {
        let input = self.input;

        let timeout_seconds = match input.timeout_seconds {
            None => DEFAULT_TIMEOUT_SECONDS,
            Some(t) if t < 1 => {
                return Err(fail(
                    "options.timeoutSeconds",
                    ValidationKind::LessThanOrEqualToZero,
                ))
            }
            Some(t) => t as u32,
        };

        let default_travel_speed = input.default_travel_speed.unwrap_or(1.0);
        if default_travel_speed <= 0.0 {
            return Err(fail(
                "options.defaultTravelSpeed",
                ValidationKind::LessThanOrEqualToZero,
            ));
        }

        let distance_unit = match &input.distance_unit {
            None => DistanceUnit::default(),
            Some(raw) => DistanceUnit::from_str(raw)
                .map_err(|_| fail("options.distanceUnit", ValidationKind::Unrecognized))?,
        };
        let time_unit = match &input.time_unit {
            None => TimeUnit::default(),
            Some(raw) => TimeUnit::from_str(raw)
                .map_err(|_| fail("options.timeUnit", ValidationKind::Unrecognized))?,
        };
        let engine = match &input.engine {
            None => GeometryMode::default(),
            Some(raw) => GeometryMode::from_str(raw)
                .map_err(|_| fail("options.engine", ValidationKind::Unrecognized))?,
        };

        let max_idle_time = input.max_idle_time.unwrap_or(0.0);
        if max_idle_time < 0.0 {
            return Err(fail("options.maxIdleTime", ValidationKind::LessThanZero));
        }

        self.options = Some(Options {
            t_zero: input.t_zero,
            timeout_seconds,
            default_travel_speed,
            distance_unit,
            time_unit,
            max_idle_time,
            engine,
        });
        Ok(())
    }

    // ── Phase 1: tools ────────────────────────────────────────────────

    fn tools(&mut self) -> Result<(), ValidationError> {
        let mut tools = Vec::new();
        for (i, tool) in self.input.tools.iter().flatten().enumerate() {
            let context = id_or_index("tools", tool.id.as_deref(), i);
            let id = match tool.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(fail(format!("{context}.id"), ValidationKind::MissingOrEmpty)),
            };
            if self.tool_index.contains_key(&id) {
                return Err(fail(context, ValidationKind::NotUnique));
            }

            let work_time = tool
                .work_time
                .ok_or_else(|| fail(format!("{context}.workTime"), ValidationKind::Missing))?;
            if work_time <= 0.0 {
                return Err(fail(
                    format!("{context}.workTime"),
                    ValidationKind::LessThanOrEqualToZero,
                ));
            }

            let completion_chance = tool.completion_chance.ok_or_else(|| {
                fail(
                    format!("{context}.completionChance"),
                    ValidationKind::Missing,
                )
            })?;
            if completion_chance <= 0.0 || completion_chance > 1.0 {
                return Err(fail(
                    format!("{context}.completionChance"),
                    ValidationKind::Invalid,
                ));
            }

            self.tool_index
                .insert(id.clone(), ToolId(tools.len() as u32));
            tools.push(Tool {
                id,
                work_time,
                completion_chance,
            });
        }
        self.tools = Some(tools);
        Ok(())
    }

    // ── Phase 2: metrics ──────────────────────────────────────────────

    fn metrics(&mut self) -> Result<(), ValidationError> {
        let mut metrics = Vec::new();
        let mut builtin_seen: HashSet<MetricKind> = HashSet::new();
        for (i, metric) in self.input.metrics.iter().flatten().enumerate() {
            let context = id_or_index("metrics", metric.id.as_deref(), i);
            let id = match metric.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(fail(format!("{context}.id"), ValidationKind::MissingOrEmpty)),
            };
            if self.metric_index.contains_key(&id) {
                return Err(fail(context, ValidationKind::NotUnique));
            }

            let kind_raw = metric
                .kind
                .as_deref()
                .ok_or_else(|| fail(format!("{context}.type"), ValidationKind::Missing))?;
            let kind = MetricKind::from_str(kind_raw)
                .map_err(|_| fail(format!("{context}.type"), ValidationKind::Unrecognized))?;
            if kind != MetricKind::Custom && !builtin_seen.insert(kind) {
                return Err(fail(format!("{context}.type"), ValidationKind::NotUnique));
            }

            let mode_raw = metric
                .mode
                .as_deref()
                .ok_or_else(|| fail(format!("{context}.mode"), ValidationKind::Missing))?;
            let mode = MetricMode::from_str(mode_raw)
                .map_err(|_| fail(format!("{context}.mode"), ValidationKind::Unrecognized))?;

            let weight = metric
                .weight
                .ok_or_else(|| fail(format!("{context}.weight"), ValidationKind::Missing))?;
            if weight < 0.0 {
                return Err(fail(
                    format!("{context}.weight"),
                    ValidationKind::LessThanZero,
                ));
            }

            self.metric_index
                .insert(id.clone(), MetricId(metrics.len() as u32));
            metrics.push(Metric {
                id,
                kind,
                mode,
                weight,
            });
        }
        self.metrics = Some(metrics);
        Ok(())
    }

    // ── Phase 3: hubs ─────────────────────────────────────────────────

    fn hubs(&mut self) -> Result<(), ValidationError> {
        let hubs = match &self.input.hubs {
            Some(hubs) if !hubs.is_empty() => hubs,
            _ => return Err(fail("hubs", ValidationKind::MissingOrEmpty)),
        };

        let mut places = Vec::new();
        for (i, hub) in hubs.iter().enumerate() {
            let context = id_or_index("hubs", hub.id.as_deref(), i);
            let id = match hub.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(fail(format!("{context}.id"), ValidationKind::MissingOrEmpty)),
            };
            if self.place_index.contains_key(&id) {
                return Err(fail(context, ValidationKind::NotUnique));
            }
            let place_id = PlaceId(places.len() as u32);
            self.place_index.insert(id.clone(), place_id);
            self.hub_ids.insert(place_id);
            places.push(Place {
                id,
                location: hub.location.map(|l| (l.x, l.y)),
                kind: PlaceKind::Hub,
            });
        }
        self.places = Some(places);
        Ok(())
    }

    // ── Phase 4: jobs ─────────────────────────────────────────────────

    fn jobs(&mut self) -> Result<(), ValidationError> {
        assert!(
            self.tools.is_some() && self.metrics.is_some() && self.places.is_some(),
            "jobs validated before tools, metrics and hubs"
        );

        for (i, job) in self.input.jobs.iter().flatten().enumerate() {
            let context = id_or_index("jobs", job.id.as_deref(), i);
            let id = match job.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(fail(format!("{context}.id"), ValidationKind::MissingOrEmpty)),
            };
            if self.place_index.contains_key(&id) {
                return Err(fail(context, ValidationKind::NotUnique));
            }

            let detail = self.job_detail(job, &context)?;
            let places = self.places.as_mut().expect("checked above");
            let place_id = PlaceId(places.len() as u32);
            self.place_index.insert(id.clone(), place_id);
            places.push(Place {
                id,
                location: job.location.map(|l| (l.x, l.y)),
                kind: PlaceKind::Job(detail),
            });
        }
        Ok(())
    }

    fn job_detail(&self, job: &JobInput, context: &str) -> Result<JobDetail, ValidationError> {
        let window = job
            .arrival_window
            .as_ref()
            .ok_or_else(|| fail(format!("{context}.arrivalWindow"), ValidationKind::Missing))?;
        let open = window.open.ok_or_else(|| {
            fail(
                format!("{context}.arrivalWindow.open"),
                ValidationKind::Missing,
            )
        })?;
        let close = window.close.ok_or_else(|| {
            fail(
                format!("{context}.arrivalWindow.close"),
                ValidationKind::Missing,
            )
        })?;
        if close < open {
            return Err(fail(
                format!("{context}.arrivalWindow"),
                ValidationKind::Invalid,
            ));
        }

        let task_inputs = match &job.tasks {
            Some(tasks) if !tasks.is_empty() => tasks,
            _ => {
                return Err(fail(
                    format!("{context}.tasks"),
                    ValidationKind::MissingOrEmpty,
                ))
            }
        };

        let mut tasks = Vec::new();
        let mut seen = HashSet::new();
        for (j, task) in task_inputs.iter().enumerate() {
            tasks.push(self.task_spec(task, j, context, &mut seen)?);
        }

        Ok(JobDetail {
            open,
            close,
            optional: job.optional.unwrap_or(false),
            tasks,
        })
    }

    fn task_spec(
        &self,
        task: &TaskInput,
        index: usize,
        job_context: &str,
        seen: &mut HashSet<String>,
    ) -> Result<TaskSpec, ValidationError> {
        let context = id_or_index(&format!("{job_context}.tasks"), task.id.as_deref(), index);
        let id = match task.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(fail(format!("{context}.id"), ValidationKind::MissingOrEmpty)),
        };
        if !seen.insert(id.clone()) {
            return Err(fail(context, ValidationKind::NotUnique));
        }

        let tool_raw = task
            .tool
            .as_deref()
            .ok_or_else(|| fail(format!("{context}.tool"), ValidationKind::Missing))?;
        let tool = *self
            .tool_index
            .get(tool_raw)
            .ok_or_else(|| fail(format!("{context}.tool"), ValidationKind::Unrecognized))?;

        let mut rewards = Vec::new();
        for (k, reward) in task.rewards.iter().flatten().enumerate() {
            let reward_context = format!("{context}.rewards[{k}]");
            let metric_raw = reward.metric.as_deref().ok_or_else(|| {
                fail(format!("{reward_context}.metric"), ValidationKind::Missing)
            })?;
            let metric = *self.metric_index.get(metric_raw).ok_or_else(|| {
                fail(
                    format!("{reward_context}.metric"),
                    ValidationKind::Unrecognized,
                )
            })?;
            let amount = reward.amount.ok_or_else(|| {
                fail(format!("{reward_context}.amount"), ValidationKind::Missing)
            })?;
            if amount < 0.0 {
                return Err(fail(
                    format!("{reward_context}.amount"),
                    ValidationKind::LessThanZero,
                ));
            }
            rewards.push(Reward { metric, amount });
        }

        // Task order is the 1-based position within the job's task list.
        Ok(TaskSpec {
            id,
            order: (index + 1) as u32,
            tool,
            optional: task.optional.unwrap_or(false),
            rewards,
        })
    }

    // ── Phase 5: workers ──────────────────────────────────────────────

    fn workers(&mut self) -> Result<(), ValidationError> {
        assert!(
            self.tools.is_some() && self.metrics.is_some() && self.places.is_some(),
            "workers validated before tools, metrics and places"
        );

        let worker_inputs = match &self.input.workers {
            Some(workers) if !workers.is_empty() => workers,
            _ => return Err(fail("workers", ValidationKind::MissingOrEmpty)),
        };

        let mut workers = Vec::new();
        for (i, worker) in worker_inputs.iter().enumerate() {
            let context = id_or_index("workers", worker.id.as_deref(), i);
            let id = match worker.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(fail(format!("{context}.id"), ValidationKind::MissingOrEmpty)),
            };
            if self.worker_index.contains_key(&id) {
                return Err(fail(context, ValidationKind::NotUnique));
            }

            let resolved = self.worker(worker, &context, id.clone())?;
            self.worker_index
                .insert(id, WorkerId(workers.len() as u32));
            workers.push(resolved);
        }
        self.workers = Some(workers);
        Ok(())
    }

    fn hub_ref(&self, raw: Option<&str>, context: String) -> Result<PlaceId, ValidationError> {
        let raw = raw.ok_or_else(|| fail(context.clone(), ValidationKind::Missing))?;
        let place = *self
            .place_index
            .get(raw)
            .ok_or_else(|| fail(context.clone(), ValidationKind::Unrecognized))?;
        if !self.hub_ids.contains(&place) {
            return Err(fail(context, ValidationKind::Unrecognized));
        }
        Ok(place)
    }

    fn worker(
        &self,
        worker: &WorkerInput,
        context: &str,
        id: String,
    ) -> Result<Worker, ValidationError> {
        let start_hub = self.hub_ref(worker.start_hub.as_deref(), format!("{context}.startHub"))?;
        let end_hub = self.hub_ref(worker.end_hub.as_deref(), format!("{context}.endHub"))?;

        if let (Some(earliest), Some(latest)) =
            (worker.earliest_start_time, worker.latest_end_time)
        {
            if earliest > latest {
                return Err(fail(
                    format!("{context}.earliestStartTime"),
                    ValidationKind::Invalid,
                ));
            }
        }

        let travel_speed_factor = worker.travel_speed_factor.unwrap_or(1.0);
        if travel_speed_factor <= 0.0 {
            return Err(fail(
                format!("{context}.travelSpeedFactor"),
                ValidationKind::LessThanOrEqualToZero,
            ));
        }

        let mut capabilities = HashMap::new();
        for (j, cap) in worker.capabilities.iter().flatten().enumerate() {
            let cap = self.capability(cap, j, context)?;
            let tool_name = &self.tools.as_ref().expect("tools validated")[cap.tool.0 as usize].id;
            if capabilities.insert(cap.tool, cap.clone()).is_some() {
                return Err(fail(
                    format!("{context}.capabilities.{tool_name}"),
                    ValidationKind::NotUnique,
                ));
            }
        }

        let mut modifiers = Vec::new();
        for (j, modifier) in worker.reward_modifiers.iter().flatten().enumerate() {
            modifiers.push(self.reward_modifier(modifier, j, context)?);
        }

        Ok(Worker {
            id,
            start_hub,
            end_hub,
            earliest_start: worker.earliest_start_time,
            latest_end: worker.latest_end_time,
            travel_speed_factor,
            capabilities,
            modifiers,
        })
    }

    fn capability(
        &self,
        cap: &CapabilityInput,
        index: usize,
        worker_context: &str,
    ) -> Result<Capability, ValidationError> {
        let context = id_or_index(
            &format!("{worker_context}.capabilities"),
            cap.tool.as_deref(),
            index,
        );
        let tool_raw = cap
            .tool
            .as_deref()
            .ok_or_else(|| fail(format!("{context}.tool"), ValidationKind::Missing))?;
        let tool = *self
            .tool_index
            .get(tool_raw)
            .ok_or_else(|| fail(format!("{context}.tool"), ValidationKind::Unrecognized))?;

        if let Some(work_time) = cap.work_time {
            if work_time < 0.0 {
                return Err(fail(
                    format!("{context}.workTime"),
                    ValidationKind::LessThanZero,
                ));
            }
        }

        let work_time_factor = cap.work_time_factor.unwrap_or(1.0);
        if work_time_factor <= 0.0 {
            return Err(fail(
                format!("{context}.workTimeFactor"),
                ValidationKind::LessThanOrEqualToZero,
            ));
        }

        if let Some(chance) = cap.completion_chance {
            if !(0.0..=1.0).contains(&chance) {
                return Err(fail(
                    format!("{context}.completionChance"),
                    ValidationKind::Invalid,
                ));
            }
        }

        let mut reward_factors = HashMap::new();
        for (metric_raw, factor) in cap.reward_factors.iter().flatten() {
            let metric = *self.metric_index.get(metric_raw).ok_or_else(|| {
                fail(
                    format!("{context}.rewardFactors.{metric_raw}"),
                    ValidationKind::Unrecognized,
                )
            })?;
            if *factor < 0.0 {
                return Err(fail(
                    format!("{context}.rewardFactors.{metric_raw}"),
                    ValidationKind::LessThanZero,
                ));
            }
            reward_factors.insert(metric, *factor);
        }

        Ok(Capability {
            tool,
            work_time: cap.work_time,
            work_time_factor,
            completion_chance: cap.completion_chance,
            reward_factors,
        })
    }

    fn reward_modifier(
        &self,
        modifier: &RewardModifierInput,
        index: usize,
        worker_context: &str,
    ) -> Result<RewardModifier, ValidationError> {
        let context = format!("{worker_context}.rewardModifiers[{index}]");

        let metric_raw = modifier
            .metric
            .as_deref()
            .ok_or_else(|| fail(format!("{context}.metric"), ValidationKind::Missing))?;
        let metric = *self
            .metric_index
            .get(metric_raw)
            .ok_or_else(|| fail(format!("{context}.metric"), ValidationKind::Unrecognized))?;

        if modifier.tool.is_some() && modifier.place.is_some() {
            return Err(fail(context, ValidationKind::Invalid));
        }
        let tool = modifier
            .tool
            .as_deref()
            .map(|raw| {
                self.tool_index
                    .get(raw)
                    .copied()
                    .ok_or_else(|| fail(format!("{context}.tool"), ValidationKind::Unrecognized))
            })
            .transpose()?;
        let place = modifier
            .place
            .as_deref()
            .map(|raw| {
                self.place_index
                    .get(raw)
                    .copied()
                    .ok_or_else(|| fail(format!("{context}.place"), ValidationKind::Unrecognized))
            })
            .transpose()?;

        let value = match (modifier.factor, modifier.amount) {
            (Some(factor), None) => {
                if factor < 0.0 {
                    return Err(fail(
                        format!("{context}.factor"),
                        ValidationKind::LessThanZero,
                    ));
                }
                ModifierValue::Factor(factor)
            }
            (None, Some(amount)) => {
                if amount < 0.0 {
                    return Err(fail(
                        format!("{context}.amount"),
                        ValidationKind::LessThanZero,
                    ));
                }
                // Flat amounts are visit rewards; they need a place to bind to.
                if place.is_none() {
                    return Err(fail(format!("{context}.place"), ValidationKind::Missing));
                }
                ModifierValue::Amount(amount)
            }
            _ => return Err(fail(context, ValidationKind::Invalid)),
        };

        Ok(RewardModifier {
            metric,
            tool,
            place,
            value,
        })
    }

    // ── Phase 6: guarantees ───────────────────────────────────────────

    fn guarantees(&mut self) -> Result<(), ValidationError> {
        assert!(
            self.workers.is_some() && self.places.is_some(),
            "guarantees validated before workers and places"
        );

        let mut guarantees = Vec::new();
        let mut must_visit_places: HashSet<PlaceId> = HashSet::new();
        for (i, guarantee) in self.input.guarantees.iter().flatten().enumerate() {
            guarantees.push(self.guarantee(guarantee, i, &mut must_visit_places)?);
        }
        self.guarantees = Some(guarantees);
        Ok(())
    }

    fn guarantee(
        &self,
        guarantee: &GuaranteeInput,
        index: usize,
        must_visit_places: &mut HashSet<PlaceId>,
    ) -> Result<Guarantee, ValidationError> {
        let context = format!("guarantees[{index}]");

        let worker_raw = guarantee
            .worker
            .as_deref()
            .ok_or_else(|| fail(format!("{context}.worker"), ValidationKind::Missing))?;
        let worker = *self
            .worker_index
            .get(worker_raw)
            .ok_or_else(|| fail(format!("{context}.worker"), ValidationKind::Unrecognized))?;

        let place_raw = guarantee
            .place
            .as_deref()
            .ok_or_else(|| fail(format!("{context}.place"), ValidationKind::Missing))?;
        let place = *self
            .place_index
            .get(place_raw)
            .ok_or_else(|| fail(format!("{context}.place"), ValidationKind::Unrecognized))?;
        // Guarantees steer job assignment only; hubs are not guaranteeable.
        if self.hub_ids.contains(&place) {
            return Err(fail(format!("{context}.place"), ValidationKind::Invalid));
        }

        let must_visit = guarantee.must_visit.unwrap_or(true);
        if must_visit && !must_visit_places.insert(place) {
            return Err(fail(
                format!("guarantees.{place_raw}"),
                ValidationKind::NotUnique,
            ));
        }

        Ok(Guarantee {
            worker,
            place,
            must_visit,
        })
    }

    // ── Finalization ──────────────────────────────────────────────────

    fn finish(self) -> Result<ProblemModel, ValidationError> {
        let options = self.options.expect("options validated");
        let workers = self.workers.expect("workers validated");
        let places = self.places.expect("places validated");

        let t_zero = options.t_zero.unwrap_or_else(|| {
            select_t_zero(
                workers.iter().filter_map(|w| w.earliest_start),
                places.iter().filter_map(|p| p.job().map(|j| j.open)),
            )
        });

        let mut model = ProblemModel {
            options,
            tools: self.tools.expect("tools validated"),
            metrics: self.metrics.expect("metrics validated"),
            places,
            workers,
            guarantees: self.guarantees.expect("guarantees validated"),
            t_zero,
        };
        model.demote_unreachable_jobs();
        Ok(model)
    }
}

/// Reference-timestamp selection.
///
/// With at least one worker earliest-start, T₀ is the minimum over worker
/// earliest-starts and job window opens. Without one, T₀ degrades to the
/// minimum representable timestamp and all comparisons become relative
/// seconds.
fn select_t_zero(
    earliest_starts: impl Iterator<Item = DateTime<Utc>>,
    job_opens: impl Iterator<Item = DateTime<Utc>>,
) -> DateTime<Utc> {
    let earliest: Vec<_> = earliest_starts.collect();
    if earliest.is_empty() {
        return DateTime::<Utc>::MIN_UTC;
    }
    earliest
        .into_iter()
        .chain(job_opens)
        .min()
        .expect("at least one earliest start")
}
