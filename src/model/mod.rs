//! Problem entities and structural validation.
//!
//! The wire document (see [`crate::format`]) is loose: every reference is a
//! string id and every field is optional. Validation resolves it into the
//! typed [`ProblemModel`], where references are arena-index handles and all
//! invariants hold. Everything downstream of the validator operates on
//! handles only.

mod entities;
mod error;
mod validate;

pub use entities::{
    Capability, GeometryMode, Guarantee, JobDetail, Metric, MetricId, MetricKind, MetricMode,
    ModifierValue, Options, Place, PlaceId, PlaceKind, ProblemModel, Reward, RewardModifier,
    TaskSpec, Tool, ToolId, Worker, WorkerId,
};
pub use error::{ValidationError, ValidationKind};
pub use validate::validate;
