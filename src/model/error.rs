use std::fmt;
use thiserror::Error;

/// What went wrong with a validated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Missing,
    Empty,
    MissingOrEmpty,
    NotUnique,
    LessThanZero,
    LessThanOrEqualToZero,
    Unrecognized,
    Invalid,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValidationKind::Missing => "missing",
            ValidationKind::Empty => "empty",
            ValidationKind::MissingOrEmpty => "missing or empty",
            ValidationKind::NotUnique => "not unique",
            ValidationKind::LessThanZero => "less than zero",
            ValidationKind::LessThanOrEqualToZero => "less than or equal to zero",
            ValidationKind::Unrecognized => "unrecognized",
            ValidationKind::Invalid => "invalid",
        };
        f.write_str(text)
    }
}

/// Structural or semantic input problem, surfaced directly to the user.
///
/// `context` is the dot-separated path of the offending field in the input
/// document, e.g. `workers.w1.capabilities.drill.workTimeFactor`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Validation failed because {context} is {kind}.")]
pub struct ValidationError {
    pub context: String,
    pub kind: ValidationKind,
}

impl ValidationError {
    pub fn new(context: impl Into<String>, kind: ValidationKind) -> Self {
        Self {
            context: context.into(),
            kind,
        }
    }
}
