//! JSON wire format.
//!
//! Input documents are decoded into the loose [`input::ProblemInput`] and
//! passed through [`crate::model::validate`]; results are rendered through
//! [`output`]. Field names are lower-camel on the wire.

pub mod input;
pub mod output;

pub use input::ProblemInput;
pub use output::ItineraryOutput;
