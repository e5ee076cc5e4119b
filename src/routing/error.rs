use thiserror::Error;

use crate::Id;

/// Fatal model-construction failures.
///
/// These abort the solve before any search starts; solver timeouts and
/// infeasibility are not errors — they surface as an empty itinerary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The constraint graph leaves a required job with no worker that
    /// could ever serve it.
    #[error("no viable worker for job '{0}'")]
    NoViableWorker(Id),

    /// A time window or worker bound lies entirely before the reference
    /// timestamp.
    #[error("time window of '{0}' lies before the reference timestamp")]
    InvalidWindow(Id),
}
