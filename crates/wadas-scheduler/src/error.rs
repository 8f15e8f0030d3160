//! Scheduler error types.

use thiserror::Error;

use wadas_core::Stage;

/// Errors surfaced per stage by a scheduling call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// No node passed the stage's capacity filter with usable telemetry.
    #[error("no eligible node for the {stage} stage")]
    NoEligibleNode { stage: Stage },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
