//! Error types for the mining pipeline.

use std::time::Duration;

use crate::context::CancelCause;
use crate::mining::CycleStage;

/// Failure reported by a collaborator (fetcher, commit inspector, appraiser, notifier).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Transport failure or non-success status, usually after retries.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered but the payload could not be used.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Cancelled(CancelCause),
}

/// Why a single repository could not be appraised.
#[derive(Debug, thiserror::Error)]
pub enum AppraisalError {
    #[error("appraisal timed out after {0:?}")]
    TimedOut(Duration),

    #[error("appraisal failed: {0}")]
    Failed(#[from] PortError),

    #[error("appraiser panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("activity filter interrupted: {0}")]
    Cancelled(CancelCause),
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("appraisal pool interrupted: {0}")]
    Cancelled(CancelCause),
}

#[derive(Debug, thiserror::Error)]
pub enum MiningError {
    #[error("mining cycle cancelled during {stage}: {cause}")]
    Cancelled { stage: CycleStage, cause: CancelCause },
}

impl MiningError {
    pub fn cause(&self) -> CancelCause {
        match self {
            MiningError::Cancelled { cause, .. } => *cause,
        }
    }
}
