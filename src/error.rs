use thiserror::Error;

use crate::core::state::JobId;

/// Errors reported by the schedulers and the simulation driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedError {
    #[error("job {0} is already known to the scheduler")]
    DuplicateJob(JobId),

    #[error("job {0} has already finished and cannot be resubmitted")]
    AlreadyFinished(JobId),

    #[error("job {id} is malformed: {reason}")]
    InvalidJob { id: JobId, reason: &'static str },

    #[error("unknown job {0}")]
    UnknownJob(JobId),

    #[error("job {0} is not executing")]
    NotExecuting(JobId),

    #[error("invalid MIPS share: {0}")]
    InvalidShare(&'static str),

    #[error("job {id} needs {pes} PEs but only {total} exist")]
    JobTooWide { id: JobId, pes: usize, total: usize },

    #[error("simulation did not finish within {0} steps")]
    StepLimitExceeded(u64),

    #[error("simulation stalled with {0} unfinished jobs and no pending event")]
    Stalled(usize),
}

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
