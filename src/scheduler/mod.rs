pub mod burst;
pub mod drrha;
pub mod fifo;

use crate::core::{
    observer::Observer,
    state::{JobExec, JobId, MipsShare, SchedCtx, SimTime},
};
use crate::error::SchedError;
pub use drrha::DrrhaScheduler;
pub use fifo::FifoScheduler;

/// A cloudlet scheduler driven by an external simulation clock.
///
/// The caller submits jobs, then calls `tick` at every event time and again
/// no later than the delay `tick` returns.
pub trait CloudletScheduler {
    /// Place a new job in the waiting list. Returns the job's estimated time
    /// contribution, file transfer included.
    fn submit(&mut self, job: JobExec, file_transfer_time: f64) -> Result<f64, SchedError>;

    /// Bring every job up to `now` and reorganise the lists. Returns the delay
    /// until the scheduler needs to run again, or `None` when nothing executes.
    fn tick(&mut self, now: SimTime, share: &MipsShare) -> Option<f64>;

    /// Account progress of one executing job up to `now`. Returns the
    /// instructions completed.
    fn update_job_progress(&mut self, id: JobId, now: SimTime) -> Result<f64, SchedError>;

    fn context_switch_count(&self) -> u64 {
        0
    }

    fn ctx(&self) -> &SchedCtx;

    fn observer_mut(&mut self) -> &mut Observer;
}

pub(crate) fn validate_job(job: &JobExec) -> Result<(), SchedError> {
    if !(job.length.is_finite() && job.length > 0.0) {
        return Err(SchedError::InvalidJob {
            id: job.id,
            reason: "length must be positive",
        });
    }
    if job.remaining_length < 0.0 || job.remaining_length > job.length {
        return Err(SchedError::InvalidJob {
            id: job.id,
            reason: "remaining length outside [0, length]",
        });
    }
    if job.pes == 0 {
        return Err(SchedError::InvalidJob {
            id: job.id,
            reason: "at least one PE is required",
        });
    }
    Ok(())
}
