//! Generic time-shared accounting shared by every policy.
//!
//! Policies compose a [`TimeSharedBase`] instead of re-implementing
//! submission bookkeeping and instruction progress.

use super::state::{JobExec, SimTime};

pub trait TimeSharedBase {
    /// Record submission bookkeeping and return the job's estimated time
    /// contribution: file transfer plus running time on its PEs.
    fn submit(&mut self, job: &mut JobExec, file_transfer_time: f64, mips_per_pe: f64) -> f64;

    /// Convert the time elapsed since the job's last update into completed
    /// instructions, decrement its remaining length and stamp the update time.
    ///
    /// Returns the instructions completed.
    fn update_job_processing(&mut self, job: &mut JobExec, now: SimTime, mips_per_pe: f64)
        -> f64;
}

// Remainders below this fraction of a job's length count as done, so a
// wake-up landing on `finish_delay` completes the job
const COMPLETION_TOLERANCE: f64 = 1e-9;

/// Each executing job progresses at `mips_per_pe` on every PE it holds.
#[derive(Debug, Default, Clone)]
pub struct TimeShared;

impl TimeShared {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSharedBase for TimeShared {
    fn submit(&mut self, job: &mut JobExec, file_transfer_time: f64, mips_per_pe: f64) -> f64 {
        job.file_transfer_time = file_transfer_time;
        file_transfer_time + (job.length / (mips_per_pe * job.pes as f64)).abs()
    }

    fn update_job_processing(
        &mut self,
        job: &mut JobExec,
        now: SimTime,
        mips_per_pe: f64,
    ) -> f64 {
        let elapsed = (now - job.last_progress_time).max(0.0);
        let mut done = (elapsed * mips_per_pe * job.pes as f64).min(job.remaining_length);
        if job.remaining_length - done <= COMPLETION_TOLERANCE * job.length {
            done = job.remaining_length;
        }
        job.remaining_length -= done;
        job.last_progress_time = now;
        done
    }
}
