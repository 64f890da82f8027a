//! Deficit Round Robin with Hybrid Allocation (DRRHA).
//!
//! Waiting jobs are ordered by remaining burst time. A job that becomes ready
//! gets a slice of `m/2 + (m/2)/b` (`m` the mean waiting burst, `b` its own),
//! so jobs close to completion get more than the common floor.

use log::debug;
use rustc_hash::FxHashSet;

use super::burst::{self, initial_virtual_runtime, mean_burst_time_with, remaining_burst_time};
use super::{CloudletScheduler, validate_job};
use crate::config::DrrhaConfig;
use crate::core::base::{TimeShared, TimeSharedBase};
use crate::core::event::SchedEvent;
use crate::core::observer::Observer;
use crate::core::state::{JobExec, JobId, JobKey, JobState, MipsShare, SchedCtx, SimTime};
use crate::error::SchedError;

#[derive(Debug)]
pub struct DrrhaScheduler<B: TimeSharedBase = TimeShared> {
    ctx: SchedCtx,
    base: B,
    minimum_granularity: f64,
    context_switches: u64,
    observer: Observer,
}

impl DrrhaScheduler<TimeShared> {
    pub fn new(share: &MipsShare, config: &DrrhaConfig) -> Self {
        Self::with_base(share, config, TimeShared::new())
    }
}

impl<B: TimeSharedBase> DrrhaScheduler<B> {
    pub fn with_base(share: &MipsShare, config: &DrrhaConfig, base: B) -> Self {
        Self {
            ctx: SchedCtx::new(share),
            base,
            minimum_granularity: config.minimum_granularity.max(0.0),
            context_switches: 0,
            observer: Observer::new(),
        }
    }

    /// Lower bound, in seconds, on every time slice this scheduler assigns.
    pub fn minimum_granularity(&self) -> f64 {
        self.minimum_granularity
    }

    /// Applies to slices computed from now on.
    pub fn set_minimum_granularity(&mut self, minimum_granularity: f64) {
        self.minimum_granularity = minimum_granularity.max(0.0);
    }

    pub fn mean_burst_time(&self) -> f64 {
        burst::mean_burst_time(&self.ctx)
    }

    /// Whether enough PEs are free to start `job` right now.
    pub fn can_admit(&self, job: &JobExec) -> bool {
        self.ctx.has_free_pes_for(job)
    }

    /// Slice `id` would get if it became ready now; `f64::INFINITY` once the
    /// job has finished.
    pub fn time_slice_of(&self, id: JobId) -> Result<f64, SchedError> {
        let key = self.ctx.key_of(id).ok_or(SchedError::UnknownJob(id))?;
        Ok(self.compute_time_slice(key))
    }

    fn burst(&self, key: JobKey) -> f64 {
        remaining_burst_time(self.ctx.job(key), self.ctx.mips_per_pe())
    }

    fn slice_for(&self, job: &JobExec) -> f64 {
        let mean = mean_burst_time_with(&self.ctx, job);
        let remaining = remaining_burst_time(job, self.ctx.mips_per_pe());
        burst::time_slice(mean, remaining, self.minimum_granularity)
    }

    fn compute_time_slice(&self, key: JobKey) -> f64 {
        self.slice_for(self.ctx.job(key))
    }

    /// Give `key` a fresh negative virtual runtime and a new slice, as if it
    /// had just been submitted.
    fn reset(&mut self, key: JobKey) {
        let slice = self.compute_time_slice(key);
        let mips = self.ctx.mips_per_pe();
        let job = self.ctx.job_mut(key);
        job.virtual_runtime = initial_virtual_runtime(job, mips);
        job.time_slice = slice;
    }

    fn account_progress(&mut self, key: JobKey, now: SimTime) -> f64 {
        let mips = self.ctx.mips_per_pe();
        let job = self.ctx.job_mut(key);
        let elapsed = now - job.last_progress_time;
        if elapsed <= 0.0 {
            return 0.0;
        }

        // First run since the job became ready: the negative value only
        // served to order it while waiting.
        if job.virtual_runtime < 0.0 {
            job.virtual_runtime = 0.0;
        }
        let done = self.base.update_job_processing(job, now, mips);
        job.virtual_runtime += elapsed;
        done
    }

    fn finish_completed(&mut self, now: SimTime) -> Vec<JobKey> {
        let completed: Vec<JobKey> = self
            .ctx
            .exec()
            .iter()
            .copied()
            .filter(|&key| self.burst(key) <= 0.0)
            .collect();

        for &key in &completed {
            self.ctx.finish(key, now);
            let id = self.ctx.job(key).id;
            self.observer.emit(now, SchedEvent::Finished { job: id });
        }
        completed
    }

    fn expired(&self) -> Vec<JobKey> {
        self.ctx
            .exec()
            .iter()
            .copied()
            .filter(|&key| {
                let job = self.ctx.job(key);
                job.virtual_runtime >= job.time_slice
            })
            .collect()
    }

    // Expired jobs keep their PEs when a fresh slice covers their remaining
    // work or when nobody is waiting for them.
    fn rerun_expired(&mut self, now: SimTime) -> Vec<JobKey> {
        let nobody_waiting = self.ctx.waiting().is_empty();
        let mut rerun = Vec::new();

        for key in self.expired() {
            let fresh = self.compute_time_slice(key);
            if fresh < self.burst(key) && !nobody_waiting {
                continue;
            }

            let mips = self.ctx.mips_per_pe();
            let job = self.ctx.job_mut(key);
            job.virtual_runtime = initial_virtual_runtime(job, mips);
            job.time_slice = fresh;
            let id = job.id;
            self.observer.emit(now, SchedEvent::Rerun { job: id, time_slice: fresh });
            rerun.push(key);
        }
        rerun
    }

    fn preempt_expired(&mut self, now: SimTime) -> Vec<JobKey> {
        let expired = self.expired();
        for &key in &expired {
            self.ctx.move_to_waiting(key);
            self.emit_preempted(now, key);
        }
        expired
    }

    // A share with fewer PEs than the exec list holds evicts the longest
    // bursts first.
    fn shed_excess(&mut self, now: SimTime) -> Vec<JobKey> {
        let mips = self.ctx.mips_per_pe();
        let shed = self.ctx.shed_excess_by(|a, b| burst::compare(a, b, mips));
        for &key in &shed {
            self.emit_preempted(now, key);
        }
        shed
    }

    fn emit_preempted(&mut self, now: SimTime, key: JobKey) {
        let job = self.ctx.job(key);
        let event = SchedEvent::Preempted {
            job: job.id,
            virtual_runtime: job.virtual_runtime,
        };
        self.observer.emit(now, event);
    }

    fn admit(&mut self, now: SimTime, preempted: &[JobKey]) -> Vec<JobKey> {
        let mips = self.ctx.mips_per_pe();
        self.ctx.sort_waiting_by(|a, b| burst::compare(a, b, mips));

        let just_preempted: FxHashSet<JobKey> = preempted.iter().copied().collect();
        let mut admitted = self
            .ctx
            .admit_fitting(now, |key| just_preempted.contains(&key));
        if !just_preempted.is_empty() {
            admitted.extend(self.ctx.admit_fitting(now, |_| false));
        }

        for &key in &admitted {
            let id = self.ctx.job(key).id;
            self.observer.emit(now, SchedEvent::Admitted { job: id });
        }
        admitted
    }

    fn next_wakeup(&self) -> Option<f64> {
        let mips = self.ctx.mips_per_pe();
        self.ctx
            .exec_jobs()
            .map(|job| {
                let slice_left = job.time_slice - job.virtual_runtime.max(0.0);
                slice_left.min(job.finish_delay(mips)).max(0.0)
            })
            .min_by(f64::total_cmp)
    }
}

impl<B: TimeSharedBase> CloudletScheduler for DrrhaScheduler<B> {
    fn submit(&mut self, mut job: JobExec, file_transfer_time: f64) -> Result<f64, SchedError> {
        validate_job(&job)?;
        self.ctx.check_new_id(job.id)?;

        job.virtual_runtime = initial_virtual_runtime(&job, self.ctx.mips_per_pe());
        job.time_slice = self.slice_for(&job);
        let key = self.ctx.insert_waiting(job)?;

        let mips = self.ctx.mips_per_pe();
        let job = self.ctx.job_mut(key);
        let contribution = self.base.submit(job, file_transfer_time, mips);
        let event = SchedEvent::Submitted {
            job: job.id,
            virtual_runtime: job.virtual_runtime,
            time_slice: job.time_slice,
        };
        let arrival = job.arrival_time;
        let now = self.ctx.now.max(arrival);
        self.observer.emit(now, event);
        Ok(contribution)
    }

    fn tick(&mut self, now: SimTime, share: &MipsShare) -> Option<f64> {
        self.ctx.set_share(share);
        self.ctx.advance_to(now);
        let event = SchedEvent::TickStart {
            executing: self.ctx.exec().len(),
            waiting: self.ctx.waiting().len(),
        };
        self.observer.emit(now, event);

        for key in self.ctx.exec().to_vec() {
            self.account_progress(key, now);
        }

        let finished = self.finish_completed(now);
        let mut preempted = self.shed_excess(now);
        // Expired jobs either keep their PEs with a fresh slice or go to the
        // tail of the round
        let rerun = self.rerun_expired(now);
        preempted.extend(self.preempt_expired(now));
        let admitted = self.admit(now, &preempted);

        // Reset only once admission is done
        for &key in &preempted {
            self.reset(key);
        }

        // Only jobs that actually lost their PEs count as switches
        let mut swapped_out = 0;
        for &key in &preempted {
            let job = self.ctx.job_mut(key);
            if job.state == JobState::Waiting {
                job.preemptions += 1;
                swapped_out += 1;
            }
        }
        self.context_switches += swapped_out;

        // Earliest slice expiry or completion among executing jobs
        let next_wakeup = self.next_wakeup();
        self.observer.observe(&self.ctx);
        self.observer.emit(
            now,
            SchedEvent::TickEnd {
                next_wakeup,
                context_switches: self.context_switches,
            },
        );
        debug!(
            "t={now:.4} finished={} rerun={} preempted={} admitted={} switches={} next={next_wakeup:?}",
            finished.len(),
            rerun.len(),
            preempted.len(),
            admitted.len(),
            self.context_switches,
        );

        next_wakeup
    }

    fn update_job_progress(&mut self, id: JobId, now: SimTime) -> Result<f64, SchedError> {
        let key = self.ctx.key_of(id).ok_or(SchedError::UnknownJob(id))?;
        if self.ctx.job(key).state != JobState::Executing {
            return Err(SchedError::NotExecuting(id));
        }
        Ok(self.account_progress(key, now))
    }

    fn context_switch_count(&self) -> u64 {
        self.context_switches
    }

    fn ctx(&self) -> &SchedCtx {
        &self.ctx
    }

    fn observer_mut(&mut self) -> &mut Observer {
        &mut self.observer
    }
}
