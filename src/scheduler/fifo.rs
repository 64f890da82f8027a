use std::cmp::Ordering;

use super::{CloudletScheduler, validate_job};
use crate::core::base::{TimeShared, TimeSharedBase};
use crate::core::event::SchedEvent;
use crate::core::observer::Observer;
use crate::core::state::{JobExec, JobId, JobState, MipsShare, SchedCtx, SimTime};
use crate::error::SchedError;

/// Admits jobs in submission order while PEs are free and runs each one to
/// completion. Jobs only lose their PEs when the share shrinks.
#[derive(Debug)]
pub struct FifoScheduler<B: TimeSharedBase = TimeShared> {
    ctx: SchedCtx,
    base: B,
    context_switches: u64,
    observer: Observer,
}

impl FifoScheduler<TimeShared> {
    pub fn new(share: &MipsShare) -> Self {
        Self {
            ctx: SchedCtx::new(share),
            base: TimeShared::new(),
            context_switches: 0,
            observer: Observer::new(),
        }
    }
}

impl<B: TimeSharedBase> CloudletScheduler for FifoScheduler<B> {
    fn submit(&mut self, mut job: JobExec, file_transfer_time: f64) -> Result<f64, SchedError> {
        validate_job(&job)?;
        job.virtual_runtime = 0.0;
        job.time_slice = f64::INFINITY;
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

        let mips = self.ctx.mips_per_pe();
        for key in self.ctx.exec().to_vec() {
            let job = self.ctx.job_mut(key);
            self.base.update_job_processing(job, now, mips);
            if job.is_done() {
                let id = job.id;
                self.ctx.finish(key, now);
                self.observer.emit(now, SchedEvent::Finished { job: id });
            }
        }

        for key in self.ctx.shed_excess_by(|_, _| Ordering::Equal) {
            let job = self.ctx.job_mut(key);
            job.preemptions += 1;
            self.context_switches += 1;
            let event = SchedEvent::Preempted {
                job: job.id,
                virtual_runtime: job.virtual_runtime,
            };
            self.observer.emit(now, event);
        }

        for key in self.ctx.admit_fitting(now, |_| false) {
            let id = self.ctx.job(key).id;
            self.observer.emit(now, SchedEvent::Admitted { job: id });
        }

        let next_wakeup = self
            .ctx
            .exec_jobs()
            .map(|job| job.finish_delay(mips))
            .min_by(f64::total_cmp);
        self.observer.observe(&self.ctx);
        self.observer.emit(
            now,
            SchedEvent::TickEnd {
                next_wakeup,
                context_switches: self.context_switches,
            },
        );
        next_wakeup
    }

    fn update_job_progress(&mut self, id: JobId, now: SimTime) -> Result<f64, SchedError> {
        let key = self.ctx.key_of(id).ok_or(SchedError::UnknownJob(id))?;
        let mips = self.ctx.mips_per_pe();
        let job = self.ctx.job_mut(key);
        if job.state != JobState::Executing {
            return Err(SchedError::NotExecuting(id));
        }
        Ok(self.base.update_job_processing(job, now, mips))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_jobs_to_completion_in_submission_order() {
        let share = MipsShare::new(1, 100.0).unwrap();
        let mut sched = FifoScheduler::new(&share);
        sched.submit(JobExec::new(0, 500.0, 1), 0.0).unwrap();
        sched.submit(JobExec::new(1, 100.0, 1), 0.0).unwrap();

        assert_eq!(sched.tick(0.0, &share), Some(5.0));
        assert_eq!(sched.tick(5.0, &share), Some(1.0));
        assert_eq!(sched.tick(6.0, &share), None);

        let finish: Vec<_> = sched
            .ctx()
            .finished_jobs()
            .map(|job| (job.id, job.finish_time))
            .collect();
        assert_eq!(finish, vec![(0, Some(5.0)), (1, Some(6.0))]);
        assert_eq!(sched.context_switch_count(), 0);
    }

    #[test]
    fn shrinking_share_requeues_the_latest_admitted_job() {
        let share = MipsShare::new(2, 100.0).unwrap();
        let mut sched = FifoScheduler::new(&share);
        sched.submit(JobExec::new(0, 500.0, 1), 0.0).unwrap();
        sched.submit(JobExec::new(1, 500.0, 1), 0.0).unwrap();
        sched.tick(0.0, &share);

        let smaller = MipsShare::new(1, 100.0).unwrap();
        assert_eq!(sched.tick(1.0, &smaller), Some(4.0));
        let running: Vec<_> = sched.ctx().exec_jobs().map(|job| job.id).collect();
        let waiting: Vec<_> = sched.ctx().waiting_jobs().map(|job| job.id).collect();
        assert_eq!(running, vec![0]);
        assert_eq!(waiting, vec![1]);
        assert_eq!(sched.ctx().job_by_id(1).unwrap().remaining_length, 400.0);
        assert_eq!(sched.context_switch_count(), 1);
    }
}
