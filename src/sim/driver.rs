use keyed_priority_queue::KeyedPriorityQueue;
use log::info;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use super::job::{Job, JobInstance};
use super::report::SimReport;
use crate::{
    config::SimConfig,
    core::{
        event::TraceRecord,
        state::{JobId, MipsShare, SimTime},
    },
    error::SchedError,
    scheduler::CloudletScheduler,
};

#[derive(Debug, Clone, Copy)]
struct Arrival {
    time: SimTime,
    id: JobId,
}

// KeyedPriorityQueue is a max-heap, so earlier (then lower-id) arrivals must
// compare greater
impl Ord for Arrival {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Arrival {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Arrival {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Arrival {}

/// Discrete-event clock around a scheduler: ticks at every arrival and at
/// every wake-up the scheduler asks for.
pub struct Sim<S: CloudletScheduler> {
    pub scheduler: S,
    pub jobs: Vec<JobInstance>,
    share: MipsShare,
    min_time_between_events: f64,
    max_steps: u64,
    pending: KeyedPriorityQueue<JobId, Arrival>,
    // JobId --> jobs[index]; used to copy start and finish times back
    jobs_index: FxHashMap<JobId, usize>,
    now: SimTime,
    next_wakeup: Option<SimTime>,
    steps: u64,
}

impl<S: CloudletScheduler> Sim<S> {
    pub fn new(mut scheduler: S, mut jobs: Vec<Job>, config: &SimConfig) -> Result<Self, SchedError> {
        let share = config.share()?;
        for job in &jobs {
            if !(job.arrival_time.is_finite() && job.arrival_time >= 0.0) {
                return Err(SchedError::InvalidJob {
                    id: job.id,
                    reason: "arrival time must be a non-negative number",
                });
            }
            if job.pes > share.pes() {
                return Err(SchedError::JobTooWide {
                    id: job.id,
                    pes: job.pes,
                    total: share.pes(),
                });
            }
        }

        jobs.sort_by(|a, b| {
            a.arrival_time
                .total_cmp(&b.arrival_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut pending = KeyedPriorityQueue::new();
        let mut jobs_index = FxHashMap::default();
        for (index, job) in jobs.iter().enumerate() {
            if jobs_index.insert(job.id, index).is_some() {
                return Err(SchedError::DuplicateJob(job.id));
            }
            pending.push(
                job.id,
                Arrival {
                    time: job.arrival_time,
                    id: job.id,
                },
            );
        }

        let jobs = jobs
            .into_iter()
            .map(|job| JobInstance {
                job,
                start_time: None,
                completion_time: None,
            })
            .collect();

        scheduler.observer_mut().enable_recording();
        Ok(Self {
            scheduler,
            jobs,
            share,
            min_time_between_events: config.min_time_between_events,
            max_steps: config.max_steps,
            pending,
            jobs_index,
            now: 0.0,
            next_wakeup: None,
            steps: 0,
        })
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn share(&self) -> &MipsShare {
        &self.share
    }

    pub fn next_event_time(&self) -> Option<SimTime> {
        let arrival = self.pending.peek().map(|(_, arrival)| arrival.time);
        match (arrival, self.next_wakeup) {
            (Some(arrival), Some(wakeup)) => Some(arrival.min(wakeup)),
            (arrival, wakeup) => arrival.or(wakeup),
        }
    }

    /// Advance to the next event. Returns the scheduler events it produced.
    pub fn step(&mut self) -> Result<Vec<TraceRecord>, SchedError> {
        let Some(now) = self.next_event_time() else {
            return Ok(Vec::new());
        };
        self.now = now;
        self.steps += 1;

        self.handle_arrivals(now)?;
        let delay = self.scheduler.tick(now, &self.share);
        self.next_wakeup = delay.map(|delay| now + delay.max(self.min_time_between_events));
        self.sync_jobs();

        Ok(self.scheduler.observer_mut().take_records())
    }

    fn handle_arrivals(&mut self, now: SimTime) -> Result<(), SchedError> {
        while let Some((_, arrival)) = self.pending.peek() {
            if arrival.time > now {
                break;
            }
            let Some((id, _)) = self.pending.pop() else {
                break;
            };
            let job = &self.jobs[self.jobs_index[&id]].job;
            self.scheduler.submit(job.to_exec(), job.file_transfer_time)?;
        }
        Ok(())
    }

    fn sync_jobs(&mut self) {
        let ctx = self.scheduler.ctx();
        for instance in self.jobs.iter_mut().filter(|j| j.completion_time.is_none()) {
            if let Some(job) = ctx.job_by_id(instance.job.id) {
                instance.start_time = job.first_start_time;
                instance.completion_time = job.finish_time;
            }
        }
    }

    pub fn all_jobs_completed(&self) -> bool {
        self.jobs.iter().all(|job| job.completion_time.is_some())
    }

    pub fn unfinished_jobs(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.completion_time.is_none())
            .count()
    }

    /// Step until every job has completed.
    pub fn run(&mut self) -> Result<SimReport, SchedError> {
        while !self.all_jobs_completed() {
            if self.steps >= self.max_steps {
                return Err(SchedError::StepLimitExceeded(self.max_steps));
            }
            if self.next_event_time().is_none() {
                return Err(SchedError::Stalled(self.unfinished_jobs()));
            }
            self.step()?;
        }

        let report = SimReport::from_sim(self);
        info!(
            "{} jobs done at t={:.3} after {} steps, {} context switches",
            report.jobs.len(),
            report.makespan,
            self.steps,
            report.context_switches
        );
        Ok(report)
    }
}
