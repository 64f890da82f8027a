use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{SlotMap, new_key_type};
use std::cmp::Ordering;

use crate::error::SchedError;

pub type JobId = u64;
// Simulated seconds
pub type SimTime = f64;

new_key_type! {
    pub struct JobKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Executing,
    Finished,
}

/// Execution record of a submitted job.
///
/// Lengths are in millions of instructions (MI), times in simulated seconds.
#[derive(Debug, Clone)]
pub struct JobExec {
    pub id: JobId,
    pub state: JobState,
    pub pes: usize,
    pub length: f64,
    pub remaining_length: f64,
    pub arrival_time: SimTime,
    pub last_progress_time: SimTime,
    // Negative until the job first runs
    pub virtual_runtime: f64,
    pub time_slice: f64,
    pub file_transfer_time: f64,
    pub first_start_time: Option<SimTime>,
    pub finish_time: Option<SimTime>,
    pub preemptions: u32,
}

impl JobExec {
    pub fn new(id: JobId, length: f64, pes: usize) -> Self {
        Self {
            id,
            state: JobState::Waiting,
            pes,
            length,
            remaining_length: length,
            arrival_time: 0.0,
            last_progress_time: 0.0,
            virtual_runtime: 0.0,
            time_slice: 0.0,
            file_transfer_time: 0.0,
            first_start_time: None,
            finish_time: None,
            preemptions: 0,
        }
    }

    pub fn arriving_at(mut self, time: SimTime) -> Self {
        self.arrival_time = time;
        self.last_progress_time = time;
        self
    }

    pub fn is_done(&self) -> bool {
        self.remaining_length <= 0.0
    }

    /// Seconds until the job completes if it keeps all its PEs at `mips_per_pe`.
    pub fn finish_delay(&self, mips_per_pe: f64) -> f64 {
        self.remaining_length / (mips_per_pe * self.pes as f64)
    }
}

/// PE capacity and per-PE speed granted to a scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MipsShare {
    pes: usize,
    mips_per_pe: f64,
}

impl MipsShare {
    pub fn new(pes: usize, mips_per_pe: f64) -> Result<Self, SchedError> {
        if pes == 0 {
            return Err(SchedError::InvalidShare("at least one PE is required"));
        }
        if !(mips_per_pe.is_finite() && mips_per_pe > 0.0) {
            return Err(SchedError::InvalidShare("MIPS per PE must be positive"));
        }
        Ok(Self { pes, mips_per_pe })
    }

    pub fn pes(&self) -> usize {
        self.pes
    }

    pub fn mips_per_pe(&self) -> f64 {
        self.mips_per_pe
    }

    pub fn total_mips(&self) -> f64 {
        self.mips_per_pe * self.pes as f64
    }
}

/// Job table plus the waiting / executing / finished containers.
///
/// Containers hold `JobKey` handles; a job's handle lives in exactly one of
/// them and `JobExec::state` names which.
#[derive(Debug)]
pub struct SchedCtx {
    pub now: SimTime,
    total_pes: usize,
    mips_per_pe: f64,
    jobs: SlotMap<JobKey, JobExec>,
    ids: FxHashMap<JobId, JobKey>,
    waiting: Vec<JobKey>,
    exec: Vec<JobKey>,
    finished: Vec<JobKey>,
}

impl SchedCtx {
    pub fn new(share: &MipsShare) -> Self {
        Self {
            now: 0.0,
            total_pes: share.pes(),
            mips_per_pe: share.mips_per_pe(),
            jobs: SlotMap::with_key(),
            ids: FxHashMap::default(),
            waiting: Vec::new(),
            exec: Vec::new(),
            finished: Vec::new(),
        }
    }

    pub fn set_share(&mut self, share: &MipsShare) {
        self.total_pes = share.pes();
        self.mips_per_pe = share.mips_per_pe();
    }

    pub fn advance_to(&mut self, now: SimTime) {
        debug_assert!(
            now >= self.now,
            "Clock moved backwards from {} to {now}",
            self.now
        );
        self.now = now;
    }

    /// Add a new job to the tail of the waiting list.
    pub fn insert_waiting(&mut self, mut job: JobExec) -> Result<JobKey, SchedError> {
        self.check_new_id(job.id)?;

        job.state = JobState::Waiting;
        let id = job.id;
        let key = self.jobs.insert(job);
        self.ids.insert(id, key);
        self.waiting.push(key);
        Ok(key)
    }

    /// Reject ids that are already waiting, executing or finished.
    pub fn check_new_id(&self, id: JobId) -> Result<(), SchedError> {
        match self.key_of(id).map(|key| self.jobs[key].state) {
            None => Ok(()),
            Some(JobState::Finished) => Err(SchedError::AlreadyFinished(id)),
            Some(_) => Err(SchedError::DuplicateJob(id)),
        }
    }

    pub fn key_of(&self, id: JobId) -> Option<JobKey> {
        self.ids.get(&id).copied()
    }

    pub fn job(&self, key: JobKey) -> &JobExec {
        &self.jobs[key]
    }

    pub fn job_mut(&mut self, key: JobKey) -> &mut JobExec {
        &mut self.jobs[key]
    }

    pub fn job_by_id(&self, id: JobId) -> Option<&JobExec> {
        self.key_of(id).map(|key| &self.jobs[key])
    }

    pub fn jobs(&self) -> impl Iterator<Item = (JobKey, &JobExec)> {
        self.jobs.iter()
    }

    pub fn waiting(&self) -> &[JobKey] {
        &self.waiting
    }

    pub fn exec(&self) -> &[JobKey] {
        &self.exec
    }

    pub fn finished(&self) -> &[JobKey] {
        &self.finished
    }

    pub fn waiting_jobs(&self) -> impl Iterator<Item = &JobExec> {
        self.waiting.iter().map(|&key| &self.jobs[key])
    }

    pub fn exec_jobs(&self) -> impl Iterator<Item = &JobExec> {
        self.exec.iter().map(|&key| &self.jobs[key])
    }

    pub fn finished_jobs(&self) -> impl Iterator<Item = &JobExec> {
        self.finished.iter().map(|&key| &self.jobs[key])
    }

    pub fn total_pes(&self) -> usize {
        self.total_pes
    }

    pub fn mips_per_pe(&self) -> f64 {
        self.mips_per_pe
    }

    pub fn used_pes(&self) -> usize {
        self.exec_jobs().map(|job| job.pes).sum()
    }

    pub fn free_pes(&self) -> usize {
        self.total_pes.saturating_sub(self.used_pes())
    }

    pub fn has_free_pes_for(&self, job: &JobExec) -> bool {
        self.free_pes() >= job.pes
    }

    fn remove_from_exec(&mut self, key: JobKey) {
        let pos = self
            .exec
            .iter()
            .position(|&k| k == key)
            .expect("Job missing from exec list");
        self.exec.remove(pos);
    }

    /// Move an executing job to the finished list and stamp its finish time.
    pub fn finish(&mut self, key: JobKey, now: SimTime) {
        debug_assert_eq!(
            self.jobs[key].state,
            JobState::Executing,
            "Job {} must be executing before it finishes",
            self.jobs[key].id
        );
        self.remove_from_exec(key);

        let job = &mut self.jobs[key];
        debug_assert!(job.finish_time.is_none(), "Job {} finished twice", job.id);
        job.state = JobState::Finished;
        job.remaining_length = 0.0;
        job.finish_time = Some(now);
        self.finished.push(key);
    }

    /// Move an executing job to the tail of the waiting list.
    pub fn move_to_waiting(&mut self, key: JobKey) {
        debug_assert_eq!(
            self.jobs[key].state,
            JobState::Executing,
            "Only executing jobs can be requeued"
        );
        self.remove_from_exec(key);
        self.jobs[key].state = JobState::Waiting;
        self.waiting.push(key);
    }

    pub fn sort_waiting_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&JobExec, &JobExec) -> Ordering,
    {
        let jobs = &self.jobs;
        self.waiting.sort_by(|&a, &b| compare(&jobs[a], &jobs[b]));
    }

    /// Walk the waiting list in order and move every job that fits the free
    /// PEs into the exec list, skipping keys for which `skip` holds.
    ///
    /// Returns the admitted keys in admission order.
    pub fn admit_fitting<F>(&mut self, now: SimTime, skip: F) -> Vec<JobKey>
    where
        F: Fn(JobKey) -> bool,
    {
        let mut free = self.free_pes();
        let mut admitted = Vec::new();
        for &key in &self.waiting {
            if free == 0 {
                break;
            }
            if skip(key) {
                continue;
            }
            let pes = self.jobs[key].pes;
            if pes <= free {
                free -= pes;
                admitted.push(key);
            }
        }

        if admitted.is_empty() {
            return admitted;
        }

        let moved: FxHashSet<JobKey> = admitted.iter().copied().collect();
        self.waiting.retain(|key| !moved.contains(key));
        for &key in &admitted {
            let job = &mut self.jobs[key];
            job.state = JobState::Executing;
            job.last_progress_time = now;
            job.first_start_time.get_or_insert(now);
            self.exec.push(key);
        }

        admitted
    }

    /// Requeue executing jobs until the exec list fits the PE capacity again.
    /// Victims are taken from the end of the exec list once ordered by
    /// `compare`; ties keep admission order, so the latest admitted go first.
    ///
    /// Returns the requeued keys.
    pub fn shed_excess_by<F>(&mut self, mut compare: F) -> Vec<JobKey>
    where
        F: FnMut(&JobExec, &JobExec) -> Ordering,
    {
        if self.used_pes() <= self.total_pes {
            return Vec::new();
        }

        let mut ordered = self.exec.clone();
        let jobs = &self.jobs;
        ordered.sort_by(|&a, &b| compare(&jobs[a], &jobs[b]));

        let mut shed = Vec::new();
        while self.used_pes() > self.total_pes {
            let Some(key) = ordered.pop() else {
                break;
            };
            self.move_to_waiting(key);
            shed.push(key);
        }
        shed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pes: usize) -> SchedCtx {
        SchedCtx::new(&MipsShare::new(pes, 100.0).unwrap())
    }

    #[test]
    fn share_rejects_degenerate_capacity() {
        assert!(MipsShare::new(0, 100.0).is_err());
        assert!(MipsShare::new(1, 0.0).is_err());
        assert!(MipsShare::new(1, f64::NAN).is_err());
        assert_eq!(MipsShare::new(4, 250.0).unwrap().total_mips(), 1000.0);
    }

    #[test]
    fn duplicate_and_finished_ids_are_rejected() {
        let mut ctx = ctx(1);
        ctx.insert_waiting(JobExec::new(7, 100.0, 1)).unwrap();
        assert_eq!(
            ctx.insert_waiting(JobExec::new(7, 100.0, 1)),
            Err(SchedError::DuplicateJob(7))
        );

        let admitted = ctx.admit_fitting(0.0, |_| false);
        ctx.finish(admitted[0], 1.0);
        assert_eq!(
            ctx.insert_waiting(JobExec::new(7, 100.0, 1)),
            Err(SchedError::AlreadyFinished(7))
        );
    }

    #[test]
    fn admission_skips_jobs_that_do_not_fit() {
        let mut ctx = ctx(3);
        let wide = ctx.insert_waiting(JobExec::new(0, 100.0, 2)).unwrap();
        let wider = ctx.insert_waiting(JobExec::new(1, 100.0, 2)).unwrap();
        let narrow = ctx.insert_waiting(JobExec::new(2, 100.0, 1)).unwrap();

        let admitted = ctx.admit_fitting(4.0, |_| false);
        assert_eq!(admitted, vec![wide, narrow]);
        assert_eq!(ctx.waiting(), &[wider]);
        assert_eq!(ctx.free_pes(), 0);
        assert_eq!(ctx.job(narrow).first_start_time, Some(4.0));
        assert_eq!(ctx.job(narrow).last_progress_time, 4.0);
    }

    #[test]
    fn requeue_and_finish_move_handles() {
        let mut ctx = ctx(2);
        let a = ctx.insert_waiting(JobExec::new(0, 100.0, 1)).unwrap();
        let b = ctx.insert_waiting(JobExec::new(1, 100.0, 1)).unwrap();
        ctx.admit_fitting(0.0, |_| false);

        ctx.move_to_waiting(a);
        ctx.finish(b, 2.5);

        assert_eq!(ctx.waiting(), &[a]);
        assert!(ctx.exec().is_empty());
        assert_eq!(ctx.finished(), &[b]);
        assert_eq!(ctx.job(a).state, JobState::Waiting);
        assert_eq!(ctx.job(b).finish_time, Some(2.5));
    }

    #[test]
    fn shrinking_capacity_sheds_latest_admitted_first() {
        let mut ctx = ctx(3);
        let a = ctx.insert_waiting(JobExec::new(0, 100.0, 1)).unwrap();
        let b = ctx.insert_waiting(JobExec::new(1, 100.0, 1)).unwrap();
        let c = ctx.insert_waiting(JobExec::new(2, 100.0, 1)).unwrap();
        ctx.admit_fitting(0.0, |_| false);
        assert!(ctx.shed_excess_by(|_, _| Ordering::Equal).is_empty());

        ctx.set_share(&MipsShare::new(1, 100.0).unwrap());
        let shed = ctx.shed_excess_by(|_, _| Ordering::Equal);
        assert_eq!(shed, vec![c, b]);
        assert_eq!(ctx.exec(), &[a]);
        assert_eq!(ctx.waiting(), &[c, b]);
        assert_eq!(ctx.used_pes(), 1);
    }
}
