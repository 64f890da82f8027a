use drrha_model::core::JobState;
use drrha_model::{
    CloudletScheduler, DrrhaConfig, DrrhaScheduler, JobExec, MipsShare, SchedEvent,
};

fn share() -> MipsShare {
    MipsShare::new(1, 100.0).unwrap()
}

fn drrha() -> DrrhaScheduler {
    DrrhaScheduler::new(&share(), &DrrhaConfig::default())
}

fn state_of(sched: &DrrhaScheduler, id: u64) -> JobState {
    sched.ctx().job_by_id(id).unwrap().state
}

/// Tick at every requested wake-up until nothing executes.
fn drive(sched: &mut DrrhaScheduler, mut now: f64) -> f64 {
    while let Some(delay) = sched.tick(now, &share()) {
        now += delay;
    }
    now
}

#[test]
fn solo_job_runs_to_completion_without_switches() {
    let mut sched = drrha();
    sched.observer_mut().enable_recording();
    sched.submit(JobExec::new(0, 1000.0, 1), 0.0).unwrap();
    assert_eq!(sched.ctx().job_by_id(0).unwrap().time_slice, 5.5);

    assert_eq!(sched.tick(0.0, &share()), Some(5.5));
    assert_eq!(state_of(&sched, 0), JobState::Executing);

    // Slice expires with 4.5 s of work left and nobody waiting
    sched.tick(5.5, &share());
    assert_eq!(state_of(&sched, 0), JobState::Executing);
    assert_eq!(sched.ctx().job_by_id(0).unwrap().remaining_length, 450.0);

    let end = drive(&mut sched, 5.5 + 2.75);
    assert_eq!(end, 10.0);

    let job = sched.ctx().job_by_id(0).unwrap();
    assert_eq!(job.state, JobState::Finished);
    assert_eq!(job.finish_time, Some(10.0));
    assert_eq!(job.preemptions, 0);
    assert_eq!(sched.context_switch_count(), 0);

    let records = sched.observer_mut().take_records();
    assert!(!records
        .iter()
        .any(|r| matches!(r.event, SchedEvent::Preempted { .. })));
}

#[test]
fn contention_swaps_jobs_when_slice_expires() {
    let mut sched = drrha();
    sched.submit(JobExec::new(0, 1000.0, 1), 0.0).unwrap();
    sched.submit(JobExec::new(1, 1000.0, 1), 0.0).unwrap();

    assert_eq!(sched.tick(0.0, &share()), Some(5.5));
    assert_eq!(state_of(&sched, 0), JobState::Executing);
    assert_eq!(state_of(&sched, 1), JobState::Waiting);
    assert_eq!(sched.context_switch_count(), 0);

    sched.tick(5.5, &share());
    assert_eq!(state_of(&sched, 0), JobState::Waiting);
    assert_eq!(state_of(&sched, 1), JobState::Executing);
    assert_eq!(sched.context_switch_count(), 1);

    let preempted = sched.ctx().job_by_id(0).unwrap();
    assert!(preempted.virtual_runtime < 0.0);
    assert_eq!(preempted.time_slice, 2.75);
    assert_eq!(preempted.preemptions, 1);
}

#[test]
fn contention_finishes_both_jobs() {
    let mut sched = drrha();
    sched.submit(JobExec::new(0, 1000.0, 1), 0.0).unwrap();
    sched.submit(JobExec::new(1, 1000.0, 1), 0.0).unwrap();

    let end = drive(&mut sched, 0.0);
    assert_eq!(end, 20.0);

    let finish: Vec<_> = sched
        .ctx()
        .finished_jobs()
        .map(|job| (job.id, job.finish_time))
        .collect();
    assert_eq!(finish, vec![(0, Some(15.5)), (1, Some(20.0))]);
    assert_eq!(sched.context_switch_count(), 2);
}

#[test]
fn repeated_tick_at_same_time_changes_nothing() {
    let mut sched = drrha();
    for id in 0..3 {
        sched
            .submit(JobExec::new(id, 1000.0 * (id + 1) as f64, 1), 0.0)
            .unwrap();
    }

    let snapshot = |sched: &DrrhaScheduler| {
        let mut jobs: Vec<_> = sched
            .ctx()
            .jobs()
            .map(|(_, job)| (job.id, job.state, job.virtual_runtime, job.time_slice))
            .collect();
        jobs.sort_by_key(|job| job.0);
        (jobs, sched.ctx().waiting().to_vec(), sched.context_switch_count())
    };

    for now in [0.0, 5.5] {
        let first = sched.tick(now, &share());
        let before = snapshot(&sched);
        let second = sched.tick(now, &share());
        assert_eq!(first, second);
        assert_eq!(before, snapshot(&sched));
    }
}

#[test]
fn rerun_keeps_pes_when_fresh_slice_covers_the_rest() {
    let mut sched = drrha();
    sched.submit(JobExec::new(0, 1000.0, 1), 0.0).unwrap();
    sched.submit(JobExec::new(1, 1000.0, 1), 0.0).unwrap();
    drive_until(&mut sched, 13.75);

    // Job 0 has 1.75 s left and a fresh slice of about 2.46 s
    assert_eq!(state_of(&sched, 0), JobState::Executing);
    let job = sched.ctx().job_by_id(0).unwrap();
    assert!(job.virtual_runtime < 0.0);
    assert!(job.time_slice > 1.75);
    assert_eq!(sched.context_switch_count(), 2);
}

fn drive_until(sched: &mut DrrhaScheduler, until: f64) {
    let mut now = 0.0;
    while now <= until {
        match sched.tick(now, &share()) {
            Some(delay) => now += delay,
            None => break,
        }
    }
}
