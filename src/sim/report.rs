use average::{Estimate, Max, Mean};
use serde::Serialize;

use super::driver::Sim;
use crate::core::state::{JobId, SimTime};
use crate::scheduler::CloudletScheduler;

#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub id: JobId,
    pub arrival_time: SimTime,
    pub start_time: Option<SimTime>,
    pub finish_time: Option<SimTime>,
    // Time to first run
    pub response_time: Option<f64>,
    pub turnaround_time: Option<f64>,
    pub preemptions: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub jobs: Vec<JobStats>,
    pub makespan: SimTime,
    pub mean_response_time: f64,
    pub mean_turnaround_time: f64,
    pub max_turnaround_time: f64,
    // Completed instructions over what the share could run in the makespan
    pub utilization: f64,
    pub context_switches: u64,
    pub steps: u64,
}

impl SimReport {
    pub fn from_sim<S: CloudletScheduler>(sim: &Sim<S>) -> Self {
        let ctx = sim.scheduler.ctx();
        let jobs: Vec<JobStats> = sim
            .jobs
            .iter()
            .map(|instance| {
                let arrival = instance.job.arrival_time;
                JobStats {
                    id: instance.job.id,
                    arrival_time: arrival,
                    start_time: instance.start_time,
                    finish_time: instance.completion_time,
                    response_time: instance.start_time.map(|t| t - arrival),
                    turnaround_time: instance.completion_time.map(|t| t - arrival),
                    preemptions: ctx
                        .job_by_id(instance.job.id)
                        .map_or(0, |job| job.preemptions),
                }
            })
            .collect();

        let makespan = jobs
            .iter()
            .filter_map(|job| job.finish_time)
            .fold(0.0, f64::max);
        let completed: f64 = sim
            .jobs
            .iter()
            .filter(|instance| instance.completion_time.is_some())
            .map(|instance| instance.job.length)
            .sum();
        let capacity = makespan * sim.share().total_mips();
        let turnaround: Vec<f64> = jobs.iter().filter_map(|job| job.turnaround_time).collect();

        Self {
            makespan,
            mean_response_time: avg(jobs.iter().filter_map(|job| job.response_time)),
            mean_turnaround_time: avg(turnaround.iter().copied()),
            max_turnaround_time: if turnaround.is_empty() {
                0.0
            } else {
                turnaround.iter().copied().collect::<Max>().max()
            },
            utilization: if capacity > 0.0 {
                completed / capacity
            } else {
                0.0
            },
            context_switches: sim.scheduler.context_switch_count(),
            steps: sim.steps(),
            jobs,
        }
    }
}

fn avg(iter: impl Iterator<Item = f64>) -> f64 {
    let mean: Mean = iter.collect();
    if mean.is_empty() {
        0.0
    } else {
        mean.estimate()
    }
}
