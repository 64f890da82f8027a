use crate::core::state::{JobExec, JobId, SimTime};

/// A job as described by a workload, before submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub arrival_time: SimTime,
    // Millions of instructions
    pub length: f64,
    pub pes: usize,
    pub file_transfer_time: f64,
}

impl Job {
    pub fn new(id: JobId, arrival_time: SimTime, length: f64, pes: usize) -> Self {
        Self {
            id,
            arrival_time,
            length,
            pes,
            file_transfer_time: 0.0,
        }
    }

    pub fn to_exec(&self) -> JobExec {
        JobExec::new(self.id, self.length, self.pes).arriving_at(self.arrival_time)
    }
}

#[derive(Debug, Clone)]
pub struct JobInstance {
    pub job: Job,
    pub start_time: Option<SimTime>,
    pub completion_time: Option<SimTime>,
}
