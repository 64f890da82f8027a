use serde::Serialize;

use super::state::{JobId, SimTime};

/// Points in a scheduler's life at which a trace sink is notified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedEvent {
    Submitted {
        job: JobId,
        virtual_runtime: f64,
        time_slice: f64,
    },
    TickStart {
        executing: usize,
        waiting: usize,
    },
    Admitted {
        job: JobId,
    },
    // Slice expired but the job keeps its PEs
    Rerun {
        job: JobId,
        time_slice: f64,
    },
    Preempted {
        job: JobId,
        virtual_runtime: f64,
    },
    Finished {
        job: JobId,
    },
    TickEnd {
        next_wakeup: Option<f64>,
        context_switches: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub time: SimTime,
    pub event: SchedEvent,
}
