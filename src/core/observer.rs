use log::trace;
use rustc_hash::FxHashSet;
use std::fmt;

use super::event::{SchedEvent, TraceRecord};
use super::state::{JobState, SchedCtx, SimTime};

/// Receives every scheduler event as it happens.
pub trait TraceSink {
    fn record(&mut self, time: SimTime, event: &SchedEvent);
}

impl<F> TraceSink for F
where
    F: FnMut(SimTime, &SchedEvent),
{
    fn record(&mut self, time: SimTime, event: &SchedEvent) {
        self(time, event)
    }
}

/// Forwards scheduler events to an optional sink and checks container
/// invariants after every tick.
#[derive(Default)]
pub struct Observer {
    step: u64,
    records: Option<Vec<TraceRecord>>,
    sink: Option<Box<dyn TraceSink>>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("step", &self.step)
            .field("recording", &self.records.is_some())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.sink = Some(sink);
    }

    /// Keep a copy of every event until `take_records` is called.
    pub fn enable_recording(&mut self) {
        self.records.get_or_insert_with(Vec::new);
    }

    pub fn take_records(&mut self) -> Vec<TraceRecord> {
        self.records.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn emit(&mut self, time: SimTime, event: SchedEvent) {
        trace!("[{}] t={time:.4} {event:?}", self.step);
        if let Some(sink) = self.sink.as_mut() {
            sink.record(time, &event);
        }
        if let Some(records) = self.records.as_mut() {
            records.push(TraceRecord { time, event });
        }
    }

    pub fn observe(&mut self, ctx: &SchedCtx) {
        self.step += 1;

        let mut seen = FxHashSet::default();
        let lists = [
            (ctx.waiting(), JobState::Waiting),
            (ctx.exec(), JobState::Executing),
            (ctx.finished(), JobState::Finished),
        ];
        for (keys, state) in lists {
            for &key in keys {
                let job = ctx.job(key);
                debug_assert!(seen.insert(key), "Job {} present in two lists", job.id);
                debug_assert_eq!(
                    job.state, state,
                    "Job {} metadata state does not match its list",
                    job.id
                );
                debug_assert!(
                    job.remaining_length >= 0.0,
                    "Job {} has negative remaining length",
                    job.id
                );
                debug_assert_eq!(
                    job.finish_time.is_some(),
                    state == JobState::Finished,
                    "Job {} finish time out of sync with its state",
                    job.id
                );
            }
        }
        debug_assert_eq!(
            seen.len(),
            ctx.jobs().count(),
            "Some jobs are in no list at all"
        );
        debug_assert!(
            ctx.used_pes() <= ctx.total_pes(),
            "Exec list uses {} PEs but only {} exist",
            ctx.used_pes(),
            ctx.total_pes()
        );
    }
}
