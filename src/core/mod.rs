pub mod base;
pub mod event;
pub mod observer;
pub mod state;

pub use base::{TimeShared, TimeSharedBase};
pub use event::{SchedEvent, TraceRecord};
pub use observer::{Observer, TraceSink};
pub use state::{JobExec, JobId, JobKey, JobState, MipsShare, SchedCtx, SimTime};
