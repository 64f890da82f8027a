pub mod config;
pub mod core;
pub mod error;
pub mod scheduler;
pub mod sim;

pub use config::{DrrhaConfig, SimConfig};
pub use crate::core::{JobExec, JobId, MipsShare, SchedEvent, SimTime, TraceRecord};
pub use error::{ConfigError, SchedError};
pub use scheduler::{CloudletScheduler, DrrhaScheduler, FifoScheduler};
pub use sim::{Job, Sim, SimReport};
