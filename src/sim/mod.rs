pub mod driver;
pub mod job;
pub mod report;

pub use driver::Sim;
pub use job::{Job, JobInstance};
pub use report::{JobStats, SimReport};
