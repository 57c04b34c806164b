//! Background probe and thumbnail jobs.

mod queue;
mod runner;

pub use queue::{drain_workers, Cancelled, JobControl, JobKey, JobStarter, WorkQueue};
pub use runner::{JobEvent, JobOutcome, TokioStarter};
