//! Periodic execution of the sync pipeline.
//!
//! A single job runs on a fixed, adjustable interval. Failed and panicking
//! ticks are logged and the loop carries on.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError};
pub use scheduler::{SchedulerStatus, SyncScheduler};
