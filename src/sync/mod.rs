//! The sync pipeline: remote records in, store rows out.

pub mod mappers;
mod result;
mod service;

pub use result::SyncResult;
pub use service::{
    SyncOptions, SyncService, SyncStatus, ACTIVITY_FULL_TASK, ACTIVITY_INCREMENTAL_TASK,
    INITIAL_TASK, METADATA_TASK, PERIODIC_TASK,
};
