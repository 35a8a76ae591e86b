//! Periodic sync job.
//!
//! Mirrors metadata without auto-tracking, pulls activity newer than the
//! stored cursor and refreshes play statistics.

use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{BackgroundJob, JobError};
use crate::store::TaskResult;
use crate::sync::SyncService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct PeriodicSyncJob {
    service: Arc<SyncService>,
}

impl PeriodicSyncJob {
    pub fn new(service: Arc<SyncService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl BackgroundJob for PeriodicSyncJob {
    fn id(&self) -> &'static str {
        "periodic_sync"
    }

    fn name(&self) -> &'static str {
        "Periodic Sync"
    }

    fn description(&self) -> &'static str {
        "Mirror users, libraries, items and new playback activity"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let result = self.service.sync_periodic().await;
        match result.outcome {
            TaskResult::Failed => Err(JobError::ExecutionFailed(result.errors.join("; "))),
            TaskResult::Partial => {
                warn!(
                    "Periodic sync finished with {} error(s)",
                    result.errors.len()
                );
                Ok(())
            }
            _ => {
                info!(
                    "Periodic sync: {} items, {} new events",
                    result.items_synced, result.events_inserted
                );
                Ok(())
            }
        }
    }
}
