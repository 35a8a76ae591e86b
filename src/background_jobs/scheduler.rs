use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest single sleep between interval re-reads.
const SLEEP_STEP: Duration = Duration::from_millis(250);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub ticks: u64,
}

struct RunningLoop {
    shutdown_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs one job immediately on start and then once per interval until
/// stopped.
///
/// The interval may change while running; the loop picks the new value up
/// within one sleep step.
pub struct SyncScheduler {
    job: Arc<dyn BackgroundJob>,
    interval_secs: Arc<AtomicU64>,
    ticks: Arc<AtomicU64>,
    running: Mutex<Option<RunningLoop>>,
}

impl SyncScheduler {
    pub fn new(job: Arc<dyn BackgroundJob>, interval_secs: u64) -> Self {
        Self {
            job,
            interval_secs: Arc::new(AtomicU64::new(interval_secs.max(1))),
            ticks: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    /// Spawns the scheduler loop. Returns false if it was already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("Scheduler for {} already running", self.job.id());
            return false;
        }

        let shutdown_token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.job),
            Arc::clone(&self.interval_secs),
            Arc::clone(&self.ticks),
            shutdown_token.clone(),
        ));
        *running = Some(RunningLoop {
            shutdown_token,
            handle,
        });
        true
    }

    /// Cancels the loop and waits for an in-flight tick, at most 30 seconds.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().unwrap().take() else {
            return;
        };
        info!("Stopping scheduler for {}...", self.job.id());
        running.shutdown_token.cancel();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, running.handle)
            .await
            .is_err()
        {
            warn!(
                "Scheduler for {} did not stop within {:?}",
                self.job.id(),
                SHUTDOWN_TIMEOUT
            );
        }
    }

    /// Rejects non-positive values and keeps the current interval.
    pub fn set_interval(&self, secs: i64) -> Result<(), JobError> {
        if secs <= 0 {
            return Err(JobError::InvalidInterval(secs));
        }
        self.interval_secs.store(secs as u64, Ordering::SeqCst);
        info!("Sync interval set to {}s", secs);
        Ok(())
    }

    pub fn status(&self) -> SchedulerStatus {
        let running = self
            .running
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished());
        SchedulerStatus {
            running,
            interval_secs: self.interval_secs.load(Ordering::SeqCst),
            ticks: self.ticks.load(Ordering::SeqCst),
        }
    }
}

async fn run_loop(
    job: Arc<dyn BackgroundJob>,
    interval_secs: Arc<AtomicU64>,
    ticks: Arc<AtomicU64>,
    shutdown_token: CancellationToken,
) {
    info!(
        "Starting scheduler for {} every {}s",
        job.id(),
        interval_secs.load(Ordering::SeqCst)
    );

    loop {
        run_tick(&job, &shutdown_token).await;
        ticks.fetch_add(1, Ordering::SeqCst);

        if !sleep_until_next_tick(&interval_secs, &shutdown_token).await {
            break;
        }
    }

    info!("Scheduler for {} stopped", job.id());
}

/// Runs the job in its own task so a panic is contained to this tick.
async fn run_tick(job: &Arc<dyn BackgroundJob>, shutdown_token: &CancellationToken) {
    let ctx = JobContext::new(shutdown_token.child_token());
    let task_job = Arc::clone(job);
    let start_time = Instant::now();

    let result = tokio::spawn(async move { task_job.execute(&ctx).await }).await;
    let elapsed = start_time.elapsed();

    match result {
        Ok(Ok(())) => debug!("Job {} completed in {:?}", job.id(), elapsed),
        Ok(Err(JobError::Cancelled)) => info!("Job {} was cancelled after {:?}", job.id(), elapsed),
        Ok(Err(e)) => error!("Job {} failed after {:?}: {}", job.id(), elapsed, e),
        Err(e) => error!("Job {} panicked after {:?}: {}", job.id(), elapsed, e),
    }
}

/// Returns false when shutdown was requested while sleeping.
async fn sleep_until_next_tick(
    interval_secs: &AtomicU64,
    shutdown_token: &CancellationToken,
) -> bool {
    let slept_since = Instant::now();
    loop {
        let interval = Duration::from_secs(interval_secs.load(Ordering::SeqCst));
        let elapsed = slept_since.elapsed();
        if elapsed >= interval {
            return true;
        }

        let step = (interval - elapsed).min(SLEEP_STEP);
        tokio::select! {
            _ = tokio::time::sleep(step) => {}
            _ = shutdown_token.cancelled() => return false,
        }
    }
}
