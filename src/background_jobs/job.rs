use super::context::JobContext;
use async_trait::async_trait;

/// Errors that can occur while scheduling or running a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    ExecutionFailed(String),
    Cancelled,
    InvalidInterval(i64),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
            JobError::InvalidInterval(secs) => {
                write!(f, "Invalid interval: {} seconds (must be positive)", secs)
            }
        }
    }
}

impl std::error::Error for JobError {}

/// Work the scheduler runs on every tick.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Runs the job once. Long jobs should check `ctx.is_cancelled()` and
    /// return [`JobError::Cancelled`] early.
    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
