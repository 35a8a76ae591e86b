use tokio_util::sync::CancellationToken;

/// Context handed to a job for one execution.
#[derive(Clone)]
pub struct JobContext {
    /// Cancelled when the scheduler stops.
    pub cancellation_token: CancellationToken,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
