use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a single remote operation, after any retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Host, port or token missing or malformed. No request was sent.
    #[error("Missing or invalid host/port/token in settings: {0}")]
    NotConfigured(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection refused, timeout, or the request never completed.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ApiError>,
    },
}

/// HTTP statuses worth another attempt.
const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

impl ApiError {
    /// HTTP status of the failure, 0 when none was received.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Http { status, .. } => *status,
            ApiError::RetriesExhausted { last, .. } => last.status(),
            _ => 0,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => TRANSIENT_STATUSES.contains(status),
            ApiError::Network(_) => true,
            _ => false,
        }
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, ApiError::NotConfigured(_))
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
