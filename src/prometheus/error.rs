use serde::Serialize;
use thiserror::Error;

/// Failures talking to the metrics backend
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The request could not be formed (bad base URL, bad parameters)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection refused, DNS failure, timeout
    #[error("cannot reach metrics backend: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-2xx response without a backend error envelope
    #[error("metrics backend returned HTTP {status}")]
    Http { status: u16 },

    /// The body did not match the expected schema
    #[error("failed to decode backend response: {0}")]
    Decode(String),

    /// The backend answered with `"status": "error"`
    #[error("backend query error ({error_type}): {message}")]
    Query { error_type: String, message: String },
}

/// Discriminant of [`MetricsError`] for callers that branch on the failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Transport,
    HttpStatus,
    Decode,
    Query,
}

impl MetricsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricsError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            MetricsError::Transport(_) => ErrorKind::Transport,
            MetricsError::Http { .. } => ErrorKind::HttpStatus,
            MetricsError::Decode(_) => ErrorKind::Decode,
            MetricsError::Query { .. } => ErrorKind::Query,
        }
    }

    /// True when the backend could not be reached at all
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() {
            MetricsError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            MetricsError::Decode(err.to_string())
        } else {
            MetricsError::Transport(err)
        }
    }
}
