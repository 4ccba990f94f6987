//! Error taxonomy.
//!
//! Only [`TriageError`] ever reaches a caller of the triage path. Service and
//! parse failures are absorbed by the pipeline stages that consume them and
//! turn into degraded output instead.

use std::time::Duration;
use thiserror::Error;

/// Failure of an external service call (generation, search or scoring).
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed service response: {0}")]
    MalformedResponse(String),
}

impl ServiceError {
    /// Timeouts, transport failures, throttling and server errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Timeout(_) | ServiceError::Unavailable(_) => true,
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            ServiceError::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout(Duration::ZERO)
        } else if let Some(status) = e.status() {
            ServiceError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else if e.is_decode() {
            ServiceError::MalformedResponse(e.to_string())
        } else {
            ServiceError::Unavailable(e.to_string())
        }
    }
}

/// Failure to read a structured payload out of model output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unrecognized decision label: {0}")]
    UnknownDecision(String),
}

/// Why a single decision sample produced no candidate.
#[derive(Debug, Clone, Error)]
pub enum SampleError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Hard failures of a triage request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriageError {
    #[error("current symptoms are required")]
    MissingSymptoms,
}
