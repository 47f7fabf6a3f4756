use crate::limiter::TaskAborted;
use crate::orchestrator::BatchReport;
use crate::submission::SubmissionKind;
use http::StatusCode;
use shared::http::ErrorEnvelope;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by calls to the school API.
///
/// Built once at the HTTP boundary. Conflict classification only looks at
/// [`ApiError::http_status`] and [`ApiError::server_code`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{endpoint} returned {status}{}", detail_suffix(.code, .detail))]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        code: Option<String>,
        detail: Option<String>,
    },

    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode {endpoint} response: {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    TaskAborted(#[from] TaskAborted),
}

impl ApiError {
    pub fn from_envelope(endpoint: &'static str, status: StatusCode, envelope: ErrorEnvelope) -> Self {
        ApiError::Status {
            endpoint,
            status,
            code: envelope.code,
            detail: envelope.detail,
        }
    }

    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn server_code(&self) -> Option<&str> {
        match self {
            ApiError::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

fn detail_suffix(code: &Option<String>, detail: &Option<String>) -> String {
    match (code, detail) {
        (Some(code), Some(detail)) => format!(" ({code}: {detail})"),
        (Some(code), None) => format!(" ({code})"),
        (None, Some(detail)) => format!(" ({detail})"),
        (None, None) => String::new(),
    }
}

/// A submission that did not fully succeed.
///
/// Both variants carry the complete report so callers can map each outcome
/// back onto its roster row.
#[derive(Error, Debug)]
pub enum SubmitError<R: std::fmt::Debug> {
    #[error("{failed} of {total} {kind} records could not be saved")]
    RecordFailures {
        kind: SubmissionKind,
        failed: usize,
        total: usize,
        report: Box<BatchReport<R>>,
    },

    /// Per-record writes ran (and may be persisted) but the section was not
    /// finalized. Retrying only the finalize call is safe.
    #[error("{kind} records were saved but the submission could not be finalized")]
    Finalize {
        kind: SubmissionKind,
        #[source]
        source: Arc<ApiError>,
        report: Box<BatchReport<R>>,
    },
}

impl<R: std::fmt::Debug> SubmitError<R> {
    pub fn report(&self) -> &BatchReport<R> {
        match self {
            SubmitError::RecordFailures { report, .. } | SubmitError::Finalize { report, .. } => {
                report
            }
        }
    }

    pub fn into_report(self) -> BatchReport<R> {
        match self {
            SubmitError::RecordFailures { report, .. } | SubmitError::Finalize { report, .. } => {
                *report
            }
        }
    }
}
