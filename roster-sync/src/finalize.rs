//! The decision to close out a batch once its per-record writes have run.

use crate::errors::ApiError;
use crate::metrics_defs::{FINALIZE_FAILED, FINALIZE_SKIPPED, FINALIZE_SUBMITTED};
use crate::submission::Submission;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizePolicy {
    /// Always finalize. Attendance submit closes the day, however many
    /// records actually changed.
    Always,
    /// Finalize only if at least one write was effective. The marks submit
    /// endpoint fails when nothing new was written, so an all-conflict or
    /// empty batch must not call it.
    OnEffectiveWrites,
}

impl FinalizePolicy {
    pub fn should_finalize(&self, effective_write_count: usize) -> bool {
        match self {
            FinalizePolicy::Always => true,
            FinalizePolicy::OnEffectiveWrites => effective_write_count > 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FinalizeStatus {
    Submitted,
    /// The policy decided there was nothing to close out.
    Skipped,
    /// Never treated as a tolerable conflict.
    Failed(Arc<ApiError>),
}

impl FinalizeStatus {
    pub fn invoked(&self) -> bool {
        !matches!(self, FinalizeStatus::Skipped)
    }

    pub fn error(&self) -> Option<&Arc<ApiError>> {
        match self {
            FinalizeStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Applies the submission's finalize policy and issues the close-out call
/// when it says so.
pub async fn close_out<S: Submission + ?Sized>(
    submission: &S,
    effective_write_count: usize,
) -> FinalizeStatus {
    let kind = submission.kind();

    if !submission
        .finalize_policy()
        .should_finalize(effective_write_count)
    {
        tracing::debug!(kind = %kind, "No effective writes, skipping finalize");
        shared::counter!(FINALIZE_SKIPPED, "kind" => kind.as_str()).increment(1);
        return FinalizeStatus::Skipped;
    }

    match submission.finalize().await {
        Ok(()) => {
            shared::counter!(FINALIZE_SUBMITTED, "kind" => kind.as_str()).increment(1);
            FinalizeStatus::Submitted
        }
        Err(e) => {
            tracing::error!(
                kind = %kind,
                effective_writes = effective_write_count,
                error = %e,
                "Finalize failed after records were written"
            );
            shared::counter!(FINALIZE_FAILED, "kind" => kind.as_str()).increment(1);
            FinalizeStatus::Failed(Arc::new(e))
        }
    }
}
