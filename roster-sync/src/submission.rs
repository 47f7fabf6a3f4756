use crate::conflict::ConflictClassifier;
use crate::errors::ApiError;
use crate::finalize::FinalizePolicy;
use crate::types::RosterEntry;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmissionKind {
    Attendance,
    Marks,
}

impl SubmissionKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Attendance => "attendance",
            SubmissionKind::Marks => "marks",
        }
    }

    pub fn finalize_policy(&self) -> FinalizePolicy {
        match self {
            SubmissionKind::Attendance => FinalizePolicy::Always,
            SubmissionKind::Marks => FinalizePolicy::OnEffectiveWrites,
        }
    }

    pub fn classifier(&self) -> ConflictClassifier {
        match self {
            SubmissionKind::Attendance => ConflictClassifier::Attendance,
            SubmissionKind::Marks => ConflictClassifier::Marks,
        }
    }
}

impl std::fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One kind of bulk submission: how roster entries become upsert requests,
/// which failures are tolerable and how the batch is closed out.
///
/// Attendance and marks both implement this, so they share the
/// [`Submitter`](crate::orchestrator::Submitter) path and differ only in the
/// strategy they plug in.
#[async_trait]
pub trait Submission: Send + Sync + 'static {
    type Value: Send + 'static;
    type Payload: Send + 'static;
    type Record: Send + std::fmt::Debug + 'static;

    fn kind(&self) -> SubmissionKind;

    fn finalize_policy(&self) -> FinalizePolicy {
        self.kind().finalize_policy()
    }

    fn classifier(&self) -> ConflictClassifier {
        self.kind().classifier()
    }

    /// Builds the request for one roster entry. Called once per entry.
    fn build_payload(&self, entry: &RosterEntry<Self::Value>) -> Self::Payload;

    async fn upsert(&self, payload: Self::Payload) -> Result<Self::Record, ApiError>;

    /// Section-level close-out call.
    async fn finalize(&self) -> Result<(), ApiError>;
}
