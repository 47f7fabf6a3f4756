//! Bulk submission of attendance and marks to the school REST API.
//!
//! A submission turns a locally edited roster into one upsert request per
//! student, runs them with bounded concurrency, tolerates the conflicts the
//! server reports for already-recorded or locked records, and then decides
//! whether to issue the section-level finalize call.
//!
//! ```text
//! edits ──► projector ──► Roster ──► Submitter ──► ConcurrencyLimiter ──► upserts
//!                                        │
//!                                        └─► FinalizeGate ──► finalize (policy-dependent)
//! ```

pub mod api;
pub mod attendance;
pub mod client;
pub mod config;
pub mod conflict;
pub mod errors;
pub mod finalize;
pub mod limiter;
pub mod marks;
pub mod metrics_defs;
pub mod orchestrator;
pub mod projector;
pub mod protocol;
pub mod submission;
pub mod types;

#[cfg(test)]
mod testutils;

pub use errors::{ApiError, SubmitError};
pub use orchestrator::{BatchReport, Submitter, UpsertOutcome};
pub use submission::{Submission, SubmissionKind};
