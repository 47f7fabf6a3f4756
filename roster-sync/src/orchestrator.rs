//! Runs a roster through per-record upserts and the finalize gate.

use crate::conflict::ConflictKind;
use crate::errors::{ApiError, SubmitError};
use crate::finalize::{self, FinalizeStatus};
use crate::limiter::ConcurrencyLimiter;
use crate::metrics_defs::{
    BATCH_DURATION, BATCH_SIZE, UPSERTS_IN_FLIGHT, UPSERT_CONFLICT, UPSERT_FAILURE, UPSERT_SUCCESS,
};
use crate::submission::{Submission, SubmissionKind};
use crate::types::Roster;
use std::sync::Arc;
use tokio::time::Instant;

/// Result of a single roster entry's upsert.
#[derive(Debug)]
pub enum UpsertOutcome<R> {
    Success(R),
    /// Rejected by the server in a way the submission tolerates. Not an
    /// effective write.
    SkippedConflict { kind: ConflictKind, error: ApiError },
    Failure(ApiError),
}

impl<R> UpsertOutcome<R> {
    pub fn is_effective_write(&self) -> bool {
        matches!(self, UpsertOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, UpsertOutcome::Failure(_))
    }

    pub fn conflict(&self) -> Option<ConflictKind> {
        match self {
            UpsertOutcome::SkippedConflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&R> {
        match self {
            UpsertOutcome::Success(record) => Some(record),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            UpsertOutcome::SkippedConflict { error, .. } | UpsertOutcome::Failure(error) => {
                Some(error)
            }
            UpsertOutcome::Success(_) => None,
        }
    }
}

/// Everything a submission did, one outcome per roster entry in roster order.
#[derive(Debug)]
pub struct BatchReport<R> {
    pub kind: SubmissionKind,
    pub outcomes: Vec<UpsertOutcome<R>>,
    pub effective_write_count: usize,
    pub finalize: FinalizeStatus,
}

impl<R> BatchReport<R> {
    pub fn finalize_invoked(&self) -> bool {
        self.finalize.invoked()
    }

    /// True when the finalize call was deliberately not made because nothing
    /// was written. Distinguishes "nothing to submit" from "submitted".
    pub fn skipped_submit(&self) -> bool {
        matches!(self.finalize, FinalizeStatus::Skipped)
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn conflict_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.conflict().is_some())
            .count()
    }

    /// Tolerated conflicts the user still has to be told about, by roster index.
    pub fn notices(&self) -> Vec<(usize, ConflictKind)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| {
                outcome
                    .conflict()
                    .filter(ConflictKind::requires_notice)
                    .map(|kind| (index, kind))
            })
            .collect()
    }

    pub fn is_ok(&self) -> bool {
        !self.outcomes.iter().any(UpsertOutcome::is_failure)
            && !matches!(self.finalize, FinalizeStatus::Failed(_))
    }
}

impl<R: std::fmt::Debug> BatchReport<R> {
    /// Converts the report into an error if any record or the finalize call
    /// failed. A finalize failure takes precedence since it leaves the
    /// section unsubmitted.
    pub fn into_result(self) -> Result<Self, SubmitError<R>> {
        if let FinalizeStatus::Failed(source) = &self.finalize {
            return Err(SubmitError::Finalize {
                kind: self.kind,
                source: source.clone(),
                report: Box::new(self),
            });
        }

        let failed = self.outcomes.iter().filter(|o| o.is_failure()).count();
        if failed > 0 {
            return Err(SubmitError::RecordFailures {
                kind: self.kind,
                failed,
                total: self.outcomes.len(),
                report: Box::new(self),
            });
        }

        Ok(self)
    }
}

/// Holds one unit of an in-flight gauge, released on drop so a panicking
/// upsert still leaves the gauge balanced.
struct InFlight(metrics::Gauge);

impl InFlight {
    fn enter(gauge: metrics::Gauge) -> Self {
        gauge.increment(1.0);
        InFlight(gauge)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

/// Issues one upsert per roster entry through the limiter and classifies
/// each result. Exactly `roster.len()` upserts are attempted and none are
/// retried.
pub async fn run_upserts<S: Submission>(
    submission: Arc<S>,
    roster: Roster<S::Value>,
    limiter: &ConcurrencyLimiter,
) -> Vec<UpsertOutcome<S::Record>> {
    let kind = submission.kind();

    let tasks: Vec<_> = roster
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let submission = submission.clone();
            let payload = submission.build_payload(&entry);
            let student_id = entry.student_id;

            move || async move {
                let result = {
                    let _in_flight = InFlight::enter(shared::gauge!(UPSERTS_IN_FLIGHT));
                    submission.upsert(payload).await
                };

                match result {
                    Ok(record) => UpsertOutcome::Success(record),
                    Err(error) => match submission.classifier().classify(&error) {
                        Some(conflict) => {
                            if conflict.requires_notice() {
                                tracing::warn!(kind = %kind, index, student_id, error = %error, "Upsert rejected by server");
                            } else {
                                tracing::debug!(kind = %kind, index, student_id, "Upsert skipped, already recorded");
                            }
                            UpsertOutcome::SkippedConflict {
                                kind: conflict,
                                error,
                            }
                        }
                        None => {
                            tracing::error!(kind = %kind, index, student_id, error = %error, "Upsert failed");
                            UpsertOutcome::Failure(error)
                        }
                    },
                }
            }
        })
        .collect();

    limiter
        .run(tasks)
        .await
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|aborted| UpsertOutcome::Failure(aborted.into())))
        .collect()
}

/// Drives submissions: per-record upserts under a concurrency bound, then
/// the finalize gate.
///
/// A submitter does not guard against being re-entered while a previous
/// submission for the same section is still running; callers must prevent
/// double submits.
#[derive(Clone, Debug, Default)]
pub struct Submitter {
    limiter: ConcurrencyLimiter,
}

impl Submitter {
    pub fn new(concurrency: usize) -> Self {
        Self {
            limiter: ConcurrencyLimiter::new(concurrency),
        }
    }

    pub async fn submit<S: Submission>(
        &self,
        submission: Arc<S>,
        roster: Roster<S::Value>,
    ) -> Result<BatchReport<S::Record>, SubmitError<S::Record>> {
        let kind = submission.kind();
        let total = roster.len();
        let started = Instant::now();

        tracing::info!(kind = %kind, entries = total, concurrency = self.limiter.concurrency(), "Submitting batch");
        shared::histogram!(BATCH_SIZE, "kind" => kind.as_str()).record(total as f64);

        let outcomes = run_upserts(submission.clone(), roster, &self.limiter).await;

        let mut effective_write_count = 0;
        let mut conflicts = 0;
        let mut failures = 0;
        for outcome in &outcomes {
            match outcome {
                UpsertOutcome::Success(_) => effective_write_count += 1,
                UpsertOutcome::SkippedConflict { .. } => conflicts += 1,
                UpsertOutcome::Failure(_) => failures += 1,
            }
        }
        shared::counter!(UPSERT_SUCCESS, "kind" => kind.as_str()).increment(effective_write_count as u64);
        shared::counter!(UPSERT_CONFLICT, "kind" => kind.as_str()).increment(conflicts as u64);
        shared::counter!(UPSERT_FAILURE, "kind" => kind.as_str()).increment(failures as u64);

        let finalize = finalize::close_out(submission.as_ref(), effective_write_count).await;

        tracing::info!(
            kind = %kind,
            effective_writes = effective_write_count,
            conflicts,
            failures,
            finalized = matches!(finalize, FinalizeStatus::Submitted),
            "Batch complete"
        );
        shared::histogram!(BATCH_DURATION, "kind" => kind.as_str())
            .record(started.elapsed().as_secs_f64());

        BatchReport {
            kind,
            outcomes,
            effective_write_count,
            finalize,
        }
        .into_result()
    }

    /// Re-issues only the finalize call, without re-running any upserts.
    ///
    /// Meant for recovery after [`SubmitError::Finalize`]: the records are
    /// already written and finalize is idempotent per section key. The
    /// effective-write guard is not applied here.
    pub async fn retry_finalize<S: Submission + ?Sized>(&self, submission: &S) -> Result<(), ApiError> {
        let kind = submission.kind();
        tracing::info!(kind = %kind, "Retrying finalize");
        submission.finalize().await.inspect_err(|e| {
            tracing::error!(kind = %kind, error = %e, "Finalize retry failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{AttendanceSubmission, AttendanceValue};
    use crate::conflict::{ATTENDANCE_EDIT_NOT_ALLOWED, CONFLICTING_MARKS};
    use crate::marks::MarksSubmission;
    use crate::testutils::{MockSchoolApi, Reply, test_date};
    use crate::types::{AttendanceStatus, RosterEntry};
    use http::StatusCode;

    fn marks_roster(students: &[i64]) -> Roster<f64> {
        students
            .iter()
            .map(|&id| RosterEntry::new(id, 50.0 + id as f64))
            .collect()
    }

    fn new_attendance_roster(students: &[i64]) -> Roster<AttendanceValue> {
        students
            .iter()
            .map(|&id| RosterEntry::new(id, AttendanceValue::create(AttendanceStatus::Present)))
            .collect()
    }

    #[tokio::test]
    async fn test_marks_conflict_is_swallowed() {
        let api = Arc::new(
            MockSchoolApi::default()
                .with_reply(2, Reply::fail(StatusCode::BAD_REQUEST, Some(CONFLICTING_MARKS))),
        );
        let submission = Arc::new(MarksSubmission::new(api.clone(), 10, 3, "midterm"));

        let report = Submitter::new(8)
            .submit(submission, marks_roster(&[1, 2, 3]))
            .await
            .expect("batch succeeds");

        assert_eq!(report.effective_write_count, 2);
        assert_eq!(report.conflict_count(), 1);
        assert!(report.finalize_invoked());
        assert!(!report.skipped_submit());
        assert_eq!(report.outcomes[1].conflict(), Some(ConflictKind::AlreadyRecorded));
        assert!(report.notices().is_empty());
        assert_eq!(api.upsert_calls().len(), 3);
        assert_eq!(api.finalize_marks_calls(), 1);
    }

    #[tokio::test]
    async fn test_marks_all_conflicts_skip_finalize() {
        let conflict = Reply::fail(StatusCode::BAD_REQUEST, Some(CONFLICTING_MARKS));
        let api = Arc::new(
            MockSchoolApi::default()
                .with_reply(1, conflict.clone())
                .with_reply(2, conflict.clone())
                .with_reply(3, conflict),
        );
        let submission = Arc::new(MarksSubmission::new(api.clone(), 10, 3, "midterm"));

        let report = Submitter::new(8)
            .submit(submission, marks_roster(&[1, 2, 3]))
            .await
            .expect("all-conflict batch is not an error");

        assert_eq!(report.effective_write_count, 0);
        assert!(report.is_ok());
        assert!(report.skipped_submit());
        assert!(!report.finalize_invoked());
        assert_eq!(api.finalize_marks_calls(), 0);
    }

    #[tokio::test]
    async fn test_marks_empty_roster_skips_finalize() {
        let api = Arc::new(MockSchoolApi::default());
        let submission = Arc::new(MarksSubmission::new(api.clone(), 10, 3, "final"));

        let report = Submitter::default()
            .submit(submission, Vec::new())
            .await
            .expect("empty batch");

        assert!(report.outcomes.is_empty());
        assert!(report.skipped_submit());
        assert!(api.upsert_calls().is_empty());
        assert_eq!(api.finalize_marks_calls(), 0);
    }

    #[tokio::test]
    async fn test_attendance_always_finalizes() {
        let api = Arc::new(MockSchoolApi::default());
        let submission = Arc::new(AttendanceSubmission::new(api.clone(), 10, test_date()));

        let report = Submitter::new(8)
            .submit(submission.clone(), new_attendance_roster(&[1, 2, 3, 4]))
            .await
            .expect("batch succeeds");
        assert_eq!(report.effective_write_count, 4);
        assert!(report.finalize_invoked());
        assert_eq!(api.finalize_attendance_calls(), 1);

        let api = Arc::new(MockSchoolApi::default());
        let submission = Arc::new(AttendanceSubmission::new(api.clone(), 10, test_date()));
        let report = Submitter::new(8)
            .submit(submission, Vec::new())
            .await
            .expect("empty batch");
        assert_eq!(report.effective_write_count, 0);
        assert!(report.finalize_invoked());
        assert_eq!(api.finalize_attendance_calls(), 1);
    }

    #[tokio::test]
    async fn test_attendance_edit_window_is_a_notice() {
        let api = Arc::new(MockSchoolApi::default().with_reply(
            2,
            Reply::fail(StatusCode::FORBIDDEN, Some(ATTENDANCE_EDIT_NOT_ALLOWED)),
        ));
        let submission = Arc::new(AttendanceSubmission::new(api.clone(), 10, test_date()));

        let report = Submitter::new(2)
            .submit(submission, new_attendance_roster(&[1, 2, 3]))
            .await
            .expect("edit-window rejection does not fail the batch");

        assert_eq!(report.effective_write_count, 2);
        assert_eq!(report.notices(), vec![(1, ConflictKind::EditWindowClosed)]);
        assert_eq!(api.finalize_attendance_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hard_failure_is_isolated() {
        let api = Arc::new(
            MockSchoolApi::default()
                .with_delay_ms(5)
                .with_reply(2, Reply::fail(StatusCode::BAD_REQUEST, Some(CONFLICTING_MARKS)))
                .with_reply(3, Reply::fail(StatusCode::INTERNAL_SERVER_ERROR, None)),
        );
        let submission = Arc::new(MarksSubmission::new(api.clone(), 10, 3, "midterm"));

        let error = Submitter::new(2)
            .submit(submission, marks_roster(&[1, 2, 3, 4, 5]))
            .await
            .expect_err("hard failure surfaces");

        assert_eq!(error.to_string(), "1 of 5 marks records could not be saved");
        let report = error.report();
        assert_eq!(report.failed_indices(), vec![2]);
        assert!(report.outcomes[0].is_effective_write());
        assert_eq!(report.outcomes[1].conflict(), Some(ConflictKind::AlreadyRecorded));
        assert!(report.outcomes[3].is_effective_write());
        assert!(report.outcomes[4].is_effective_write());
        assert_eq!(
            report.outcomes[2].error().and_then(ApiError::http_status),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(api.upsert_calls().len(), 5);
        // Three effective writes, so marks still finalize.
        assert_eq!(report.effective_write_count, 3);
        assert_eq!(api.finalize_marks_calls(), 1);
    }

    #[tokio::test]
    async fn test_finalize_failure_surfaces_with_report() {
        let api = Arc::new(
            MockSchoolApi::default()
                .with_finalize_reply(Reply::fail(StatusCode::SERVICE_UNAVAILABLE, None)),
        );
        let submission = Arc::new(AttendanceSubmission::new(api.clone(), 10, test_date()));
        let submitter = Submitter::new(4);

        let error = submitter
            .submit(submission.clone(), new_attendance_roster(&[1, 2]))
            .await
            .expect_err("finalize failure is hard");

        assert!(matches!(error, SubmitError::Finalize { .. }));
        let report = error.into_report();
        assert_eq!(report.effective_write_count, 2);
        assert!(report.finalize_invoked());
        assert_eq!(api.upsert_calls().len(), 2);

        // Retrying finalize alone issues no further upserts.
        let result = submitter.retry_finalize(submission.as_ref()).await;
        assert!(result.is_err());
        assert_eq!(api.upsert_calls().len(), 2);
        assert_eq!(api.finalize_attendance_calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_finalize_succeeds() {
        let api = Arc::new(MockSchoolApi::default());
        let submission = MarksSubmission::new(api.clone(), 10, 3, "final");

        Submitter::default()
            .retry_finalize(&submission)
            .await
            .expect("finalize");
        assert_eq!(api.finalize_marks_calls(), 1);
        assert!(api.upsert_calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_submit_respects_concurrency() {
        let api = Arc::new(MockSchoolApi::default().with_delay_ms(10));
        let submission = Arc::new(MarksSubmission::new(api.clone(), 10, 3, "midterm"));
        let students: Vec<i64> = (1..=20).collect();

        let report = Submitter::new(3)
            .submit(submission, marks_roster(&students))
            .await
            .expect("batch succeeds");

        assert_eq!(report.effective_write_count, 20);
        assert!(api.peak_in_flight() <= 3);
        // Records come back in roster order.
        let ids: Vec<i64> = report
            .outcomes
            .iter()
            .filter_map(|o| o.record().map(|r| r.student_id))
            .collect();
        assert_eq!(ids, students);
    }

    fn failing_upsert() {
        panic!("upsert panicked");
    }

    #[tokio::test]
    async fn test_in_flight_released_when_upsert_panics() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let value = Arc::new(AtomicU64::new(0));
        let gauge = metrics::Gauge::from_arc(value.clone());

        let held = InFlight::enter(gauge.clone());
        assert_eq!(f64::from_bits(value.load(Ordering::SeqCst)), 1.0);
        drop(held);
        assert_eq!(f64::from_bits(value.load(Ordering::SeqCst)), 0.0);

        let joined = tokio::spawn(async move {
            let _in_flight = InFlight::enter(gauge);
            tokio::task::yield_now().await;
            failing_upsert();
        })
        .await;

        assert!(joined.is_err());
        assert_eq!(f64::from_bits(value.load(Ordering::SeqCst)), 0.0);
    }
}
