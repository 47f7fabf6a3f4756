use crate::api::MarksApi;
use crate::errors::ApiError;
use crate::protocol::{FinalizeMarksRequest, RecordMarkRequest};
use crate::submission::{Submission, SubmissionKind};
use crate::types::{ExamType, MarkRecord, RosterEntry, SectionId, SubjectId};
use async_trait::async_trait;

/// Marks for one section, subject and exam.
pub struct MarksSubmission<M> {
    api: M,
    section_id: SectionId,
    subject_id: SubjectId,
    exam_type: ExamType,
}

impl<M: MarksApi> MarksSubmission<M> {
    pub fn new(
        api: M,
        section_id: SectionId,
        subject_id: SubjectId,
        exam_type: impl Into<ExamType>,
    ) -> Self {
        Self {
            api,
            section_id,
            subject_id,
            exam_type: exam_type.into(),
        }
    }

    pub fn exam_type(&self) -> &str {
        &self.exam_type
    }
}

#[async_trait]
impl<M: MarksApi + 'static> Submission for MarksSubmission<M> {
    type Value = f64;
    type Payload = RecordMarkRequest;
    type Record = MarkRecord;

    fn kind(&self) -> SubmissionKind {
        SubmissionKind::Marks
    }

    fn build_payload(&self, entry: &RosterEntry<f64>) -> RecordMarkRequest {
        RecordMarkRequest::new(
            entry.student_id,
            self.subject_id,
            self.exam_type.clone(),
            entry.value,
        )
    }

    async fn upsert(&self, payload: RecordMarkRequest) -> Result<MarkRecord, ApiError> {
        self.api.record_mark(payload).await
    }

    async fn finalize(&self) -> Result<(), ApiError> {
        self.api
            .finalize_marks(FinalizeMarksRequest {
                section_id: self.section_id,
                subject_id: self.subject_id,
                exam_type: self.exam_type.clone(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::MockSchoolApi;
    use crate::types::MAX_MARKS;
    use std::sync::Arc;

    #[test]
    fn test_build_payload() {
        let submission = MarksSubmission::new(Arc::new(MockSchoolApi::default()), 4, 9, "final");

        let payload = submission.build_payload(&RosterEntry::new(21, 67.5));

        assert_eq!(payload.student_id, 21);
        assert_eq!(payload.subject_id, 9);
        assert_eq!(payload.exam_type, "final");
        assert_eq!(payload.marks_obtained, 67.5);
        assert_eq!(payload.max_marks, MAX_MARKS);
    }

    #[tokio::test]
    async fn test_finalize_request() {
        let api = Arc::new(MockSchoolApi::default());
        let submission = MarksSubmission::new(api.clone(), 4, 9, "final");

        submission.finalize().await.expect("finalize");

        assert_eq!(
            api.last_marks_finalize(),
            Some(FinalizeMarksRequest {
                section_id: 4,
                subject_id: 9,
                exam_type: "final".into(),
            })
        );
    }
}
