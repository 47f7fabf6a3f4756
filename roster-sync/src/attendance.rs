use crate::api::AttendanceApi;
use crate::errors::ApiError;
use crate::protocol::{CreateAttendanceRequest, FinalizeAttendanceRequest, UpdateAttendanceRequest};
use crate::submission::{Submission, SubmissionKind};
use crate::types::{AttendanceRecord, AttendanceStatus, RecordId, RosterEntry, SectionId};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Desired attendance for one student, and the id of the record already
/// stored for that date, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttendanceValue {
    pub status: AttendanceStatus,
    pub existing_record: Option<RecordId>,
}

impl AttendanceValue {
    pub fn create(status: AttendanceStatus) -> Self {
        AttendanceValue {
            status,
            existing_record: None,
        }
    }

    pub fn update(record_id: RecordId, status: AttendanceStatus) -> Self {
        AttendanceValue {
            status,
            existing_record: Some(record_id),
        }
    }
}

/// Per-entry routing: create when no record exists, update by id otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum AttendanceUpsert {
    Create(CreateAttendanceRequest),
    Update(UpdateAttendanceRequest),
}

/// Attendance for one section on one date.
pub struct AttendanceSubmission<A> {
    api: A,
    section_id: SectionId,
    date: NaiveDate,
}

impl<A: AttendanceApi> AttendanceSubmission<A> {
    pub fn new(api: A, section_id: SectionId, date: NaiveDate) -> Self {
        Self {
            api,
            section_id,
            date,
        }
    }

    pub fn section_id(&self) -> SectionId {
        self.section_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

#[async_trait]
impl<A: AttendanceApi + 'static> Submission for AttendanceSubmission<A> {
    type Value = AttendanceValue;
    type Payload = AttendanceUpsert;
    type Record = AttendanceRecord;

    fn kind(&self) -> SubmissionKind {
        SubmissionKind::Attendance
    }

    fn build_payload(&self, entry: &RosterEntry<AttendanceValue>) -> AttendanceUpsert {
        match entry.value.existing_record {
            Some(attendance_id) => AttendanceUpsert::Update(UpdateAttendanceRequest {
                attendance_id,
                status: entry.value.status,
            }),
            None => AttendanceUpsert::Create(CreateAttendanceRequest {
                student_id: entry.student_id,
                date: self.date,
                status: entry.value.status,
            }),
        }
    }

    async fn upsert(&self, payload: AttendanceUpsert) -> Result<AttendanceRecord, ApiError> {
        match payload {
            AttendanceUpsert::Create(request) => self.api.create_attendance(request).await,
            AttendanceUpsert::Update(request) => self.api.update_attendance(request).await,
        }
    }

    async fn finalize(&self) -> Result<(), ApiError> {
        self.api
            .finalize_attendance(FinalizeAttendanceRequest {
                section_id: self.section_id,
                date: self.date,
            })
            .await
    }
}
