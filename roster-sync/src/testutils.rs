use crate::api::{AttendanceApi, DirectoryApi, MarksApi};
use crate::errors::ApiError;
use crate::protocol::{
    CreateAttendanceRequest, FinalizeAttendanceRequest, FinalizeMarksRequest, RecordMarkRequest,
    UpdateAttendanceRequest,
};
use crate::types::{AttendanceRecord, MarkRecord, SectionId, Student, StudentId, SubjectId};
use async_trait::async_trait;
use chrono::NaiveDate;
use http::StatusCode;
use shared::http::ErrorEnvelope;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

pub fn students(ids: impl IntoIterator<Item = StudentId>) -> Vec<Student> {
    ids.into_iter()
        .map(|id| Student {
            id,
            name: format!("Student {id}"),
            roll_number: None,
        })
        .collect()
}

/// Scripted answer for one call.
#[derive(Clone, Debug)]
pub enum Reply {
    Ok,
    Fail {
        status: StatusCode,
        code: Option<&'static str>,
    },
}

impl Reply {
    pub fn fail(status: StatusCode, code: Option<&'static str>) -> Self {
        Reply::Fail { status, code }
    }

    fn into_result(self, endpoint: &'static str) -> Result<(), ApiError> {
        match self {
            Reply::Ok => Ok(()),
            Reply::Fail { status, code } => Err(ApiError::from_envelope(
                endpoint,
                status,
                ErrorEnvelope {
                    code: code.map(str::to_string),
                    detail: None,
                },
            )),
        }
    }
}

/// In-memory school API with scripted failures.
///
/// Upsert replies are keyed by student id for creates and marks, and by
/// record id for attendance updates. Anything unscripted succeeds.
#[derive(Default)]
pub struct MockSchoolApi {
    replies: HashMap<i64, Reply>,
    finalize_reply: Option<Reply>,
    delay: Duration,
    students: Vec<Student>,
    attendance: Vec<AttendanceRecord>,
    marks: Vec<MarkRecord>,
    upsert_calls: Mutex<Vec<String>>,
    marks_finalizes: Mutex<Vec<FinalizeMarksRequest>>,
    attendance_finalizes: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockSchoolApi {
    pub fn with_reply(mut self, id: i64, reply: Reply) -> Self {
        self.replies.insert(id, reply);
        self
    }

    pub fn with_students(mut self, students: Vec<Student>) -> Self {
        self.students = students;
        self
    }

    pub fn with_attendance(mut self, records: Vec<AttendanceRecord>) -> Self {
        self.attendance = records;
        self
    }

    pub fn with_marks(mut self, marks: Vec<MarkRecord>) -> Self {
        self.marks = marks;
        self
    }

    pub fn with_finalize_reply(mut self, reply: Reply) -> Self {
        self.finalize_reply = Some(reply);
        self
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn upsert_calls(&self) -> Vec<String> {
        self.upsert_calls.lock().unwrap().clone()
    }

    pub fn finalize_marks_calls(&self) -> usize {
        self.marks_finalizes.lock().unwrap().len()
    }

    pub fn last_marks_finalize(&self) -> Option<FinalizeMarksRequest> {
        self.marks_finalizes.lock().unwrap().last().cloned()
    }

    pub fn finalize_attendance_calls(&self) -> usize {
        self.attendance_finalizes.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn upsert(&self, call: String, id: i64, endpoint: &'static str) -> Result<(), ApiError> {
        self.upsert_calls.lock().unwrap().push(call);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.replies
            .get(&id)
            .cloned()
            .unwrap_or(Reply::Ok)
            .into_result(endpoint)
    }

    fn finalize_result(&self, endpoint: &'static str) -> Result<(), ApiError> {
        self.finalize_reply
            .clone()
            .unwrap_or(Reply::Ok)
            .into_result(endpoint)
    }
}

#[async_trait]
impl DirectoryApi for MockSchoolApi {
    async fn section_students(&self, _section_id: SectionId) -> Result<Vec<Student>, ApiError> {
        Ok(self.students.clone())
    }
}

#[async_trait]
impl AttendanceApi for MockSchoolApi {
    async fn list_attendance(
        &self,
        _section_id: SectionId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        Ok(self
            .attendance
            .iter()
            .filter(|record| record.date == date)
            .cloned()
            .collect())
    }

    async fn create_attendance(
        &self,
        request: CreateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError> {
        let student_id = request.student_id;
        self.upsert(
            format!("create:{student_id}"),
            student_id,
            "create-attendance-record",
        )
        .await?;
        Ok(AttendanceRecord {
            id: 1000 + student_id,
            student_id,
            date: request.date,
            status: request.status,
        })
    }

    async fn update_attendance(
        &self,
        request: UpdateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError> {
        let id = request.attendance_id;
        self.upsert(format!("update:{id}"), id, "update-attendance-record")
            .await?;
        Ok(AttendanceRecord {
            id,
            student_id: 0,
            date: test_date(),
            status: request.status,
        })
    }

    async fn finalize_attendance(&self, _request: FinalizeAttendanceRequest) -> Result<(), ApiError> {
        self.attendance_finalizes.fetch_add(1, Ordering::SeqCst);
        self.finalize_result("finalize-attendance")
    }
}

#[async_trait]
impl MarksApi for MockSchoolApi {
    async fn list_marks(
        &self,
        _section_id: SectionId,
        subject_id: SubjectId,
        exam_type: &str,
    ) -> Result<Vec<MarkRecord>, ApiError> {
        Ok(self
            .marks
            .iter()
            .filter(|mark| mark.subject_id == subject_id && mark.exam_type == exam_type)
            .cloned()
            .collect())
    }

    async fn record_mark(&self, request: RecordMarkRequest) -> Result<MarkRecord, ApiError> {
        let student_id = request.student_id;
        self.upsert(format!("mark:{student_id}"), student_id, "record-mark")
            .await?;
        Ok(MarkRecord {
            id: Some(2000 + student_id),
            student_id,
            subject_id: request.subject_id,
            exam_type: request.exam_type,
            marks_obtained: request.marks_obtained,
            max_marks: request.max_marks,
        })
    }

    async fn finalize_marks(&self, request: FinalizeMarksRequest) -> Result<(), ApiError> {
        self.marks_finalizes.lock().unwrap().push(request);
        self.finalize_result("finalize-marks")
    }
}
