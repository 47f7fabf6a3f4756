//! Request and response bodies exchanged with the school API.

use crate::types::{AttendanceStatus, ExamType, MAX_MARKS, RecordId, SectionId, StudentId, SubjectId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateAttendanceRequest {
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Update of an existing attendance record. The id goes in the URL.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpdateAttendanceRequest {
    #[serde(skip)]
    pub attendance_id: RecordId,
    pub status: AttendanceStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinalizeAttendanceRequest {
    pub section_id: SectionId,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordMarkRequest {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub exam_type: ExamType,
    pub marks_obtained: f64,
    pub max_marks: f64,
}

impl RecordMarkRequest {
    pub fn new(
        student_id: StudentId,
        subject_id: SubjectId,
        exam_type: ExamType,
        marks_obtained: f64,
    ) -> Self {
        RecordMarkRequest {
            student_id,
            subject_id,
            exam_type,
            marks_obtained,
            max_marks: MAX_MARKS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinalizeMarksRequest {
    pub section_id: SectionId,
    pub subject_id: SubjectId,
    pub exam_type: ExamType,
}

/// List endpoints answer either with a bare array or with a paginated
/// `{"results": [...]}` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Plain(Vec<T>),
    Paginated { results: Vec<T> },
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Plain(items) | ListResponse::Paginated { results: items } => items,
        }
    }
}
