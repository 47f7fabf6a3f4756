//! The calls the submission core needs from the school API.
//!
//! [`SchoolClient`](crate::client::SchoolClient) implements these over HTTP.

use crate::errors::ApiError;
use crate::protocol::{
    CreateAttendanceRequest, FinalizeAttendanceRequest, FinalizeMarksRequest, RecordMarkRequest,
    UpdateAttendanceRequest,
};
use crate::types::{AttendanceRecord, MarkRecord, SectionId, Student, SubjectId};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn section_students(&self, section_id: SectionId) -> Result<Vec<Student>, ApiError>;
}

#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn list_attendance(
        &self,
        section_id: SectionId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ApiError>;

    async fn create_attendance(
        &self,
        request: CreateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError>;

    async fn update_attendance(
        &self,
        request: UpdateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError>;

    async fn finalize_attendance(&self, request: FinalizeAttendanceRequest) -> Result<(), ApiError>;
}

#[async_trait]
pub trait MarksApi: Send + Sync {
    async fn list_marks(
        &self,
        section_id: SectionId,
        subject_id: SubjectId,
        exam_type: &str,
    ) -> Result<Vec<MarkRecord>, ApiError>;

    async fn record_mark(&self, request: RecordMarkRequest) -> Result<MarkRecord, ApiError>;

    async fn finalize_marks(&self, request: FinalizeMarksRequest) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: DirectoryApi + ?Sized> DirectoryApi for Arc<T> {
    async fn section_students(&self, section_id: SectionId) -> Result<Vec<Student>, ApiError> {
        (**self).section_students(section_id).await
    }
}

#[async_trait]
impl<T: AttendanceApi + ?Sized> AttendanceApi for Arc<T> {
    async fn list_attendance(
        &self,
        section_id: SectionId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        (**self).list_attendance(section_id, date).await
    }

    async fn create_attendance(
        &self,
        request: CreateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError> {
        (**self).create_attendance(request).await
    }

    async fn update_attendance(
        &self,
        request: UpdateAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError> {
        (**self).update_attendance(request).await
    }

    async fn finalize_attendance(&self, request: FinalizeAttendanceRequest) -> Result<(), ApiError> {
        (**self).finalize_attendance(request).await
    }
}

#[async_trait]
impl<T: MarksApi + ?Sized> MarksApi for Arc<T> {
    async fn list_marks(
        &self,
        section_id: SectionId,
        subject_id: SubjectId,
        exam_type: &str,
    ) -> Result<Vec<MarkRecord>, ApiError> {
        (**self).list_marks(section_id, subject_id, exam_type).await
    }

    async fn record_mark(&self, request: RecordMarkRequest) -> Result<MarkRecord, ApiError> {
        (**self).record_mark(request).await
    }

    async fn finalize_marks(&self, request: FinalizeMarksRequest) -> Result<(), ApiError> {
        (**self).finalize_marks(request).await
    }
}
