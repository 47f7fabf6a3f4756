//! Classification of failed upserts into tolerable conflicts and hard failures.

use crate::errors::ApiError;
use http::StatusCode;

/// Server code for a mark that already exists for the student, subject and exam.
pub const CONFLICTING_MARKS: &str = "conflicting_marks";

/// Server code for an attendance write outside the permitted edit window.
pub const ATTENDANCE_EDIT_NOT_ALLOWED: &str = "attendance_edit_not_allowed";

/// A server rejection that is business-normal rather than a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// The record already exists. Swallowed silently.
    AlreadyRecorded,
    /// Attendance for this date can no longer be edited. The batch carries
    /// on, but the user must be told.
    EditWindowClosed,
}

impl ConflictKind {
    /// Whether this conflict should be shown to the user rather than swallowed.
    pub fn requires_notice(&self) -> bool {
        matches!(self, ConflictKind::EditWindowClosed)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ConflictKind::AlreadyRecorded => "Already recorded",
            ConflictKind::EditWindowClosed => "Attendance can only be edited on the day it was taken",
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::AlreadyRecorded => "already_recorded",
            ConflictKind::EditWindowClosed => "edit_window_closed",
        }
    }
}

/// Which conflicts a submission tolerates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictClassifier {
    /// Tolerates `conflicting_marks` with any status.
    Marks,
    /// Tolerates `attendance_edit_not_allowed` only when paired with 403.
    Attendance,
}

impl ConflictClassifier {
    /// Returns the conflict kind for a tolerable failure, or `None` if the
    /// error is a hard failure that must propagate.
    pub fn classify(&self, error: &ApiError) -> Option<ConflictKind> {
        match self {
            ConflictClassifier::Marks => (error.server_code() == Some(CONFLICTING_MARKS))
                .then_some(ConflictKind::AlreadyRecorded),
            ConflictClassifier::Attendance => (error.http_status() == Some(StatusCode::FORBIDDEN)
                && error.server_code() == Some(ATTENDANCE_EDIT_NOT_ALLOWED))
            .then_some(ConflictKind::EditWindowClosed),
        }
    }

    pub fn is_tolerable_conflict(&self, error: &ApiError) -> bool {
        self.classify(error).is_some()
    }
}
