//! Builds outbound rosters from a section's students, what the server
//! already holds, and the edits made locally.

use crate::api::{AttendanceApi, DirectoryApi, MarksApi};
use crate::attendance::AttendanceValue;
use crate::errors::ApiError;
use crate::types::{
    AttendanceRecord, AttendanceStatus, MAX_MARKS, MarkRecord, RecordId, Roster, RosterEntry,
    SectionId, Student, StudentId, SubjectId,
};
use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Attendance roster for every student in the section.
///
/// A student's status is their local toggle if there is one, else the status
/// already stored for `date`, else present. Students with a stored record are
/// routed to update that record; the rest are created.
pub fn project_attendance(
    date: NaiveDate,
    students: &[Student],
    existing: &[AttendanceRecord],
    toggles: &IndexMap<StudentId, AttendanceStatus>,
) -> Roster<AttendanceValue> {
    let stored: HashMap<StudentId, (RecordId, AttendanceStatus)> = existing
        .iter()
        .filter(|record| record.date == date)
        .map(|record| (record.student_id, (record.id, record.status)))
        .collect();

    unique_students(students)
        .map(|student_id| {
            let stored = stored.get(&student_id);
            let status = toggles
                .get(&student_id)
                .copied()
                .or(stored.map(|(_, status)| *status))
                .unwrap_or_default();

            let value = match stored {
                Some((record_id, _)) => AttendanceValue::update(*record_id, status),
                None => AttendanceValue::create(status),
            };
            RosterEntry::new(student_id, value)
        })
        .collect()
}

/// Marks roster containing only students with a usable score.
///
/// `entered` holds the text of every mark field the user touched. Untouched
/// students fall back to the mark already stored on the server. Blank or
/// invalid text means "no entry": the student is left out, which is not the
/// same as a zero.
pub fn project_marks(
    students: &[Student],
    existing: &[MarkRecord],
    entered: &IndexMap<StudentId, String>,
) -> Roster<f64> {
    let stored: HashMap<StudentId, f64> = existing
        .iter()
        .map(|mark| (mark.student_id, mark.marks_obtained))
        .collect();

    unique_students(students)
        .filter_map(|student_id| {
            let score = match entered.get(&student_id) {
                Some(text) => parse_score(text),
                None => stored.get(&student_id).copied().filter(|s| is_valid_score(*s)),
            }?;
            Some(RosterEntry::new(student_id, score))
        })
        .collect()
}

/// Parses a mark typed into a form field. Returns `None` for blanks,
/// non-numeric text and values outside 0..=100.
pub fn parse_score(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|score| is_valid_score(*score))
}

fn is_valid_score(score: f64) -> bool {
    score.is_finite() && (0.0..=MAX_MARKS).contains(&score)
}

/// Fetches the section and its attendance for `date`, then projects.
pub async fn load_attendance_roster<A>(
    api: &A,
    section_id: SectionId,
    date: NaiveDate,
    toggles: &IndexMap<StudentId, AttendanceStatus>,
) -> Result<Roster<AttendanceValue>, ApiError>
where
    A: DirectoryApi + AttendanceApi + ?Sized,
{
    let students = api.section_students(section_id).await?;
    let existing = api.list_attendance(section_id, date).await?;
    tracing::debug!(
        section_id,
        students = students.len(),
        existing = existing.len(),
        "Loaded attendance state"
    );
    Ok(project_attendance(date, &students, &existing, toggles))
}

/// Fetches the section and its stored marks for the exam, then projects.
pub async fn load_marks_roster<M>(
    api: &M,
    section_id: SectionId,
    subject_id: SubjectId,
    exam_type: &str,
    entered: &IndexMap<StudentId, String>,
) -> Result<Roster<f64>, ApiError>
where
    M: DirectoryApi + MarksApi + ?Sized,
{
    let students = api.section_students(section_id).await?;
    let existing = api.list_marks(section_id, subject_id, exam_type).await?;
    tracing::debug!(
        section_id,
        subject_id,
        exam_type,
        students = students.len(),
        existing = existing.len(),
        "Loaded marks state"
    );
    Ok(project_marks(&students, &existing, entered))
}

/// Section order, first occurrence wins.
fn unique_students(students: &[Student]) -> impl Iterator<Item = StudentId> {
    students
        .iter()
        .map(|student| student.id)
        .collect::<IndexSet<_>>()
        .into_iter()
}
