use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type StudentId = i64;
pub type SectionId = i64;
pub type SubjectId = i64;
pub type RecordId = i64;

/// Exam identifier as the API spells it, e.g. `midterm` or `final`.
pub type ExamType = String;

/// Upper bound of every mark; the API stores marks out of 100.
pub const MAX_MARKS: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
}

impl AttendanceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roll_number: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub exam_type: ExamType,
    pub marks_obtained: f64,
    #[serde(default = "default_max_marks")]
    pub max_marks: f64,
}

fn default_max_marks() -> f64 {
    MAX_MARKS
}

/// One intended write: a student and the value to store for them.
#[derive(Clone, Debug, PartialEq)]
pub struct RosterEntry<V> {
    pub student_id: StudentId,
    pub value: V,
}

impl<V> RosterEntry<V> {
    pub fn new(student_id: StudentId, value: V) -> Self {
        RosterEntry { student_id, value }
    }
}

/// Ordered list of intended writes for one submission. Outcomes are reported
/// in the same order.
pub type Roster<V> = Vec<RosterEntry<V>>;
