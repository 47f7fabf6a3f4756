//! Local edit files handed to the submit commands.
//!
//! Both are JSON objects keyed by student id, kept in file order:
//!
//! ```json
//! {"12": "ABSENT", "15": "PRESENT"}
//! {"12": "78.5", "15": 64, "19": ""}
//! ```

use indexmap::IndexMap;
use roster_sync::types::{AttendanceStatus, StudentId};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum EditsError {
    #[error("could not read edits from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse edits in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A mark as typed: usually text, but hand-written files may use numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum EnteredMark {
    Text(String),
    Number(f64),
}

impl From<EnteredMark> for String {
    fn from(mark: EnteredMark) -> Self {
        match mark {
            EnteredMark::Text(text) => text,
            EnteredMark::Number(number) => number.to_string(),
        }
    }
}

pub fn read_attendance(path: &Path) -> Result<IndexMap<StudentId, AttendanceStatus>, EditsError> {
    read_json(path)
}

pub fn read_marks(path: &Path) -> Result<IndexMap<StudentId, String>, EditsError> {
    let entered: IndexMap<StudentId, EnteredMark> = read_json(path)?;
    Ok(entered
        .into_iter()
        .map(|(student_id, mark)| (student_id, mark.into()))
        .collect())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, EditsError> {
    let file = File::open(path).map_err(|source| EditsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| EditsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write json");

        tmp
    }

    #[test]
    fn attendance_edits() {
        let tmp = write_tmp_file(r#"{"15": "ABSENT", "3": "PRESENT"}"#);
        let toggles = read_attendance(tmp.path()).expect("read edits");

        let entries: Vec<_> = toggles.into_iter().collect();
        assert_eq!(
            entries,
            vec![(15, AttendanceStatus::Absent), (3, AttendanceStatus::Present)]
        );
    }

    #[test]
    fn marks_edits_accept_text_and_numbers() {
        let tmp = write_tmp_file(r#"{"1": "78.5", "2": 64, "3": "", "4": 91.25}"#);
        let entered = read_marks(tmp.path()).expect("read edits");

        assert_eq!(entered[&1], "78.5");
        assert_eq!(entered[&2], "64");
        assert_eq!(entered[&3], "");
        assert_eq!(entered[&4], "91.25");
    }

    #[test]
    fn invalid_edits() {
        let tmp = write_tmp_file(r#"{"1": "LATE"}"#);
        assert!(matches!(
            read_attendance(tmp.path()),
            Err(EditsError::Parse { .. })
        ));

        let tmp = write_tmp_file(r#"{"not-a-student": "50"}"#);
        assert!(matches!(read_marks(tmp.path()), Err(EditsError::Parse { .. })));

        assert!(matches!(
            read_marks(Path::new("/nonexistent/marks.json")),
            Err(EditsError::Read { .. })
        ));
    }
}
