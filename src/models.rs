use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type StudentId = Uuid;
pub type AttendanceId = Uuid;

/// Class time used when a student has no preferred time on file.
pub const DEFAULT_PREFERRED_TIME: &str = "18:30";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub grade: Option<String>,
    pub phone_number: Option<String>,
    pub preferred_days: Vec<Weekday>,
    pub preferred_time: Option<String>,
    pub is_active: bool,
}

impl Student {
    pub fn prefers(&self, day: Weekday) -> bool {
        self.preferred_days.contains(&day)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub student_id: StudentId,
    /// Class date. The embedded time of day is not used for display.
    pub date: NaiveDateTime,
    /// Displayed and editable class time, `HH:MM`.
    pub time: String,
}

/// Fields submitted when adding or editing a student.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentDraft {
    pub name: String,
    pub grade: Option<String>,
    pub phone_number: Option<String>,
    pub preferred_days: Vec<Weekday>,
    pub preferred_time: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("student name must not be empty")]
    EmptyName,
    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
}

impl StudentDraft {
    /// Trims text fields, drops blank optionals, removes duplicate days and
    /// normalizes the preferred time.
    pub fn validate(self) -> Result<StudentDraft, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let mut preferred_days: Vec<Weekday> = Vec::with_capacity(self.preferred_days.len());
        for day in self.preferred_days {
            if !preferred_days.contains(&day) {
                preferred_days.push(day);
            }
        }

        let preferred_time = match non_blank(self.preferred_time) {
            Some(value) => Some(parse_time(&value)?),
            None => None,
        };

        Ok(StudentDraft {
            name,
            grade: non_blank(self.grade),
            phone_number: non_blank(self.phone_number),
            preferred_days,
            preferred_time,
        })
    }
}

pub fn parse_clock(value: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ValidationError::InvalidTime(value.to_string()))
}

/// Parses a 24-hour `HH:MM` time and returns it zero-padded.
pub fn parse_time(value: &str) -> Result<String, ValidationError> {
    parse_clock(value).map(|time| time.format("%H:%M").to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_and_dedupes() {
        let draft = StudentDraft {
            name: "  Amy Fernandes ".to_string(),
            grade: Some("  ".to_string()),
            phone_number: Some(" 98470 12345 ".to_string()),
            preferred_days: vec![Weekday::Mon, Weekday::Thu, Weekday::Mon],
            preferred_time: Some("7:05".to_string()),
        };

        let valid = draft.validate().unwrap();
        assert_eq!(valid.name, "Amy Fernandes");
        assert_eq!(valid.grade, None);
        assert_eq!(valid.phone_number.as_deref(), Some("98470 12345"));
        assert_eq!(valid.preferred_days, vec![Weekday::Mon, Weekday::Thu]);
        assert_eq!(valid.preferred_time.as_deref(), Some("07:05"));
    }

    #[test]
    fn validate_rejects_blank_name() {
        let draft = StudentDraft {
            name: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(draft.validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn parse_time_rejects_out_of_range() {
        assert_eq!(parse_time("18:30").unwrap(), "18:30");
        assert!(matches!(parse_time("25:00"), Err(ValidationError::InvalidTime(_))));
        assert!(matches!(parse_time("six thirty"), Err(ValidationError::InvalidTime(_))));
    }
}
