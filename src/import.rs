//! One-off roster import from a CSV export of the enrolment spreadsheet.
//!
//! Expected header: `NAME`, `GRADE`, `MOBILE NO`, `TUTION PERFERED DAY` plus the
//! two unnamed columns after it, and `TUTION PERFERED TIME` holding an Excel
//! date-time serial.

use std::io::Read;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use tracing::{info, warn};

use crate::calendar::parse_weekday;
use crate::models::StudentDraft;
use crate::store::AttendanceStore;

const NAME: &str = "NAME";
const GRADE: &str = "GRADE";
const MOBILE: &str = "MOBILE NO";
const PREFERRED_DAY: &str = "TUTION PERFERED DAY";
const PREFERRED_TIME: &str = "TUTION PERFERED TIME";

/// Continuation columns following the preferred-day column.
const EXTRA_DAY_COLUMNS: usize = 2;

/// Days between the Excel epoch (1899-12-30) and 1970-01-01.
const EXCEL_UNIX_EPOCH_DAYS: f64 = 25569.0;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column {0:?}")]
    MissingColumn(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub line: u64,
    pub name: String,
    pub grade: Option<String>,
    pub mobile: Option<String>,
    pub preferred_days: Vec<String>,
    pub preferred_time: Option<String>,
}

impl ImportRow {
    /// Unrecognised day names are dropped with a warning.
    pub fn to_draft(&self) -> StudentDraft {
        let preferred_days: Vec<Weekday> = self
            .preferred_days
            .iter()
            .filter_map(|day| match parse_weekday(day) {
                Ok(day) => Some(day),
                Err(err) => {
                    warn!(line = self.line, name = %self.name, "{err}");
                    None
                }
            })
            .collect();

        StudentDraft {
            name: self.name.clone(),
            grade: self.grade.clone(),
            phone_number: self.mobile.clone(),
            preferred_days,
            preferred_time: self.preferred_time.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
}

/// Converts an Excel serial (days since 1899-12-30, fraction = time of day)
/// to a timestamp, rounding the time down to whole seconds.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }

    let unix_days = (serial - EXCEL_UNIX_EPOCH_DAYS).floor() as i64;
    let date = NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(Duration::try_days(unix_days)?)?;

    // The small offset absorbs binary float error such as 0.7708333 * 86400 = 66599.99.
    let fractional_day = serial - serial.floor() + 0.000_000_1;
    let seconds = (86_400.0 * fractional_day).floor() as i64;

    date.and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::seconds(seconds))
}

/// `HH:MM` from a spreadsheet time cell, or `None` when it is not numeric.
pub fn excel_time_to_hhmm(cell: &str) -> Option<String> {
    let serial: f64 = cell.trim().parse().ok()?;
    excel_serial_to_datetime(serial).map(|at| at.format("%H:%M").to_string())
}

fn column(headers: &csv::StringRecord, name: &'static str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn cell(record: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn read_roster<R: Read>(reader: R) -> Result<Vec<ImportRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();

    let name_col = column(&headers, NAME).ok_or(ImportError::MissingColumn(NAME))?;
    let grade_col = column(&headers, GRADE);
    let mobile_col = column(&headers, MOBILE);
    let time_col = column(&headers, PREFERRED_TIME);
    let day_cols: Vec<usize> = match column(&headers, PREFERRED_DAY) {
        Some(first) => (first..=first + EXTRA_DAY_COLUMNS)
            .filter(|i| *i < headers.len() && Some(*i) != time_col)
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        rows.push(ImportRow {
            line,
            name: cell(&record, Some(name_col)).unwrap_or_default(),
            grade: cell(&record, grade_col),
            mobile: cell(&record, mobile_col),
            preferred_days: day_cols
                .iter()
                .filter_map(|i| cell(&record, Some(*i)))
                .collect(),
            preferred_time: cell(&record, time_col).and_then(|v| excel_time_to_hhmm(&v)),
        });
    }

    Ok(rows)
}

/// Creates an active student per row. Rows that fail are logged and skipped.
pub async fn import_roster<S>(store: &S, csv_path: &Path) -> anyhow::Result<ImportOutcome>
where
    S: AttendanceStore + ?Sized,
{
    let file = std::fs::File::open(csv_path)?;
    let rows = read_roster(file)?;
    info!(path = %csv_path.display(), rows = rows.len(), "importing roster");

    let mut outcome = ImportOutcome::default();
    for row in rows {
        let draft = match row.to_draft().validate() {
            Ok(draft) => draft,
            Err(err) => {
                warn!(line = row.line, "skipping row: {err}");
                outcome.skipped += 1;
                continue;
            }
        };

        match store.create_or_update_student(None, &draft).await {
            Ok(student) => {
                info!(student_id = %student.id, name = %student.name, "imported student");
                outcome.imported += 1;
            }
            Err(err) => {
                warn!(line = row.line, name = %draft.name, "failed to import: {err}");
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}
