//! Attendance marking and monthly progress, fetched through an [`AttendanceStore`].

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use tracing::info;

use crate::calendar::{day_bounds, MonthWindow};
use crate::error::ServiceError;
use crate::models::{parse_clock, parse_time, AttendanceRecord, Student, StudentId};
use crate::progress::{
    aggregate_monthly_counts, classify_status, compare_names, completion_percentage, count_for,
    remaining_classes, resolve_display_time, sort_by_preference_then_name, summarize,
    ProgressStatus, ProgressSummary, StatusPolicy,
};
use crate::store::{AttendanceStore, StoreError};

#[derive(Debug, Clone)]
pub struct DaySheetRow {
    pub student: Student,
    pub record: Option<AttendanceRecord>,
    pub display_time: String,
    pub prefers_day: bool,
}

impl DaySheetRow {
    pub fn is_present(&self) -> bool {
        self.record.is_some()
    }
}

/// Active roster for one day, preferred students first.
#[derive(Debug, Clone)]
pub struct DaySheet {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub rows: Vec<DaySheetRow>,
}

impl DaySheet {
    pub fn row_for(&self, student_id: StudentId) -> Result<&DaySheetRow, ServiceError> {
        self.rows
            .iter()
            .find(|row| row.student.id == student_id)
            .ok_or(ServiceError::UnknownStudent(student_id))
    }

    pub fn present_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_present()).count()
    }
}

pub async fn day_sheet<S>(store: &S, date: NaiveDate) -> Result<DaySheet, StoreError>
where
    S: AttendanceStore + ?Sized,
{
    let students = store.list_active_students().await?;
    let (start, end) = day_bounds(date);
    let records = store.list_attendance_in_window(start, end).await?;

    // One record per student per day is expected; later rows overwrite earlier ones.
    let mut by_student: HashMap<StudentId, AttendanceRecord> = HashMap::new();
    for record in records {
        by_student.insert(record.student_id, record);
    }

    let weekday = date.weekday();
    let rows = sort_by_preference_then_name(students, weekday)
        .into_iter()
        .map(|student| {
            let record = by_student.remove(&student.id);
            let display_time = resolve_display_time(
                student.preferred_time.as_deref(),
                record.as_ref().map(|r| r.time.as_str()),
            );
            DaySheetRow {
                prefers_day: student.prefers(weekday),
                student,
                record,
                display_time,
            }
        })
        .collect();

    Ok(DaySheet {
        date,
        weekday,
        rows,
    })
}

/// Records attendance at the student's preferred time, or the default time.
pub async fn mark_present<S>(
    store: &S,
    sheet: &DaySheet,
    student_id: StudentId,
) -> Result<AttendanceRecord, ServiceError>
where
    S: AttendanceStore + ?Sized,
{
    let row = sheet.row_for(student_id)?;
    if row.is_present() {
        return Err(ServiceError::AlreadyPresent {
            name: row.student.name.clone(),
            date: sheet.date,
        });
    }

    let class_time = parse_clock(&resolve_display_time(row.student.preferred_time.as_deref(), None))?;
    let time = class_time.format("%H:%M").to_string();

    let record = store
        .create_attendance(student_id, sheet.date.and_time(class_time), &time)
        .await?;
    info!(student = %row.student.name, date = %sheet.date, %time, "marked present");
    Ok(record)
}

pub async fn update_time<S>(
    store: &S,
    sheet: &DaySheet,
    student_id: StudentId,
    new_time: &str,
) -> Result<(), ServiceError>
where
    S: AttendanceStore + ?Sized,
{
    let row = sheet.row_for(student_id)?;
    let record = row.record.as_ref().ok_or_else(|| ServiceError::NotPresent {
        name: row.student.name.clone(),
        date: sheet.date,
    })?;

    let time = parse_time(new_time)?;
    store.update_attendance_time(record.id, &time).await?;
    info!(student = %row.student.name, date = %sheet.date, %time, "attendance time updated");
    Ok(())
}

/// Hard-deletes the student's record for the sheet's day.
pub async fn remove<S>(store: &S, sheet: &DaySheet, student_id: StudentId) -> Result<(), ServiceError>
where
    S: AttendanceStore + ?Sized,
{
    let row = sheet.row_for(student_id)?;
    let record = row.record.as_ref().ok_or_else(|| ServiceError::NotPresent {
        name: row.student.name.clone(),
        date: sheet.date,
    })?;

    store.delete_attendance(record.id).await?;
    info!(student = %row.student.name, date = %sheet.date, "attendance removed");
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProgress {
    pub student: Student,
    pub count: u32,
    pub status: ProgressStatus,
    pub percentage: f64,
    pub remaining: u32,
    /// Records in the window, newest first.
    pub history: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyProgress {
    pub month: MonthWindow,
    pub policy: StatusPolicy,
    pub target_classes: u32,
    pub students: Vec<StudentProgress>,
    pub summary: ProgressSummary,
}

pub async fn monthly_progress<S>(
    store: &S,
    month: MonthWindow,
    policy: StatusPolicy,
    target_classes: u32,
    today: NaiveDate,
) -> Result<MonthlyProgress, StoreError>
where
    S: AttendanceStore + ?Sized,
{
    let mut students = store.list_active_students().await?;
    students.sort_by(|a, b| compare_names(&a.name, &b.name));

    let mut records = store
        .list_attendance_in_window(month.start(), month.end())
        .await?;
    records.retain(|record| month.contains(record.date));
    records.sort_by(|a, b| b.date.cmp(&a.date));

    let counts = aggregate_monthly_counts(&records);
    let summary = summarize(&students, &counts, target_classes);
    let rule = policy.rule_for(&month, today);

    let mut history: HashMap<StudentId, Vec<AttendanceRecord>> = HashMap::new();
    for record in records {
        history.entry(record.student_id).or_default().push(record);
    }

    let students = students
        .into_iter()
        .map(|student| {
            let count = count_for(&counts, &student.id);
            StudentProgress {
                status: classify_status(count, target_classes, rule),
                percentage: completion_percentage(count, target_classes),
                remaining: remaining_classes(count, target_classes),
                history: history.remove(&student.id).unwrap_or_default(),
                count,
                student,
            }
        })
        .collect();

    info!(
        month = %month,
        %policy,
        students = summary.total,
        classes = summary.total_classes,
        "computed monthly progress"
    );

    Ok(MonthlyProgress {
        month,
        policy,
        target_classes,
        students,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use uuid::Uuid;

    fn student(name: &str, days: &[Weekday], time: Option<&str>) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
            grade: None,
            phone_number: None,
            preferred_days: days.to_vec(),
            preferred_time: time.map(str::to_string),
            is_active: true,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_on(student_id: StudentId, day: NaiveDate, time: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            date: day.and_hms_opt(9, 0, 0).unwrap(),
            time: time.to_string(),
        }
    }

    #[tokio::test]
    async fn day_sheet_orders_and_resolves_times() {
        // 2026-03-03 is a Tuesday.
        let day = date(2026, 3, 3);
        let zed = student("Zed", &[], Some("17:00"));
        let amy = student("Amy", &[Weekday::Tue], None);
        let bob = student("Bob", &[], None);
        let store = MemoryStore::with_students(vec![zed.clone(), amy.clone(), bob.clone()]);
        store.push_record(record_on(zed.id, day, "19:15"));
        store.push_record(record_on(bob.id, date(2026, 3, 4), "16:00"));

        let sheet = day_sheet(&store, day).await.unwrap();
        let names: Vec<&str> = sheet.rows.iter().map(|r| r.student.name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Bob", "Zed"]);
        assert_eq!(sheet.weekday, Weekday::Tue);
        assert!(sheet.rows[0].prefers_day);
        assert_eq!(sheet.rows[0].display_time, "18:30");
        assert!(!sheet.rows[1].is_present());
        assert_eq!(sheet.rows[2].display_time, "19:15");
        assert_eq!(sheet.present_count(), 1);
    }

    #[tokio::test]
    async fn mark_present_uses_preferred_time() {
        let day = date(2026, 3, 3);
        let amy = student("Amy", &[], Some("17:45"));
        let store = MemoryStore::with_students(vec![amy.clone()]);

        let sheet = day_sheet(&store, day).await.unwrap();
        let record = mark_present(&store, &sheet, amy.id).await.unwrap();
        assert_eq!(record.time, "17:45");
        assert_eq!(record.date, day.and_hms_opt(17, 45, 0).unwrap());

        let sheet = day_sheet(&store, day).await.unwrap();
        let err = mark_present(&store, &sheet, amy.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyPresent { .. }));
        assert_eq!(store.all_records().len(), 1);
    }

    #[tokio::test]
    async fn mark_present_rejects_unknown_student() {
        let store = MemoryStore::default();
        let sheet = day_sheet(&store, date(2026, 3, 3)).await.unwrap();
        let err = mark_present(&store, &sheet, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::UnknownStudent(_)));
    }

    #[tokio::test]
    async fn time_edit_and_removal_touch_only_that_day() {
        let day = date(2026, 3, 3);
        let amy = student("Amy", &[], None);
        let store = MemoryStore::with_students(vec![amy.clone()]);
        store.push_record(record_on(amy.id, date(2026, 3, 2), "18:30"));

        let sheet = day_sheet(&store, day).await.unwrap();
        let err = update_time(&store, &sheet, amy.id, "19:00").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotPresent { .. }));

        mark_present(&store, &sheet, amy.id).await.unwrap();
        let sheet = day_sheet(&store, day).await.unwrap();

        let err = update_time(&store, &sheet, amy.id, "7pm").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        update_time(&store, &sheet, amy.id, "19:05").await.unwrap();
        let sheet = day_sheet(&store, day).await.unwrap();
        assert_eq!(sheet.rows[0].display_time, "19:05");

        remove(&store, &sheet, amy.id).await.unwrap();
        let remaining = store.all_records();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].date.date(), date(2026, 3, 2));
    }

    #[tokio::test]
    async fn monthly_progress_counts_and_classifies() {
        let amy = student("Amy", &[], None);
        let bob = student("bob", &[], None);
        let gone = student("Gone", &[], None);
        let store = MemoryStore::with_students(vec![bob.clone(), amy.clone(), gone.clone()]);
        for day in 1..=12 {
            store.push_record(record_on(amy.id, date(2026, 9, day), "18:30"));
        }
        for day in [2, 9] {
            store.push_record(record_on(bob.id, date(2026, 9, day), "18:30"));
        }
        store.push_record(record_on(gone.id, date(2026, 9, 3), "18:30"));
        store.push_record(record_on(bob.id, date(2026, 10, 1), "18:30"));
        store.deactivate_student(gone.id).await.unwrap();

        let month = MonthWindow::new(2026, 9).unwrap();
        let progress = monthly_progress(&store, month, StatusPolicy::Pace, 12, date(2026, 9, 15))
            .await
            .unwrap();

        assert_eq!(progress.students.len(), 2);
        let amy_row = &progress.students[0];
        assert_eq!(amy_row.student.name, "Amy");
        assert_eq!(amy_row.count, 12);
        assert_eq!(amy_row.status, ProgressStatus::Completed);
        assert_eq!(amy_row.remaining, 0);
        assert_eq!(amy_row.history[0].date.date(), date(2026, 9, 12));

        let bob_row = &progress.students[1];
        assert_eq!(bob_row.count, 2);
        assert_eq!(bob_row.status, ProgressStatus::Critical);

        assert_eq!(progress.summary.total, 2);
        assert_eq!(progress.summary.completed, 1);
        assert_eq!(progress.summary.needing_attention, 1);
        assert_eq!(progress.summary.total_classes, 14);
    }

    #[tokio::test]
    async fn fixed_policy_ignores_the_calendar() {
        let amy = student("Amy", &[], None);
        let store = MemoryStore::with_students(vec![amy.clone()]);
        for day in 1..=8 {
            store.push_record(record_on(amy.id, date(2026, 9, day), "18:30"));
        }

        let month = MonthWindow::new(2026, 9).unwrap();
        let progress = monthly_progress(&store, month, StatusPolicy::Fixed, 12, date(2026, 11, 1))
            .await
            .unwrap();
        assert_eq!(progress.students[0].status, ProgressStatus::OnTrack);
    }
}
