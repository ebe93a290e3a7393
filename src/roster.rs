//! Roster management. Removal is always a soft delete.

use tracing::info;

use crate::error::ServiceError;
use crate::models::{Student, StudentDraft, StudentId};
use crate::progress::compare_names;
use crate::store::{AttendanceStore, StoreError};

/// Active students ordered by name.
pub async fn list_students<S>(store: &S) -> Result<Vec<Student>, StoreError>
where
    S: AttendanceStore + ?Sized,
{
    let mut students = store.list_active_students().await?;
    students.sort_by(|a, b| compare_names(&a.name, &b.name));
    Ok(students)
}

pub async fn add_student<S>(store: &S, draft: StudentDraft) -> Result<Student, ServiceError>
where
    S: AttendanceStore + ?Sized,
{
    let draft = draft.validate()?;
    let student = store.create_or_update_student(None, &draft).await?;
    info!(student_id = %student.id, name = %student.name, "student added");
    Ok(student)
}

pub async fn edit_student<S>(
    store: &S,
    student_id: StudentId,
    draft: StudentDraft,
) -> Result<Student, ServiceError>
where
    S: AttendanceStore + ?Sized,
{
    let draft = draft.validate()?;
    let student = store.create_or_update_student(Some(student_id), &draft).await?;
    info!(%student_id, name = %student.name, "student updated");
    Ok(student)
}

pub async fn remove_student<S>(store: &S, student_id: StudentId) -> Result<(), ServiceError>
where
    S: AttendanceStore + ?Sized,
{
    store.deactivate_student(student_id).await?;
    info!(%student_id, "student deactivated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceRecord, ValidationError};
    use crate::store::memory::MemoryStore;
    use chrono::{NaiveDate, Weekday};
    use uuid::Uuid;

    fn draft(name: &str) -> StudentDraft {
        StudentDraft {
            name: name.to_string(),
            grade: Some("7".to_string()),
            phone_number: None,
            preferred_days: vec![Weekday::Sat],
            preferred_time: Some("16:00".to_string()),
        }
    }

    #[tokio::test]
    async fn add_edit_and_list() {
        let store = MemoryStore::default();
        let zed = add_student(&store, draft("Zed")).await.unwrap();
        add_student(&store, draft("amy")).await.unwrap();

        let mut changes = draft("Zed Kurian");
        changes.preferred_time = None;
        let edited = edit_student(&store, zed.id, changes).await.unwrap();
        assert_eq!(edited.id, zed.id);
        assert_eq!(edited.preferred_time, None);

        let names: Vec<String> = list_students(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["amy", "Zed Kurian"]);
    }

    #[tokio::test]
    async fn invalid_drafts_never_reach_storage() {
        let store = MemoryStore::default();
        let err = add_student(&store, draft("  ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::EmptyName)));

        let mut bad_time = draft("Amy");
        bad_time.preferred_time = Some("24:30".to_string());
        let err = add_student(&store, bad_time).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::InvalidTime(_))));
        assert!(store.all_students().is_empty());
    }

    #[tokio::test]
    async fn removal_keeps_the_row_and_its_attendance() {
        let store = MemoryStore::default();
        let amy = add_student(&store, draft("Amy")).await.unwrap();
        store.push_record(AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: amy.id,
            date: NaiveDate::from_ymd_opt(2026, 3, 7)
                .unwrap()
                .and_hms_opt(16, 0, 0)
                .unwrap(),
            time: "16:00".to_string(),
        });

        remove_student(&store, amy.id).await.unwrap();

        assert!(list_students(&store).await.unwrap().is_empty());
        let stored = store.all_students();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].is_active);
        assert_eq!(store.all_records().len(), 1);
    }

    #[tokio::test]
    async fn editing_a_removed_student_reactivates_them() {
        let store = MemoryStore::default();
        let amy = add_student(&store, draft("Amy")).await.unwrap();
        remove_student(&store, amy.id).await.unwrap();

        edit_student(&store, amy.id, draft("Amy")).await.unwrap();
        assert_eq!(list_students(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_unknown_student_is_not_found() {
        let store = MemoryStore::default();
        let err = remove_student(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound { .. })));
    }
}
