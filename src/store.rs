//! Storage collaborator seen by the service layer.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::models::{AttendanceId, AttendanceRecord, Student, StudentDraft, StudentId};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: uuid::Uuid },
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn list_active_students(&self) -> Result<Vec<Student>>;

    /// Records whose date falls in `[start, end]`, newest first.
    async fn list_attendance_in_window(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<AttendanceRecord>>;

    async fn create_attendance(
        &self,
        student_id: StudentId,
        date: NaiveDateTime,
        time: &str,
    ) -> Result<AttendanceRecord>;

    async fn update_attendance_time(&self, record_id: AttendanceId, new_time: &str) -> Result<()>;

    /// Removes the row outright.
    async fn delete_attendance(&self, record_id: AttendanceId) -> Result<()>;

    /// Inserts when `id` is `None`, otherwise overwrites that student and
    /// marks them active again.
    async fn create_or_update_student(
        &self,
        id: Option<StudentId>,
        draft: &StudentDraft,
    ) -> Result<Student>;

    /// Soft delete: the row stays, `is_active` becomes false.
    async fn deactivate_student(&self, student_id: StudentId) -> Result<()>;
}
