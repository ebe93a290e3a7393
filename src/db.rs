use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::{parse_weekday, weekday_name, MonthWindow};
use crate::models::{AttendanceId, AttendanceRecord, Student, StudentDraft, StudentId};
use crate::store::{AttendanceStore, Result, StoreError};

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed [`AttendanceStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn student_from_row(row: &PgRow) -> Student {
    let id: Uuid = row.get("id");
    let day_names: Vec<String> = row.get("preferred_days");
    let preferred_days = day_names
        .iter()
        .filter_map(|name| match parse_weekday(name) {
            Ok(day) => Some(day),
            Err(err) => {
                warn!(student_id = %id, "skipping stored preferred day: {err}");
                None
            }
        })
        .collect();

    Student {
        id,
        name: row.get("name"),
        grade: row.get("grade"),
        phone_number: row.get("phone_number"),
        preferred_days,
        preferred_time: row.get("preferred_time"),
        is_active: row.get("is_active"),
    }
}

fn day_names(days: &[Weekday]) -> Vec<String> {
    days.iter().map(|day| weekday_name(*day).to_string()).collect()
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn list_active_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, grade, phone_number, preferred_days, preferred_time, is_active
            FROM tutoring.students
            WHERE is_active = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "fetched active students");
        Ok(rows.iter().map(student_from_row).collect())
    }

    async fn list_attendance_in_window(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, class_date, class_time
            FROM tutoring.attendance
            WHERE class_date >= $1 AND class_date <= $2
            ORDER BY class_date DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(AttendanceRecord {
                id: row.get("id"),
                student_id: row.get("student_id"),
                date: row.get("class_date"),
                time: row.get("class_time"),
            });
        }

        debug!(%start, %end, count = records.len(), "fetched attendance window");
        Ok(records)
    }

    async fn create_attendance(
        &self,
        student_id: StudentId,
        date: NaiveDateTime,
        time: &str,
    ) -> Result<AttendanceRecord> {
        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            date,
            time: time.to_string(),
        };

        sqlx::query(
            r#"
            INSERT INTO tutoring.attendance (id, student_id, class_date, class_time)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id)
        .bind(record.student_id)
        .bind(record.date)
        .bind(&record.time)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_attendance_time(&self, record_id: AttendanceId, new_time: &str) -> Result<()> {
        let result = sqlx::query("UPDATE tutoring.attendance SET class_time = $2 WHERE id = $1")
            .bind(record_id)
            .bind(new_time)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "attendance record",
                id: record_id,
            });
        }
        Ok(())
    }

    async fn delete_attendance(&self, record_id: AttendanceId) -> Result<()> {
        let result = sqlx::query("DELETE FROM tutoring.attendance WHERE id = $1")
            .bind(record_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "attendance record",
                id: record_id,
            });
        }
        Ok(())
    }

    async fn create_or_update_student(
        &self,
        id: Option<StudentId>,
        draft: &StudentDraft,
    ) -> Result<Student> {
        let days = day_names(&draft.preferred_days);

        let row = match id {
            Some(id) => sqlx::query(
                r#"
                UPDATE tutoring.students
                SET name = $2, grade = $3, phone_number = $4, preferred_days = $5,
                    preferred_time = $6, is_active = TRUE, updated_at = now()
                WHERE id = $1
                RETURNING id, name, grade, phone_number, preferred_days, preferred_time, is_active
                "#,
            )
            .bind(id)
            .bind(&draft.name)
            .bind(&draft.grade)
            .bind(&draft.phone_number)
            .bind(&days)
            .bind(&draft.preferred_time)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "student", id })?,
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO tutoring.students
                    (id, name, grade, phone_number, preferred_days, preferred_time, is_active)
                    VALUES ($1, $2, $3, $4, $5, $6, TRUE)
                    RETURNING id, name, grade, phone_number, preferred_days, preferred_time, is_active
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&draft.name)
                .bind(&draft.grade)
                .bind(&draft.phone_number)
                .bind(&days)
                .bind(&draft.preferred_time)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(student_from_row(&row))
    }

    async fn deactivate_student(&self, student_id: StudentId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tutoring.students SET is_active = FALSE, updated_at = now() WHERE id = $1",
        )
        .bind(student_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "student",
                id: student_id,
            });
        }
        Ok(())
    }
}

/// Loads a small demo roster and some attendance for the month containing `today`.
pub async fn seed(pool: &PgPool, today: NaiveDate) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Aditi Menon",
            "9",
            "98470 11223",
            vec![Weekday::Mon, Weekday::Thu],
            "17:00",
            vec![2, 5, 9, 12, 16, 19, 23, 26, 29],
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Rahul Nair",
            "10",
            "98950 44556",
            vec![Weekday::Tue, Weekday::Fri, Weekday::Sat],
            "18:30",
            vec![3, 6, 7, 10, 13, 14, 17, 20, 21, 24, 27, 28],
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Sneha Thomas",
            "8",
            "94470 77889",
            vec![Weekday::Wed],
            "19:15",
            vec![4, 18],
        ),
    ];

    let window = MonthWindow::containing(today);
    let mut inserted = 0u64;

    for (id, name, grade, phone, days, time, class_days) in students {
        sqlx::query(
            r#"
            INSERT INTO tutoring.students
            (id, name, grade, phone_number, preferred_days, preferred_time, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, grade = EXCLUDED.grade,
                phone_number = EXCLUDED.phone_number,
                preferred_days = EXCLUDED.preferred_days,
                preferred_time = EXCLUDED.preferred_time,
                is_active = TRUE, updated_at = now()
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(grade)
        .bind(phone)
        .bind(day_names(&days))
        .bind(time)
        .execute(pool)
        .await?;

        let class_time = NaiveTime::parse_from_str(time, "%H:%M").context("invalid seed time")?;
        for day in class_days {
            let date = window.first_day() + Duration::days(i64::from(day) - 1);
            if date > today || date > window.last_day() {
                continue;
            }

            let result = sqlx::query(
                r#"
                INSERT INTO tutoring.attendance (id, student_id, class_date, class_time)
                SELECT $1, $2, $3, $4
                WHERE NOT EXISTS (
                    SELECT 1 FROM tutoring.attendance
                    WHERE student_id = $2 AND class_date = $3
                )
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(date.and_time(class_time))
            .bind(time)
            .execute(pool)
            .await?;
            inserted += result.rows_affected();
        }
    }

    info!(month = %window, inserted, "seed attendance loaded");
    Ok(())
}
