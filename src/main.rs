use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

mod attendance;
mod calendar;
mod config;
mod db;
mod error;
mod import;
mod models;
mod progress;
mod report;
mod roster;
mod store;

use crate::calendar::{parse_weekday, weekday_name, MonthWindow};
use crate::config::Config;
use crate::db::PgStore;
use crate::models::{StudentDraft, DEFAULT_PREFERRED_TIME};
use crate::progress::StatusPolicy;

#[derive(Parser)]
#[command(name = "tutor-attendance")]
#[command(about = "Student roster, attendance and monthly progress for a tutoring practice", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo roster with attendance for the current month
    Seed,
    /// Import students from a CSV export of the enrolment spreadsheet
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Manage the student roster
    #[command(subcommand)]
    Students(StudentCommands),
    /// Mark and edit daily attendance
    #[command(subcommand)]
    Attendance(AttendanceCommands),
    /// Show monthly progress per student
    Dashboard {
        /// Month as YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<MonthWindow>,
        #[arg(long)]
        policy: Option<StatusPolicy>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown attendance report for a month
    Report {
        #[arg(long)]
        month: Option<MonthWindow>,
        #[arg(long)]
        policy: Option<StatusPolicy>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum StudentCommands {
    /// List active students
    List,
    /// Add a student
    Add(StudentFields),
    /// Edit a student; omitted fields keep their current values
    Edit {
        id: Uuid,
        #[command(flatten)]
        fields: StudentEdits,
    },
    /// Deactivate a student (attendance history is kept)
    Remove { id: Uuid },
}

#[derive(Args)]
struct StudentFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    grade: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// Preferred weekday, repeatable
    #[arg(long = "day", value_parser = parse_weekday)]
    days: Vec<Weekday>,
    #[arg(long, default_value = DEFAULT_PREFERRED_TIME)]
    time: String,
}

#[derive(Args)]
struct StudentEdits {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    grade: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// Replaces the preferred weekdays, repeatable
    #[arg(long = "day", value_parser = parse_weekday)]
    days: Vec<Weekday>,
    /// Clears the preferred weekdays
    #[arg(long, conflicts_with = "days")]
    clear_days: bool,
    #[arg(long)]
    time: Option<String>,
}

#[derive(Subcommand)]
enum AttendanceCommands {
    /// Show the attendance sheet for a day
    Day {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Mark a student present at their preferred time
    Mark {
        student: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Change the recorded class time
    SetTime {
        student: Uuid,
        #[arg(long)]
        time: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete the attendance record for a day
    Remove {
        student: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutor_attendance=info,sqlx=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    let pool = db::connect(&config.database_url, config.max_connections).await?;
    let store = PgStore::new(pool.clone());
    let today = Local::now().date_naive();

    tracing::debug!(policy = %config.status_policy, target = config.target_classes, "configuration loaded");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, today).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let outcome = import::import_roster(&store, &csv)
                .await
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!(
                "Imported {} students from {} ({} skipped).",
                outcome.imported,
                csv.display(),
                outcome.skipped
            );
        }
        Commands::Students(command) => run_students(&store, command).await?,
        Commands::Attendance(command) => run_attendance(&store, command, today).await?,
        Commands::Dashboard {
            month,
            policy,
            json,
        } => {
            let month = month.unwrap_or_else(|| MonthWindow::containing(today));
            let policy = policy.unwrap_or(config.status_policy);
            let progress =
                attendance::monthly_progress(&store, month, policy, config.target_classes, today)
                    .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
                return Ok(());
            }

            println!("Monthly progress for {}:", month.label());
            if progress.students.is_empty() {
                println!("No active students.");
            }
            for row in &progress.students {
                println!("{}", report::dashboard_line(row, config.target_classes));
            }
            let summary = &progress.summary;
            println!(
                "{} students, {} completed, {} needing attention, {} classes (avg {:.1})",
                summary.total,
                summary.completed,
                summary.needing_attention,
                summary.total_classes,
                summary.average
            );
        }
        Commands::Report { month, policy, out } => {
            let month = month.unwrap_or_else(|| MonthWindow::containing(today));
            let policy = policy.unwrap_or(config.status_policy);
            let progress =
                attendance::monthly_progress(&store, month, policy, config.target_classes, today)
                    .await?;
            let report = report::build_report(&progress);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn run_students(store: &PgStore, command: StudentCommands) -> anyhow::Result<()> {
    match command {
        StudentCommands::List => {
            let students = roster::list_students(store).await?;
            if students.is_empty() {
                println!("No students found. Add one to get started.");
            }
            for student in students {
                let days: Vec<&str> = student
                    .preferred_days
                    .iter()
                    .map(|day| weekday_name(*day))
                    .collect();
                println!(
                    "{}  {} (grade {}, {}) {} @ {}",
                    student.id,
                    student.name,
                    student.grade.as_deref().unwrap_or("-"),
                    student.phone_number.as_deref().unwrap_or("-"),
                    days.join(", "),
                    student.preferred_time.as_deref().unwrap_or(DEFAULT_PREFERRED_TIME)
                );
            }
        }
        StudentCommands::Add(fields) => {
            let student = roster::add_student(
                store,
                StudentDraft {
                    name: fields.name,
                    grade: fields.grade,
                    phone_number: fields.phone,
                    preferred_days: fields.days,
                    preferred_time: Some(fields.time),
                },
            )
            .await?;
            println!("Added {} ({}).", student.name, student.id);
        }
        StudentCommands::Edit { id, fields } => {
            let current = roster::list_students(store)
                .await?
                .into_iter()
                .find(|s| s.id == id)
                .with_context(|| format!("no active student with id {id}"))?;

            let preferred_days = if fields.clear_days {
                Vec::new()
            } else if fields.days.is_empty() {
                current.preferred_days
            } else {
                fields.days
            };

            let student = roster::edit_student(
                store,
                id,
                StudentDraft {
                    name: fields.name.unwrap_or(current.name),
                    grade: fields.grade.or(current.grade),
                    phone_number: fields.phone.or(current.phone_number),
                    preferred_days,
                    preferred_time: fields.time.or(current.preferred_time),
                },
            )
            .await?;
            println!("Updated {} ({}).", student.name, student.id);
        }
        StudentCommands::Remove { id } => {
            roster::remove_student(store, id).await?;
            println!("Student {id} deactivated.");
        }
    }

    Ok(())
}

async fn run_attendance(
    store: &PgStore,
    command: AttendanceCommands,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match command {
        AttendanceCommands::Day { date } => {
            let sheet = attendance::day_sheet(store, date.unwrap_or(today)).await?;
            println!("Attendance for {} ({}):", sheet.date, weekday_name(sheet.weekday));
            for row in &sheet.rows {
                println!(
                    "[{}] {} {}  {} {}",
                    if row.is_present() { "x" } else { " " },
                    row.display_time,
                    if row.prefers_day { "*" } else { " " },
                    row.student.name,
                    row.student.id
                );
            }
            println!("{} of {} present.", sheet.present_count(), sheet.rows.len());
        }
        AttendanceCommands::Mark { student, date } => {
            let sheet = attendance::day_sheet(store, date.unwrap_or(today)).await?;
            let record = attendance::mark_present(store, &sheet, student).await?;
            println!("Marked present on {} at {}.", sheet.date, record.time);
        }
        AttendanceCommands::SetTime {
            student,
            time,
            date,
        } => {
            let sheet = attendance::day_sheet(store, date.unwrap_or(today)).await?;
            attendance::update_time(store, &sheet, student, &time).await?;
            println!("Updated class time on {}.", sheet.date);
        }
        AttendanceCommands::Remove { student, date } => {
            let sheet = attendance::day_sheet(store, date.unwrap_or(today)).await?;
            attendance::remove(store, &sheet, student).await?;
            println!("Removed attendance on {}.", sheet.date);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_month_policy_and_days() {
        let cli = Cli::try_parse_from([
            "tutor-attendance",
            "dashboard",
            "--month",
            "2026-03",
            "--policy",
            "fixed",
        ])
        .unwrap();
        match cli.command {
            Commands::Dashboard { month, policy, .. } => {
                assert_eq!(month, Some(MonthWindow::new(2026, 3).unwrap()));
                assert_eq!(policy, Some(StatusPolicy::Fixed));
            }
            _ => panic!("expected dashboard"),
        }

        let cli = Cli::try_parse_from([
            "tutor-attendance",
            "students",
            "add",
            "--name",
            "Amy",
            "--day",
            "monday",
            "--day",
            "THU",
        ])
        .unwrap();
        match cli.command {
            Commands::Students(StudentCommands::Add(fields)) => {
                assert_eq!(fields.days, vec![Weekday::Mon, Weekday::Thu]);
                assert_eq!(fields.time, "18:30");
            }
            _ => panic!("expected students add"),
        }
    }

    #[test]
    fn rejects_bad_month() {
        assert!(Cli::try_parse_from(["tutor-attendance", "report", "--month", "2026-13"]).is_err());
    }
}
