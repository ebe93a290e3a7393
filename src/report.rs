use std::fmt::Write;

use crate::attendance::{MonthlyProgress, StudentProgress};

pub fn dashboard_line(row: &StudentProgress, target_classes: u32) -> String {
    format!(
        "- {} [{}] {}/{} classes ({:.0}%)",
        row.student.name,
        row.status,
        row.count,
        target_classes,
        row.percentage
    )
}

pub fn build_report(progress: &MonthlyProgress) -> String {
    let summary = &progress.summary;
    let target = progress.target_classes;
    let month_label = progress.month.label();
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report: {month_label}");
    let _ = writeln!(
        output,
        "Target {} classes per student, status policy `{}`",
        target, progress.policy
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Students: {}", summary.total);
    let _ = writeln!(output, "- Completed: {}", summary.completed);
    let _ = writeln!(output, "- Needing attention: {}", summary.needing_attention);
    let _ = writeln!(output, "- Total classes: {}", summary.total_classes);
    let _ = writeln!(output, "- Average per student: {:.1}", summary.average);
    let _ = writeln!(output, "- Completion rate: {:.0}%", summary.completion_rate);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");

    if progress.students.is_empty() {
        let _ = writeln!(output, "No active students.");
    }

    for row in &progress.students {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {}", row.student.name);
        let grade = row.student.grade.as_deref().unwrap_or("-");
        let _ = writeln!(
            output,
            "Grade {} | {}/{} classes | {} | {:.0}% complete | {} remaining",
            grade, row.count, target, row.status, row.percentage, row.remaining
        );

        if row.history.is_empty() {
            let _ = writeln!(output, "No classes attended in {month_label}.");
            continue;
        }

        let total = row.history.len();
        for (index, record) in row.history.iter().enumerate() {
            let _ = writeln!(
                output,
                "- {} at {} (class #{})",
                record.date.format("%a, %b %-d, %Y"),
                record.time,
                total - index
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MonthWindow;
    use crate::models::{AttendanceRecord, Student};
    use crate::progress::{ProgressStatus, ProgressSummary, StatusPolicy};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn sample_row(name: &str, days: &[u32]) -> StudentProgress {
        let id = Uuid::new_v4();
        let history: Vec<AttendanceRecord> = days
            .iter()
            .map(|day| AttendanceRecord {
                id: Uuid::new_v4(),
                student_id: id,
                date: NaiveDate::from_ymd_opt(2026, 3, *day)
                    .unwrap()
                    .and_hms_opt(18, 30, 0)
                    .unwrap(),
                time: "18:30".to_string(),
            })
            .collect();
        let count = history.len() as u32;

        StudentProgress {
            student: Student {
                id,
                name: name.to_string(),
                grade: Some("9".to_string()),
                phone_number: None,
                preferred_days: Vec::new(),
                preferred_time: None,
                is_active: true,
            },
            count,
            status: ProgressStatus::Critical,
            percentage: f64::from(count) / 12.0 * 100.0,
            remaining: 12 - count,
            history,
        }
    }

    fn sample_progress() -> MonthlyProgress {
        MonthlyProgress {
            month: MonthWindow::new(2026, 3).unwrap(),
            policy: StatusPolicy::Fixed,
            target_classes: 12,
            students: vec![sample_row("Aditi Menon", &[5, 2, 1]), sample_row("Rahul Nair", &[])],
            summary: ProgressSummary {
                total: 2,
                completed: 0,
                needing_attention: 2,
                total_classes: 3,
                average: 1.5,
                completion_rate: 0.0,
            },
        }
    }

    #[test]
    fn report_lists_history_newest_first() {
        let report = build_report(&sample_progress());

        assert!(report.starts_with("# Attendance Report: March 2026"));
        assert!(report.contains("- Average per student: 1.5"));
        assert!(report.contains("Grade 9 | 3/12 classes | Critically Low | 25% complete | 9 remaining"));
        assert!(report.contains("- Thu, Mar 5, 2026 at 18:30 (class #3)"));
        assert!(report.contains("- Sun, Mar 1, 2026 at 18:30 (class #1)"));
        assert!(report.contains("No classes attended in March 2026."));
    }

    #[test]
    fn dashboard_line_shows_status_and_progress() {
        let progress = sample_progress();
        assert_eq!(
            dashboard_line(&progress.students[0], 12),
            "- Aditi Menon [Critically Low] 3/12 classes (25%)"
        );
    }
}
