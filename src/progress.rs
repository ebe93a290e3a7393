//! Monthly attendance aggregation and progress classification.
//!
//! Everything here is a pure function over snapshots handed in by the caller.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::calendar::MonthWindow;
use crate::models::{AttendanceRecord, Student, StudentId, DEFAULT_PREFERRED_TIME};

pub const DEFAULT_TARGET_CLASSES: u32 = 12;

/// Counts at or above this are on track under the fixed policy. Also the
/// cut-off used by the summary's needing-attention tally.
pub const ON_TRACK_MIN: u32 = 8;
pub const NEEDS_ATTENTION_MIN: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Completed,
    OnTrack,
    NeedsAttention,
    Critical,
}

impl ProgressStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressStatus::Completed => "Completed",
            ProgressStatus::OnTrack => "On Track",
            ProgressStatus::NeedsAttention => "Needs Attention",
            ProgressStatus::Critical => "Critically Low",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which classification rule a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    Fixed,
    #[default]
    Pace,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown status policy {0:?}, expected `fixed` or `pace`")]
pub struct ParsePolicyError(String);

impl FromStr for StatusPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed-threshold" => Ok(StatusPolicy::Fixed),
            "pace" | "pace-relative" => Ok(StatusPolicy::Pace),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPolicy::Fixed => f.write_str("fixed"),
            StatusPolicy::Pace => f.write_str("pace"),
        }
    }
}

impl StatusPolicy {
    /// Binds the policy to a month as seen from `today`.
    pub fn rule_for(&self, window: &MonthWindow, today: NaiveDate) -> StatusRule {
        match self {
            StatusPolicy::Fixed => StatusRule::FixedThreshold,
            StatusPolicy::Pace => StatusRule::PaceRelative {
                elapsed_fraction: window.elapsed_fraction(today),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusRule {
    FixedThreshold,
    PaceRelative { elapsed_fraction: f64 },
}

/// Per-student class counts for one window. A missing key means zero.
///
/// Takes no roster: records are not checked against it, and the join with the
/// active students happens at lookup time in [`count_for`] and [`summarize`].
/// Counts for unknown students sit under keys no roster lookup will read.
pub fn aggregate_monthly_counts(records: &[AttendanceRecord]) -> HashMap<StudentId, u32> {
    let mut counts: HashMap<StudentId, u32> = HashMap::new();
    for record in records {
        *counts.entry(record.student_id).or_insert(0) += 1;
    }
    counts
}

pub fn count_for(counts: &HashMap<StudentId, u32>, student_id: &StudentId) -> u32 {
    counts.get(student_id).copied().unwrap_or(0)
}

pub fn classify_status(count: u32, target_classes: u32, rule: StatusRule) -> ProgressStatus {
    if count >= target_classes {
        return ProgressStatus::Completed;
    }

    match rule {
        StatusRule::FixedThreshold => match count {
            c if c >= ON_TRACK_MIN => ProgressStatus::OnTrack,
            c if c >= NEEDS_ATTENTION_MIN => ProgressStatus::NeedsAttention,
            _ => ProgressStatus::Critical,
        },
        StatusRule::PaceRelative { elapsed_fraction } => {
            let expected = elapsed_fraction * f64::from(target_classes);
            let diff = f64::from(count) - expected;
            if diff >= -1.0 {
                ProgressStatus::OnTrack
            } else if diff >= -3.0 {
                ProgressStatus::NeedsAttention
            } else {
                ProgressStatus::Critical
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub needing_attention: usize,
    pub total_classes: u32,
    pub average: f64,
    /// Share of students at or above target, as a percentage.
    pub completion_rate: f64,
}

/// Roster-level statistics. Only counts keyed by a listed student contribute.
pub fn summarize(
    students: &[Student],
    counts: &HashMap<StudentId, u32>,
    target_classes: u32,
) -> ProgressSummary {
    let total = students.len();
    let mut completed = 0usize;
    let mut needing_attention = 0usize;
    let mut total_classes = 0u32;

    for student in students {
        let count = count_for(counts, &student.id);
        total_classes += count;
        if count >= target_classes {
            completed += 1;
        } else if count < ON_TRACK_MIN {
            needing_attention += 1;
        }
    }

    let (average, completion_rate) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            f64::from(total_classes) / total as f64,
            completed as f64 / total as f64 * 100.0,
        )
    };

    ProgressSummary {
        total,
        completed,
        needing_attention,
        total_classes,
        average,
        completion_rate,
    }
}

/// Students who prefer `weekday` first, then by name. Equal names keep input order.
pub fn sort_by_preference_then_name(mut students: Vec<Student>, weekday: Weekday) -> Vec<Student> {
    students.sort_by(|a, b| {
        b.prefers(weekday)
            .cmp(&a.prefers(weekday))
            .then_with(|| compare_names(&a.name, &b.name))
    });
    students
}

/// Name ordering shared by roster listings.
///
/// Letters compare by base character first, ignoring case and accents, so
/// "Émile" sorts between "Amy" and "Zed". Names that differ only in accents
/// are then ordered unaccented first. Names differing only in case compare
/// equal.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().nfd().cmp(b.to_lowercase().nfd()))
}

fn collation_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn resolve_display_time(preferred_time: Option<&str>, attendance_time: Option<&str>) -> String {
    attendance_time
        .or(preferred_time)
        .unwrap_or(DEFAULT_PREFERRED_TIME)
        .to_string()
}

/// Progress toward target as a percentage, capped at 100.
pub fn completion_percentage(count: u32, target_classes: u32) -> f64 {
    if target_classes == 0 {
        return 100.0;
    }
    (f64::from(count) / f64::from(target_classes) * 100.0).min(100.0)
}

pub fn remaining_classes(count: u32, target_classes: u32) -> u32 {
    target_classes.saturating_sub(count)
}
