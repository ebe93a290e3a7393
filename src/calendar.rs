use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid month {0:?}, expected YYYY-MM")]
    InvalidMonth(String),
    #[error("unknown weekday {0:?}")]
    UnknownWeekday(String),
}

/// Inclusive calendar-month window: first day 00:00:00 through last day 23:59:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthWindow {
    first_day: NaiveDate,
}

impl MonthWindow {
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| CalendarError::InvalidMonth(format!("{year:04}-{month:02}")))
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date - Duration::days(i64::from(date.day0())),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day + Duration::days(i64::from(self.days_in_month()) - 1)
    }

    pub fn days_in_month(&self) -> u32 {
        let year = self.year();
        let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
        match self.month() {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            _ if leap => 29,
            _ => 28,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.first_day.and_time(NaiveTime::MIN)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.last_day().and_time(NaiveTime::MIN) + Duration::seconds(86_399)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start() && at <= self.end()
    }

    /// Share of the month that has passed as of `today`, by day of month.
    /// Months entirely in the past count as 1.0 and future months as 0.0.
    pub fn elapsed_fraction(&self, today: NaiveDate) -> f64 {
        if today < self.first_day {
            0.0
        } else if today > self.last_day() {
            1.0
        } else {
            f64::from(today.day()) / f64::from(self.days_in_month())
        }
    }

    /// Human label such as "March 2026".
    pub fn label(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }
}

impl fmt::Display for MonthWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthWindow {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CalendarError::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

/// Inclusive bounds of a single calendar day, to the millisecond.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    (start, start + Duration::milliseconds(86_399_999))
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "SUNDAY",
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
    }
}

/// Accepts full names or three-letter abbreviations in any case.
pub fn parse_weekday(value: &str) -> Result<Weekday, CalendarError> {
    let day = match value.trim().to_ascii_uppercase().as_str() {
        "SUNDAY" | "SUN" => Weekday::Sun,
        "MONDAY" | "MON" => Weekday::Mon,
        "TUESDAY" | "TUE" => Weekday::Tue,
        "WEDNESDAY" | "WED" => Weekday::Wed,
        "THURSDAY" | "THU" => Weekday::Thu,
        "FRIDAY" | "FRI" => Weekday::Fri,
        "SATURDAY" | "SAT" => Weekday::Sat,
        _ => return Err(CalendarError::UnknownWeekday(value.to_string())),
    };
    Ok(day)
}
