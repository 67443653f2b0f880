//! Date and hour normalization.
//!
//! Strings are read digit by digit with a pattern match. They never go
//! through a parse-then-format round trip, which would reinterpret them in a
//! UTC or local offset and move the printed day or hour near midnight. Only
//! structured values are read through local calendar fields.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::source::InspectionDate;

/// Placeholder for a date that is missing or unreadable.
pub const MISSING: &str = "-";

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{4})-(\d{1,2})-(\d{1,2})(?:[T\s](\d{1,2}):(\d{2}))?").unwrap()
});

static DMY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2})/(\d{1,2})/(\d{4})(?:[T\s,]+(\d{1,2}):(\d{2}))?").unwrap()
});

static CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,2}):(\d{2})(?::\d{2}(?:\.\d+)?)?\s*$").unwrap());

/// Calendar fields extracted from a date, without any time zone attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarStamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub time: Option<(u32, u32)>,
}

impl CalendarStamp {
    /// `dd/mm/yyyy`
    pub fn date_display(&self) -> String {
        format!("{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }

    /// `HH:MM`, 24-hour.
    pub fn hour_display(&self) -> Option<String> {
        self.time.map(|(h, m)| format!("{:02}:{:02}", h, m))
    }

    fn from_fields(year: i32, month: u32, day: u32, time: Option<(u32, u32)>) -> Option<Self> {
        // Checks the day against its month and year; no offset is involved.
        NaiveDate::from_ymd_opt(year, month, day)?;
        if let Some((h, m)) = time {
            if h > 23 || m > 59 {
                return None;
            }
        }
        Some(Self { year, month, day, time })
    }

    fn from_local(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            time: Some((dt.hour(), dt.minute())),
        }
    }
}

/// Extract calendar fields from any supported date representation.
pub fn stamp(date: &InspectionDate) -> Option<CalendarStamp> {
    match date {
        InspectionDate::Text(text) => parse_text(text),
        InspectionDate::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(|utc| CalendarStamp::from_local(utc.with_timezone(&Local).naive_local())),
        InspectionDate::Calendar(dt) => Some(CalendarStamp::from_local(*dt)),
    }
}

/// Read `yyyy-mm-dd[THH:MM...]` or `dd/mm/yyyy[ HH:MM]` from the digits.
pub fn parse_text(text: &str) -> Option<CalendarStamp> {
    if let Some(caps) = ISO_DATE.captures(text) {
        let time = clock_from(caps.get(4), caps.get(5));
        return CalendarStamp::from_fields(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
            time,
        );
    }
    if let Some(caps) = DMY_DATE.captures(text) {
        let time = clock_from(caps.get(4), caps.get(5));
        return CalendarStamp::from_fields(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
            time,
        );
    }
    None
}

fn clock_from(hour: Option<regex::Match<'_>>, minute: Option<regex::Match<'_>>) -> Option<(u32, u32)> {
    let h = hour?.as_str().parse().ok()?;
    let m = minute?.as_str().parse().ok()?;
    Some((h, m))
}

/// `dd/mm/yyyy`, or `-` when absent or unreadable.
pub fn display_date(date: Option<&InspectionDate>) -> String {
    date.and_then(stamp)
        .map(|s| s.date_display())
        .unwrap_or_else(|| MISSING.to_string())
}

/// `HH:MM` when the value carries a time of day.
pub fn display_hour(date: Option<&InspectionDate>) -> Option<String> {
    date.and_then(stamp).and_then(|s| s.hour_display())
}

/// `dd/mm/yyyy HH:MM`, the date alone when there is no time, or `-`.
pub fn display_date_time(date: Option<&InspectionDate>) -> String {
    match date.and_then(stamp) {
        Some(s) => match s.hour_display() {
            Some(hour) => format!("{} {}", s.date_display(), hour),
            None => s.date_display(),
        },
        None => MISSING.to_string(),
    }
}

/// Normalize an hour entered as `H:MM`, `HH:MM:SS` or a full date-time.
pub fn normalize_hour(text: &str) -> Option<String> {
    if let Some(caps) = CLOCK.captures(text) {
        let h: u32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        if h > 23 || m > 59 {
            return None;
        }
        return Some(format!("{:02}:{:02}", h, m));
    }
    parse_text(text).and_then(|s| s.hour_display())
}
