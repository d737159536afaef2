//! Five-field cron expressions (`minute hour day-of-month month day-of-week`), evaluated in UTC.
//!
//! Supported per field: `*`, `n`, `a-b`, `*/s`, `a-b/s`, `a/s`, comma lists, three-letter
//! month and weekday names. Day-of-week accepts `0..=7` with both `0` and `7` meaning Sunday.
//! When both day fields are restricted a time matches if either one does.
//! `@yearly`, `@monthly`, `@weekly`, `@daily` and `@hourly` are accepted as shorthands.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid {field} field: {value}")]
    InvalidField { field: &'static str, value: String },
}

const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// How far `next_after` searches before giving up.
const SEARCH_YEARS: i64 = 5;

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value the first name maps to.
    names_base: u32,
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[], names_base: 0 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], names_base: 0 };
const DOM: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], names_base: 0 };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: &MONTHS, names_base: 1 };
const DOW: FieldSpec = FieldSpec { name: "day-of-week", min: 0, max: 7, names: &WEEKDAYS, names_base: 0 };

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let expanded = match expr.trim() {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other => other,
        };
        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }
        let mut days_of_week = parse_field(fields[4], &DOW)?;
        // 7 is Sunday too
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }
        Ok(Self {
            minutes: parse_field(fields[0], &MINUTE)?,
            hours: parse_field(fields[1], &HOUR)?,
            days_of_month: parse_field(fields[2], &DOM)?,
            months: parse_field(fields[3], &MONTH)?,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// True when `t`'s minute is selected; seconds are ignored.
    pub fn matches(&self, t: &DateTime<Utc>) -> bool {
        bit(self.months, t.month())
            && self.day_matches(t)
            && bit(self.hours, t.hour())
            && bit(self.minutes, t.minute())
    }

    fn day_matches(&self, t: &DateTime<Utc>) -> bool {
        let dom = bit(self.days_of_month, t.day());
        let dow = bit(self.days_of_week, t.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// First matching minute strictly after `after`, or `None` within the search window.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)?;
        let limit = start + Duration::days(366 * SEARCH_YEARS);
        let mut t = start + Duration::minutes(1);
        while t <= limit {
            if !bit(self.months, t.month()) {
                let (y, m) = if t.month() == 12 { (t.year() + 1, 1) } else { (t.year(), t.month() + 1) };
                t = Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).single()?;
                continue;
            }
            if !self.day_matches(&t) {
                t = (t.date_naive() + Duration::days(1)).and_hms_opt(0, 0, 0)?.and_utc();
                continue;
            }
            if !bit(self.hours, t.hour()) {
                t = t.date_naive().and_hms_opt(t.hour(), 0, 0)?.and_utc() + Duration::hours(1);
                continue;
            }
            if !bit(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }
}

impl std::str::FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn bit(set: u64, v: u32) -> bool {
    set & (1u64 << v) != 0
}

fn parse_field(src: &str, spec: &FieldSpec) -> Result<u64, CronError> {
    let invalid = || CronError::InvalidField { field: spec.name, value: src.to_string() };
    let mut set = 0u64;
    for part in src.split(',') {
        if part.is_empty() {
            return Err(invalid());
        }
        let (range, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (r, Some(step))
            }
            None => (part, None),
        };
        let (lo, hi) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, spec).ok_or_else(invalid)?, parse_value(b, spec).ok_or_else(invalid)?)
        } else {
            let v = parse_value(range, spec).ok_or_else(invalid)?;
            // `a/s` runs from a to the field maximum
            if step.is_some() { (v, spec.max) } else { (v, v) }
        };
        if lo > hi {
            return Err(invalid());
        }
        let step = step.unwrap_or(1);
        let mut v = lo;
        while v <= hi {
            set |= 1u64 << v;
            v += step;
        }
    }
    Ok(set)
}

fn parse_value(s: &str, spec: &FieldSpec) -> Option<u32> {
    let v = match s.parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            let lower = s.to_ascii_lowercase();
            let idx = spec.names.iter().position(|n| *n == lower)?;
            idx as u32 + spec.names_base
        }
    };
    (spec.min..=spec.max).contains(&v).then_some(v)
}
