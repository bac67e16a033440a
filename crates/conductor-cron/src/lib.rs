//! Five-field POSIX-style cron expressions: parsing, validation, a
//! human-readable description, and `next()` for computing the next run
//! after a given instant.
//!
//! The reference system's scheduler (`skynet-scheduler::schedule::
//! compute_next_run`) stubs cron support out entirely and only resolves
//! `Once`/`Interval`/`Daily`/`Weekly` schedules. This crate fills that
//! gap with a full evaluator, built the same brute-force way the
//! reference scheduler resolves its other schedule kinds (walk forward
//! from `from` until a candidate matches) rather than deriving the next
//! run analytically.

mod error;
mod field;

pub use error::{CronError, Result};

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use field::{parse_field, FieldSet};

/// One year of minutes. Cron expressions that (due to an impossible
/// day-of-month/month combination, e.g. `0 0 31 2 *`) never fire within a
/// year are reported as `CronError::Unreachable` rather than looping
/// forever.
const LOOKAHEAD_MINUTES: i64 = 366 * 24 * 60;

struct Expr {
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
}

impl Expr {
    fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::BadExpression {
                expr: expr.to_string(),
                reason: format!("expected 5 fields, found {}", fields.len()),
            });
        }
        Ok(Expr {
            minute: parse_field(fields[0], "minute", 0, 59)?,
            hour: parse_field(fields[1], "hour", 0, 23)?,
            day_of_month: parse_field(fields[2], "day_of_month", 1, 31)?,
            month: parse_field(fields[3], "month", 1, 12)?,
            day_of_week: parse_field(fields[4], "day_of_week", 0, 6)?,
        })
    }

    /// AND across all five fields, including day-of-month and day-of-week.
    /// Real POSIX cron treats those two as OR'd together when both are
    /// restricted; this evaluator intersects them instead, per this
    /// system's own cron semantics.
    fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day_of_month.matches(dt.day())
            && self.month.matches(dt.month())
            && self.day_of_week.matches(dt.weekday().num_days_from_sunday())
    }
}

/// Returns the next instant strictly after `from` at which `expr` fires.
pub fn next(expr: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let parsed = Expr::parse(expr)?;

    let start = from
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(from)
        + Duration::minutes(1);

    let mut candidate = start;
    for _ in 0..LOOKAHEAD_MINUTES {
        if parsed.matches(&candidate) {
            return Ok(candidate);
        }
        candidate += Duration::minutes(1);
    }

    Err(CronError::Unreachable {
        expr: expr.to_string(),
    })
}

/// Parses `expr` without computing a run, for upfront validation (e.g.
/// when a user creates a scheduled task).
pub fn is_valid(expr: &str) -> bool {
    Expr::parse(expr).is_ok()
}

/// A short human-readable summary, used in task listings. Not a full
/// natural-language renderer — falls back to echoing the raw expression
/// for anything beyond the common cases.
pub fn describe(expr: &str) -> String {
    if Expr::parse(expr).is_err() {
        return format!("invalid cron expression: {expr}");
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.as_slice() {
        [minute, "*", "*", "*", "*"] if minute.starts_with("*/") => {
            format!("every {} minutes", &minute[2..])
        }
        [minute, hour, "*", "*", "*"] => {
            format!("daily at {hour}:{minute:0>2}")
        }
        [minute, hour, "*", "*", dow] => {
            format!("at {hour}:{minute:0>2} on day-of-week {dow}")
        }
        _ => format!("cron: {expr}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn every_five_minutes_rolls_forward() {
        let from = dt("2024-06-15T10:30:00Z");
        let got = next("*/5 * * * *", from).unwrap();
        assert_eq!(got, dt("2024-06-15T10:35:00Z"));
    }

    #[test]
    fn weekdays_skip_weekend() {
        // 2024-06-15 is a Saturday.
        let from = dt("2024-06-15T09:00:00Z");
        let got = next("0 9 * * 1-5", from).unwrap();
        assert_eq!(got, dt("2024-06-17T09:00:00Z"));
        let dow = got.weekday().num_days_from_sunday();
        assert!((1..=5).contains(&dow));
    }

    #[test]
    fn next_is_strictly_after_and_matches() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let got = next("30 14 * * *", from).unwrap();
        assert!(got > from);
        assert_eq!(got.hour(), 14);
        assert_eq!(got.minute(), 30);
    }

    #[test]
    fn next_is_monotonic_when_chained() {
        let from = dt("2024-06-15T10:30:00Z");
        let first = next("*/5 * * * *", from).unwrap();
        let second = next("*/5 * * * *", first).unwrap();
        assert!(second > first);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(!is_valid("* * * *"));
        assert!(Expr::parse("* * * *").is_err());
    }

    #[test]
    fn rejects_out_of_range_value() {
        assert!(!is_valid("60 * * * *"));
        assert!(!is_valid("* 24 * * *"));
    }

    #[test]
    fn step_ranges_expand_correctly() {
        let parsed = Expr::parse("0 9-17/2 * * *").unwrap();
        for h in [9, 11, 13, 15, 17] {
            assert!(parsed.hour.matches(h));
        }
        assert!(!parsed.hour.matches(10));
    }

    #[test]
    fn unreachable_combination_errors_instead_of_looping() {
        // April never has 31 days.
        let from = dt("2024-01-01T00:00:00Z");
        let err = next("0 0 31 4 *", from).unwrap_err();
        assert!(matches!(err, CronError::Unreachable { .. }));
    }

    #[test]
    fn describe_common_forms() {
        assert_eq!(describe("*/5 * * * *"), "every 5 minutes");
        assert_eq!(describe("30 9 * * *"), "daily at 9:30");
        assert_eq!(describe("0 9 * * 1-5"), "at 9:00 on day-of-week 1-5");
    }
}
