//! Recurring job schedules
//!
//! Schedules use the classic five-field cron syntax
//! (`minute hour day-of-month month day-of-week`), evaluated in UTC. Each
//! field accepts `*`, `*/n`, `a-b`, `a-b/n`, single numbers and comma lists.
//! Day-of-week runs 0-7 with both 0 and 7 meaning Sunday. When both day
//! fields are restricted a day matches if either does.

use chrono::{DateTime, Datelike, Days, Duration, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::JobError;
use crate::job::JobPayload;

/// Upper bound on the search for the next fire; covers a leap-day schedule
const SEARCH_DAYS: u64 = 366 * 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    day_of_month_restricted: bool,
    day_of_week_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, JobError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(JobError::invalid_schedule(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let mut days_of_week = parse_field(expression, fields[4], 0, 7)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes: parse_field(expression, fields[0], 0, 59)?,
            hours: parse_field(expression, fields[1], 0, 23)?,
            days_of_month: parse_field(expression, fields[2], 1, 31)?,
            months: parse_field(expression, fields[3], 1, 12)?,
            days_of_week,
            day_of_month_restricted: !fields[2].starts_with('*'),
            day_of_week_restricted: !fields[4].starts_with('*'),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// True if the schedule fires at the minute containing `at`
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        bit(self.minutes, at.minute())
            && bit(self.hours, at.hour())
            && self.day_matches(at.date_naive())
    }

    fn day_matches(&self, date: chrono::NaiveDate) -> bool {
        if !bit(self.months, date.month()) {
            return false;
        }
        let dom = bit(self.days_of_month, date.day());
        let dow = bit(self.days_of_week, date.weekday().num_days_from_sunday());
        if self.day_of_month_restricted && self.day_of_week_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// The first fire strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let first_date = start.date_naive();

        for offset in 0..SEARCH_DAYS {
            let date = first_date.checked_add_days(Days::new(offset))?;
            if !self.day_matches(date) {
                continue;
            }
            let first_day = offset == 0;
            for hour in 0..24 {
                if !bit(self.hours, hour) || (first_day && hour < start.hour()) {
                    continue;
                }
                for minute in 0..60 {
                    if !bit(self.minutes, minute) {
                        continue;
                    }
                    if first_day && hour == start.hour() && minute < start.minute() {
                        continue;
                    }
                    let naive = date.and_hms_opt(hour, minute, 0)?;
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
        }
        None
    }
}

impl FromStr for CronSchedule {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronSchedule::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn parse_field(expression: &str, field: &str, min: u32, max: u32) -> Result<u64, JobError> {
    let mut mask = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| JobError::invalid_schedule(expression, format!("bad step '{step}'")))?;
                if step == 0 {
                    return Err(JobError::invalid_schedule(expression, "step must be positive"));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (low, high) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(expression, a, min, max)?, parse_value(expression, b, min, max)?)
        } else {
            let value = parse_value(expression, range, min, max)?;
            (value, if step.is_some() { max } else { value })
        };
        if low > high {
            return Err(JobError::invalid_schedule(expression, format!("empty range '{range}'")));
        }

        for value in (low..=high).step_by(step.unwrap_or(1) as usize) {
            mask |= 1u64 << value;
        }
    }
    Ok(mask)
}

fn parse_value(expression: &str, text: &str, min: u32, max: u32) -> Result<u32, JobError> {
    let value: u32 = text
        .parse()
        .map_err(|_| JobError::invalid_schedule(expression, format!("bad value '{text}'")))?;
    if value < min || value > max {
        return Err(JobError::invalid_schedule(
            expression,
            format!("{value} outside {min}-{max}"),
        ));
    }
    Ok(value)
}

/// A job enqueued on a cron schedule
#[derive(Debug, Clone)]
pub struct RecurringJob {
    pub name: String,
    pub schedule: CronSchedule,
    pub payload: JobPayload,
}

impl RecurringJob {
    pub fn new(name: impl Into<String>, expression: &str, payload: JobPayload) -> Result<Self, JobError> {
        Ok(Self {
            name: name.into(),
            schedule: CronSchedule::parse(expression)?,
            payload,
        })
    }
}

/// The clinic's standing schedule
pub fn default_recurring_jobs() -> Result<Vec<RecurringJob>, JobError> {
    Ok(vec![
        RecurringJob::new("low-stock-check", "0 */6 * * *", JobPayload::CheckLowStock)?,
        RecurringJob::new("expiring-items-check", "0 9 * * *", JobPayload::CheckExpiringItems)?,
        RecurringJob::new("claims-reconciliation", "0 */4 * * *", JobPayload::ReconcileClaims)?,
        RecurringJob::new(
            "database-backup",
            "0 2 * * *",
            JobPayload::DatabaseBackup { destination: None },
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_every_six_hours() {
        let schedule = CronSchedule::parse("0 */6 * * *").unwrap();
        assert_eq!(schedule.next_after(at(2024, 3, 1, 0, 0)), Some(at(2024, 3, 1, 6, 0)));
        assert_eq!(schedule.next_after(at(2024, 3, 1, 5, 59)), Some(at(2024, 3, 1, 6, 0)));
        assert_eq!(schedule.next_after(at(2024, 3, 1, 18, 30)), Some(at(2024, 3, 2, 0, 0)));
    }

    #[test]
    fn test_daily_fire_rolls_over_month_end() {
        let schedule = CronSchedule::parse("0 9 * * *").unwrap();
        assert_eq!(schedule.next_after(at(2024, 1, 31, 9, 0)), Some(at(2024, 2, 1, 9, 0)));
    }

    #[test]
    fn test_ranges_lists_and_steps() {
        let schedule = CronSchedule::parse("15,45 8-10 * * 1-5").unwrap();
        // Saturday 2024-03-02 -> Monday 2024-03-04
        assert_eq!(schedule.next_after(at(2024, 3, 2, 7, 0)), Some(at(2024, 3, 4, 8, 15)));
        assert_eq!(schedule.next_after(at(2024, 3, 4, 8, 15)), Some(at(2024, 3, 4, 8, 45)));
        assert_eq!(schedule.next_after(at(2024, 3, 4, 10, 45)), Some(at(2024, 3, 5, 8, 15)));
    }

    #[test]
    fn test_sunday_as_seven() {
        let schedule = CronSchedule::parse("0 0 * * 7").unwrap();
        // 2024-03-03 is a Sunday
        assert_eq!(schedule.next_after(at(2024, 3, 1, 0, 0)), Some(at(2024, 3, 3, 0, 0)));
    }

    #[test]
    fn test_restricted_day_fields_match_either() {
        let schedule = CronSchedule::parse("0 0 13 * 5").unwrap();
        // Friday 2024-03-01 matches by weekday before the 13th
        assert_eq!(schedule.next_after(at(2024, 2, 29, 12, 0)), Some(at(2024, 3, 1, 0, 0)));
    }

    #[test]
    fn test_leap_day() {
        let schedule = CronSchedule::parse("0 0 29 2 *").unwrap();
        assert_eq!(schedule.next_after(at(2024, 3, 1, 0, 0)), Some(at(2028, 2, 29, 0, 0)));
    }

    #[test]
    fn test_invalid_expressions() {
        for expression in ["* * * *", "60 * * * *", "*/0 * * * *", "5-1 * * * *", "a * * * *"] {
            assert!(
                matches!(CronSchedule::parse(expression), Err(JobError::InvalidSchedule { .. })),
                "{expression} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_schedule() {
        let jobs = default_recurring_jobs().unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            names,
            ["low-stock-check", "expiring-items-check", "claims-reconciliation", "database-backup"]
        );
        assert_eq!(jobs[3].schedule.expression(), "0 2 * * *");
    }

    proptest! {
        #[test]
        fn next_fire_is_the_first_matching_minute(
            secs in 1_600_000_000i64..1_900_000_000,
            minute_step in 1u32..30,
            hour_step in 1u32..12,
        ) {
            let schedule = CronSchedule::parse(&format!("*/{minute_step} */{hour_step} * * *")).unwrap();
            let after = Utc.timestamp_opt(secs, 0).unwrap();
            let next = schedule.next_after(after).unwrap();

            prop_assert!(next > after);
            prop_assert!(schedule.matches(next));

            let mut minute = after.with_second(0).unwrap() + Duration::minutes(1);
            while minute < next {
                prop_assert!(!schedule.matches(minute));
                minute += Duration::minutes(1);
            }
        }
    }
}
