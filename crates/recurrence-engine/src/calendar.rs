//! Calendar arithmetic on local dates.
//!
//! Every helper returns `Option` and yields `None` when the date it would
//! produce does not exist (Feb 30, the 5th Friday of a four-Friday month) or
//! falls outside chrono's representable range.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Last calendar day of a month.
///
/// Day 28 exists in every month and day 28 + 4 is always in the next one, so
/// stepping back by that date's day-of-month lands on the true month end.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let probe = NaiveDate::from_ymd_opt(year, month, 28)?.checked_add_signed(Duration::days(4))?;
    probe.checked_sub_signed(Duration::days(probe.day() as i64))
}

/// Number of days in a month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    last_day_of_month(year, month).map(|d| d.day())
}

/// A day of month if the month has it. `month_day = 31` in April is `None`.
pub fn day_in_month(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Find the Nth weekday in a month. `ordinal < 0` counts from the end
/// (-1 is the last, -2 the second to last).
pub fn nth_weekday_in_month(
    year: i32,
    month: u32,
    weekday: Weekday,
    ordinal: i32,
) -> Option<NaiveDate> {
    if ordinal == 0 {
        return None;
    }

    let target = if ordinal > 0 {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let diff = (weekday.num_days_from_monday() as i64
            - first.weekday().num_days_from_monday() as i64
            + 7)
            % 7;
        first + Duration::days(diff) + Duration::weeks((ordinal - 1) as i64)
    } else {
        let last = last_day_of_month(year, month)?;
        let diff = (last.weekday().num_days_from_monday() as i64
            - weekday.num_days_from_monday() as i64
            + 7)
            % 7;
        last - Duration::days(diff) - Duration::weeks((-ordinal - 1) as i64)
    };

    if target.month() == month && target.year() == year {
        Some(target)
    } else {
        None
    }
}

/// Shift a (year, month) pair by a number of months.
pub fn add_months(year: i32, month: u32, months: i64) -> Option<(i32, u32)> {
    let index = (year as i64) * 12 + (month as i64 - 1) + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = (index.rem_euclid(12) + 1) as u32;
    Some((year, month))
}

/// The Monday that starts the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}
