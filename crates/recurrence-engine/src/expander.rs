//! Recurrence expansion: event + rule + window → ordered occurrences.
//!
//! Generation walks the rule period by period (day, ISO week, calendar month,
//! or calendar year, each `interval` units apart) in the configured zone's
//! wall-clock time. Within a period the pattern picks candidate dates in
//! ascending order; each candidate keeps the event's local time of day and is
//! pinned to an instant through the [`DstPolicy`].
//!
//! # Bounds
//!
//! The series stops at the first of:
//!
//! - `rule.until`, else the caller's `window_end`, else `anchor + horizon`
//! - `rule.count` occurrences (counted from the event start, before window
//!   filtering and exclusions)
//! - the first occurrence past `window_end`
//!
//! Days that do not exist in a period (the 31st of a 30-day month, Feb 29 in a
//! common year) are skipped, never clamped.

use std::collections::{BTreeSet, VecDeque};
use std::iter::FusedIterator;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, trace};

use crate::calendar::{add_months, day_in_month, nth_weekday_in_month, week_start};
use crate::dst::{resolve_local, DstPolicy};
use crate::error::{RecurrenceError, Result};
use crate::model::{Event, Occurrence, RecurrenceRule};
use crate::rule::{CompiledRule, Pattern};

/// Synthetic horizon used when neither the rule nor the caller bounds a series.
pub const DEFAULT_HORIZON_DAYS: i64 = 365 * 2;

/// Knobs for [`expand_with_options`] and [`occurrences`].
#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// The "now" the synthetic horizon counts from. `None` reads the clock.
    pub anchor: Option<DateTime<Utc>>,
    /// Zone whose wall clock drives day, month and weekday arithmetic.
    pub timezone: Tz,
    pub horizon: Duration,
    pub dst_policy: DstPolicy,
    /// Occurrence starts removed from recurring output.
    pub exclusions: BTreeSet<DateTime<Utc>>,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            anchor: None,
            timezone: Tz::UTC,
            horizon: Duration::days(DEFAULT_HORIZON_DAYS),
            dst_policy: DstPolicy::default(),
            exclusions: BTreeSet::new(),
        }
    }
}

impl ExpandOptions {
    #[must_use]
    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    #[must_use]
    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    #[must_use]
    pub fn with_dst_policy(mut self, policy: DstPolicy) -> Self {
        self.dst_policy = policy;
        self
    }

    #[must_use]
    pub fn with_exclusion(mut self, start: DateTime<Utc>) -> Self {
        self.exclusions.insert(start);
        self
    }
}

/// Expand an event into its occurrences with default options.
///
/// A non-recurring event (no rule) yields exactly its own interval, whatever
/// the window. A recurring event yields its series clipped to the window.
///
/// # Errors
///
/// Returns [`crate::RecurrenceError::InvalidRule`] if the rule does not compile, or
/// [`crate::RecurrenceError::InvalidWindow`] if the synthetic horizon overflows.
pub fn expand(
    event: &Event,
    rule: Option<&RecurrenceRule>,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
) -> Result<Vec<Occurrence>> {
    expand_with_options(
        event,
        rule,
        window_start,
        window_end,
        &ExpandOptions::default(),
    )
}

/// Expand an event into its occurrences.
///
/// # Errors
///
/// Returns [`crate::RecurrenceError::InvalidRule`] if the rule does not compile, or
/// [`crate::RecurrenceError::InvalidWindow`] if the synthetic horizon overflows.
pub fn expand_with_options(
    event: &Event,
    rule: Option<&RecurrenceRule>,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    options: &ExpandOptions,
) -> Result<Vec<Occurrence>> {
    Ok(occurrences(event, rule, window_start, window_end, options)?.collect())
}

/// Lazily expand an event. The rule is compiled up front, so every error
/// surfaces here and the iterator itself cannot fail.
///
/// # Errors
///
/// Returns [`crate::RecurrenceError::InvalidRule`] if the rule does not compile, or
/// [`crate::RecurrenceError::InvalidWindow`] if the synthetic horizon overflows.
pub fn occurrences(
    event: &Event,
    rule: Option<&RecurrenceRule>,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    options: &ExpandOptions,
) -> Result<Occurrences> {
    let Some(rule) = rule else {
        return Ok(Occurrences {
            inner: Inner::Single(Some(event.own_occurrence())),
        });
    };

    let compiled = CompiledRule::compile(rule)?;
    let bound = match (compiled.until, window_end) {
        (Some(until), _) => until,
        (None, Some(end)) => end,
        (None, None) => {
            let anchor = options.anchor.unwrap_or_else(Utc::now);
            debug!(event_id = event.id, %anchor, "no until or window end, using synthetic horizon");
            anchor.checked_add_signed(options.horizon).ok_or_else(|| {
                RecurrenceError::InvalidWindow(format!(
                    "horizon of {} days past {anchor} is out of range",
                    options.horizon.num_days()
                ))
            })?
        }
    };

    debug!(
        event_id = event.id,
        frequency = %compiled.frequency(),
        interval = compiled.interval,
        count = ?compiled.count,
        %bound,
        "expanding recurring event"
    );

    let tz = options.timezone;
    Ok(Occurrences {
        inner: Inner::Series(Box::new(Series {
            event_id: event.id,
            event_start: event.start_time,
            duration: event.duration(),
            local_start: event.start_time.with_timezone(&tz).naive_local(),
            tz,
            dst_policy: options.dst_policy,
            bound,
            bound_date: bound.with_timezone(&tz).date_naive(),
            window_start,
            window_end,
            exclusions: options.exclusions.clone(),
            rule: compiled,
            period: 0,
            pending: VecDeque::new(),
            generated: 0,
            done: false,
        })),
    })
}

/// Iterator over an event's occurrences in nondecreasing start order.
#[derive(Debug, Clone)]
pub struct Occurrences {
    inner: Inner,
}

#[derive(Debug, Clone)]
enum Inner {
    Single(Option<Occurrence>),
    Series(Box<Series>),
}

impl Iterator for Occurrences {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        match &mut self.inner {
            Inner::Single(occurrence) => occurrence.take(),
            Inner::Series(series) => series.next_occurrence(),
        }
    }
}

impl FusedIterator for Occurrences {}

#[derive(Debug, Clone)]
struct Series {
    rule: CompiledRule,
    event_id: u64,
    event_start: DateTime<Utc>,
    duration: Duration,
    /// Event start on the configured zone's wall clock.
    local_start: NaiveDateTime,
    tz: Tz,
    dst_policy: DstPolicy,
    bound: DateTime<Utc>,
    bound_date: NaiveDate,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    exclusions: BTreeSet<DateTime<Utc>>,
    /// Index of the next period to fill, in units of `interval`.
    period: i64,
    pending: VecDeque<NaiveDate>,
    generated: u32,
    done: bool,
}

impl Series {
    fn next_occurrence(&mut self) -> Option<Occurrence> {
        while !self.done {
            let Some(date) = self.pending.pop_front() else {
                self.fill_next_period();
                continue;
            };

            let naive = date.and_time(self.local_start.time());
            let start = if naive == self.local_start {
                self.event_start
            } else {
                match resolve_local(&self.tz, &naive, self.dst_policy) {
                    Some(local) => local.with_timezone(&Utc),
                    None => {
                        trace!(event_id = self.event_id, %naive, "skipping local time in DST gap");
                        continue;
                    }
                }
            };

            if start < self.event_start {
                continue;
            }
            if start > self.bound {
                self.done = true;
                break;
            }
            if let Some(count) = self.rule.count {
                if self.generated >= count {
                    self.done = true;
                    break;
                }
            }
            self.generated += 1;

            if self.exclusions.contains(&start) {
                trace!(event_id = self.event_id, %start, "occurrence excluded");
                continue;
            }
            if self.window_start.is_some_and(|ws| start < ws) {
                continue;
            }
            if self.window_end.is_some_and(|we| start > we) {
                self.done = true;
                break;
            }

            return Some(Occurrence {
                start_time: start,
                end_time: start + self.duration,
                event_id: self.event_id,
                is_original: start == self.event_start,
            });
        }
        None
    }

    /// Queue the candidate dates of the next period, or finish the series when
    /// the period begins past the bound.
    fn fill_next_period(&mut self) {
        let step = self.period * self.rule.interval as i64;
        self.period += 1;

        match self.period_candidates(step) {
            Some((period_start, _)) if period_start > self.bound_date => self.done = true,
            Some((_, candidates)) => self.pending.extend(candidates),
            None => self.done = true,
        }
    }

    /// First local day of the period `step` units after the start period, and
    /// the pattern's dates in it. `None` once calendar arithmetic overflows.
    fn period_candidates(&self, step: i64) -> Option<(NaiveDate, Vec<NaiveDate>)> {
        let start = self.local_start.date();

        match &self.rule.pattern {
            Pattern::Daily => {
                let day = start.checked_add_signed(Duration::try_days(step)?)?;
                Some((day, vec![day]))
            }
            Pattern::Weekly { days } => {
                let monday = week_start(start).checked_add_signed(Duration::try_weeks(step)?)?;
                let offsets: Vec<i64> = if days.is_empty() {
                    vec![start.weekday().num_days_from_monday() as i64]
                } else {
                    days.iter()
                        .map(|d| d.num_days_from_monday() as i64)
                        .collect()
                };
                let candidates = offsets
                    .into_iter()
                    .filter_map(|o| monday.checked_add_signed(Duration::days(o)))
                    .collect();
                Some((monday, candidates))
            }
            Pattern::MonthlyOnDay { day } => {
                let (year, month) = add_months(start.year(), start.month(), step)?;
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let candidate = day_in_month(year, month, day.unwrap_or(start.day()));
                Some((first, candidate.into_iter().collect()))
            }
            Pattern::MonthlyOnWeekday { position, weekday } => {
                let (year, month) = add_months(start.year(), start.month(), step)?;
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let candidate = nth_weekday_in_month(year, month, *weekday, position.ordinal());
                Some((first, candidate.into_iter().collect()))
            }
            Pattern::Yearly { month } => {
                let year = i32::try_from(start.year() as i64 + step).ok()?;
                let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
                let candidate = day_in_month(year, month.unwrap_or(start.month()), start.day());
                Some((first, candidate.into_iter().collect()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Weekday};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn event_at(start: DateTime<Utc>, minutes: i64) -> Event {
        Event {
            id: 42,
            user_id: 1,
            title: "Review".to_string(),
            description: None,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            is_recurring: true,
        }
    }

    fn anchored() -> ExpandOptions {
        ExpandOptions::default().with_anchor(utc(2026, 1, 1, 0, 0))
    }

    fn run(event: &Event, rule: &RecurrenceRule) -> Vec<Occurrence> {
        expand_with_options(event, Some(rule), None, None, &anchored()).unwrap()
    }

    fn starts(occurrences: &[Occurrence]) -> Vec<DateTime<Utc>> {
        occurrences.iter().map(|o| o.start_time).collect()
    }

    // ── Non-recurring path ──────────────────────────────────────────────

    #[test]
    fn test_non_recurring_returns_own_interval() {
        let mut event = event_at(utc(2026, 3, 4, 9, 0), 60);
        event.is_recurring = false;
        let result = expand(&event, None, None, None).unwrap();
        assert_eq!(result, vec![event.own_occurrence()]);
        assert!(result[0].is_original);
    }

    #[test]
    fn test_non_recurring_ignores_window() {
        let mut event = event_at(utc(2026, 3, 4, 9, 0), 60);
        event.is_recurring = false;
        let result = expand(
            &event,
            None,
            Some(utc(2027, 1, 1, 0, 0)),
            Some(utc(2027, 2, 1, 0, 0)),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].start_time, event.start_time);
    }

    // ── Weekly ──────────────────────────────────────────────────────────

    #[test]
    fn test_weekly_wednesday_count_three() {
        // 2026-03-04 is a Wednesday.
        let event = event_at(utc(2026, 3, 4, 9, 0), 30);
        let rule = RecurrenceRule::new("WEEKLY").weekdays("2").count(3);
        let result = run(&event, &rule);

        assert_eq!(result.len(), 3);
        assert!(result[0].is_original);
        assert!(!result[1].is_original);
        assert_eq!(result[1].start_time - result[0].start_time, Duration::days(7));
        assert_eq!(result[2].start_time - result[1].start_time, Duration::days(7));
    }

    #[test]
    fn test_weekly_without_days_uses_start_weekday() {
        let event = event_at(utc(2026, 3, 4, 9, 0), 30);
        let rule = RecurrenceRule::new("WEEKLY").interval(2).count(3);
        assert_eq!(
            starts(&run(&event, &rule)),
            vec![
                utc(2026, 3, 4, 9, 0),
                utc(2026, 3, 18, 9, 0),
                utc(2026, 4, 1, 9, 0)
            ]
        );
    }

    #[test]
    fn test_weekly_multiple_days_every_other_week() {
        // Monday 2026-03-02, on Mondays and Fridays every two weeks.
        let event = event_at(utc(2026, 3, 2, 8, 0), 30);
        let rule = RecurrenceRule::new("WEEKLY")
            .weekdays("4,0")
            .interval(2)
            .count(4);
        assert_eq!(
            starts(&run(&event, &rule)),
            vec![
                utc(2026, 3, 2, 8, 0),
                utc(2026, 3, 6, 8, 0),
                utc(2026, 3, 16, 8, 0),
                utc(2026, 3, 20, 8, 0)
            ]
        );
    }

    #[test]
    fn test_weekly_start_outside_day_set_is_not_emitted() {
        // Starts on a Wednesday, repeats on Mondays only.
        let event = event_at(utc(2026, 3, 4, 9, 0), 30);
        let rule = RecurrenceRule::new("WEEKLY").weekdays("0").count(2);
        let result = run(&event, &rule);
        assert_eq!(
            starts(&result),
            vec![utc(2026, 3, 9, 9, 0), utc(2026, 3, 16, 9, 0)]
        );
        assert!(result.iter().all(|o| !o.is_original));
    }

    // ── Monthly ─────────────────────────────────────────────────────────

    #[test]
    fn test_monthly_last_friday_over_three_months() {
        // Starts mid-January; January has 31 days, February 28.
        let event = event_at(utc(2026, 1, 15, 10, 0), 60);
        let rule = RecurrenceRule::new("MONTHLY")
            .on_weekday_of_month(-1, 4)
            .until(utc(2026, 4, 14, 0, 0));
        let result = run(&event, &rule);
        assert_eq!(
            starts(&result),
            vec![
                utc(2026, 1, 30, 10, 0),
                utc(2026, 2, 27, 10, 0),
                utc(2026, 3, 27, 10, 0)
            ]
        );
        assert!(result
            .iter()
            .all(|o| o.start_time.weekday() == Weekday::Fri && !o.is_original));
    }

    #[test]
    fn test_monthly_last_weekday_honors_interval_and_count() {
        // The last-weekday branch used to ignore interval and count.
        let event = event_at(utc(2026, 1, 30, 10, 0), 60);
        let rule = RecurrenceRule::new("MONTHLY")
            .on_weekday_of_month(-1, 4)
            .interval(2)
            .count(3);
        let result = run(&event, &rule);
        assert_eq!(
            starts(&result),
            vec![
                utc(2026, 1, 30, 10, 0),
                utc(2026, 3, 27, 10, 0),
                utc(2026, 5, 29, 10, 0)
            ]
        );
        assert!(result[0].is_original);
    }

    #[test]
    fn test_monthly_last_weekday_honors_window() {
        // The last-weekday branch used to ignore window clipping.
        let event = event_at(utc(2026, 1, 30, 10, 0), 60);
        let rule = RecurrenceRule::new("MONTHLY").on_weekday_of_month(-1, 4);
        let result = expand_with_options(
            &event,
            Some(&rule),
            Some(utc(2026, 3, 1, 0, 0)),
            Some(utc(2026, 4, 30, 23, 59)),
            &anchored(),
        )
        .unwrap();
        assert_eq!(
            starts(&result),
            vec![utc(2026, 3, 27, 10, 0), utc(2026, 4, 24, 10, 0)]
        );
    }

    #[test]
    fn test_monthly_second_monday() {
        let event = event_at(utc(2026, 1, 12, 18, 0), 90);
        let rule = RecurrenceRule::new("MONTHLY")
            .on_weekday_of_month(2, 0)
            .count(6);
        let result = run(&event, &rule);
        assert_eq!(result.len(), 6);
        for o in &result {
            assert_eq!(o.start_time.weekday(), Weekday::Mon);
            assert_eq!((o.start_time.day() - 1) / 7, 1, "not a second Monday: {}", o.start_time);
        }
        assert_eq!(result[1].start_time, utc(2026, 2, 9, 18, 0));
        assert_eq!(result[3].start_time, utc(2026, 4, 13, 18, 0));
    }

    #[test]
    fn test_monthly_day_31_skips_short_months() {
        let event = event_at(utc(2026, 1, 31, 12, 0), 30);
        let rule = RecurrenceRule::new("MONTHLY").month_day(31).count(4);
        assert_eq!(
            starts(&run(&event, &rule)),
            vec![
                utc(2026, 1, 31, 12, 0),
                utc(2026, 3, 31, 12, 0),
                utc(2026, 5, 31, 12, 0),
                utc(2026, 7, 31, 12, 0)
            ]
        );
    }

    #[test]
    fn test_monthly_without_day_uses_start_day() {
        let event = event_at(utc(2026, 1, 10, 12, 0), 30);
        let rule = RecurrenceRule::new("MONTHLY").interval(3).count(3);
        assert_eq!(
            starts(&run(&event, &rule)),
            vec![
                utc(2026, 1, 10, 12, 0),
                utc(2026, 4, 10, 12, 0),
                utc(2026, 7, 10, 12, 0)
            ]
        );
    }

    // ── Yearly ──────────────────────────────────────────────────────────

    #[test]
    fn test_yearly_in_march_every_two_years() {
        let event = event_at(utc(2026, 3, 10, 9, 0), 60);
        let rule = RecurrenceRule::new("YEARLY")
            .month(3)
            .interval(2)
            .count(3)
            .until(utc(2031, 1, 1, 0, 0));
        let result = run(&event, &rule);
        assert_eq!(
            starts(&result),
            vec![
                utc(2026, 3, 10, 9, 0),
                utc(2028, 3, 10, 9, 0),
                utc(2030, 3, 10, 9, 0)
            ]
        );
        assert!(result.iter().all(|o| o.start_time.month() == 3));
    }

    #[test]
    fn test_yearly_leap_day_skips_common_years() {
        let event = event_at(utc(2028, 2, 29, 9, 0), 60);
        let rule = RecurrenceRule::new("YEARLY")
            .count(2)
            .until(utc(2033, 1, 1, 0, 0));
        assert_eq!(
            starts(&run(&event, &rule)),
            vec![utc(2028, 2, 29, 9, 0), utc(2032, 2, 29, 9, 0)]
        );
    }

    #[test]
    fn test_yearly_impossible_date_terminates() {
        // Feb 30 never exists; the horizon must still end the walk.
        let event = event_at(utc(2026, 1, 30, 9, 0), 60);
        let rule = RecurrenceRule::new("YEARLY").month(2);
        assert!(run(&event, &rule).is_empty());
    }

    // ── Bounds ──────────────────────────────────────────────────────────

    #[test]
    fn test_daily_horizon_caps_unbounded_rule() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY");
        let result = run(&event, &rule);
        assert_eq!(result.len(), 730);
        assert_eq!(result.last().unwrap().start_time, utc(2027, 12, 31, 9, 0));
    }

    #[test]
    fn test_out_of_range_horizon_is_an_error() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY").count(2);
        let options = anchored().with_horizon(Duration::days(200_000_000));
        let err = expand_with_options(&event, Some(&rule), None, None, &options).unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidWindow(_)));
    }

    #[test]
    fn test_bounded_rule_ignores_out_of_range_horizon() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY")
            .count(2)
            .until(utc(2026, 1, 10, 0, 0));
        let options = anchored().with_horizon(Duration::days(200_000_000));
        let result = expand_with_options(&event, Some(&rule), None, None, &options).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_count_without_window_is_exact() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY").interval(3).count(10);
        assert_eq!(run(&event, &rule).len(), 10);
    }

    #[test]
    fn test_until_is_inclusive() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY").until(utc(2026, 1, 3, 9, 0));
        assert_eq!(run(&event, &rule).len(), 3);
    }

    #[test]
    fn test_window_end_bounds_when_no_until() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY");
        let result =
            expand(&event, Some(&rule), None, Some(utc(2026, 1, 5, 23, 59))).unwrap();
        assert_eq!(result.len(), 5);
    }

    // ── Window filtering ────────────────────────────────────────────────

    #[test]
    fn test_window_clips_both_ends() {
        let event = event_at(utc(2026, 3, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY");
        let ws = utc(2026, 3, 10, 0, 0);
        let we = utc(2026, 3, 12, 23, 59);
        let result = expand(&event, Some(&rule), Some(ws), Some(we)).unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|o| ws <= o.start_time && o.start_time <= we));
    }

    #[test]
    fn test_count_is_consumed_before_window_start() {
        let event = event_at(utc(2026, 3, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY").count(5);
        let result = expand_with_options(
            &event,
            Some(&rule),
            Some(utc(2026, 3, 4, 0, 0)),
            None,
            &anchored(),
        )
        .unwrap();
        assert_eq!(
            starts(&result),
            vec![utc(2026, 3, 4, 9, 0), utc(2026, 3, 5, 9, 0)]
        );
    }

    // ── Exclusions ──────────────────────────────────────────────────────

    #[test]
    fn test_exclusion_removes_occurrence_but_consumes_count() {
        let event = event_at(utc(2026, 3, 4, 9, 0), 30);
        let rule = RecurrenceRule::new("WEEKLY").count(3);
        let options = anchored().with_exclusion(utc(2026, 3, 11, 9, 0));
        let result = expand_with_options(&event, Some(&rule), None, None, &options).unwrap();
        assert_eq!(
            starts(&result),
            vec![utc(2026, 3, 4, 9, 0), utc(2026, 3, 18, 9, 0)]
        );
    }

    // ── Time zones ──────────────────────────────────────────────────────

    #[test]
    fn test_local_time_of_day_kept_across_dst() {
        // 09:00 New York; DST starts 2026-03-08.
        let tz: Tz = "America/New_York".parse().unwrap();
        let event = event_at(utc(2026, 3, 6, 14, 0), 45);
        let rule = RecurrenceRule::new("DAILY").count(3);
        let options = anchored().with_timezone(tz);
        let result = expand_with_options(&event, Some(&rule), None, None, &options).unwrap();
        assert_eq!(
            starts(&result),
            vec![
                utc(2026, 3, 6, 14, 0),
                utc(2026, 3, 7, 14, 0),
                utc(2026, 3, 8, 13, 0)
            ]
        );
        for o in &result {
            assert_eq!(o.start_time.with_timezone(&tz).hour(), 9);
            assert_eq!(o.end_time - o.start_time, Duration::minutes(45));
        }
    }

    #[test]
    fn test_dst_gap_skip_policy_drops_occurrence() {
        // 02:30 New York does not exist on 2026-03-08. Dropped days do not count.
        let tz: Tz = "America/New_York".parse().unwrap();
        let event = event_at(utc(2026, 3, 7, 7, 30), 30);
        let rule = RecurrenceRule::new("DAILY").count(3);
        let options = anchored()
            .with_timezone(tz)
            .with_dst_policy(DstPolicy::Skip);
        let result = expand_with_options(&event, Some(&rule), None, None, &options).unwrap();
        assert_eq!(
            starts(&result),
            vec![
                utc(2026, 3, 7, 7, 30),
                utc(2026, 3, 9, 6, 30),
                utc(2026, 3, 10, 6, 30)
            ]
        );
    }

    // ── Properties ──────────────────────────────────────────────────────

    #[test]
    fn test_expansion_is_idempotent() {
        let event = event_at(utc(2026, 1, 15, 10, 0), 60);
        let rule = RecurrenceRule::new("MONTHLY").on_weekday_of_month(3, 1);
        let first = run(&event, &rule);
        let second = run(&event, &rule);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_lazy_iterator_matches_collected() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("DAILY");
        let first_five: Vec<_> = occurrences(&event, Some(&rule), None, None, &anchored())
            .unwrap()
            .take(5)
            .collect();
        assert_eq!(first_five, run(&event, &rule)[..5].to_vec());
    }

    #[test]
    fn test_invalid_rule_is_rejected() {
        let event = event_at(utc(2026, 1, 1, 9, 0), 30);
        let rule = RecurrenceRule::new("WEEKLY").weekdays("1,8");
        let err = expand(&event, Some(&rule), None, None).unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidRule(_)));
    }
}
