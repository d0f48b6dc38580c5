//! iCalendar (RFC 5545) export of stored rules.
//!
//! Builds the `rrule` crate's representation of an event's series so it can be
//! rendered as `DTSTART`/`RRULE`/`EXDATE` text for calendar clients. Only the
//! fields the active frequency reads are emitted, mirroring
//! [`CompiledRule::compile`].

use chrono::Month;
use rrule::{NWeekday, RRule, RRuleSet, Unvalidated};

use crate::error::{RecurrenceError, Result};
use crate::expander::ExpandOptions;
use crate::model::{Event, RecurrenceRule};
use crate::rule::{CompiledRule, Pattern};

/// Translate a stored rule into an unvalidated `rrule` rule.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidRule`] if the rule does not compile, or
/// [`RecurrenceError::Export`] if it carries both `count` and `until` (RFC 5545
/// allows only one) or an interval too large for RRULE.
pub fn to_rrule(rule: &RecurrenceRule, tz: &rrule::Tz) -> Result<RRule<Unvalidated>> {
    let compiled = CompiledRule::compile(rule)?;

    if compiled.count.is_some() && compiled.until.is_some() {
        return Err(RecurrenceError::Export(
            "RRULE cannot carry both COUNT and UNTIL".to_string(),
        ));
    }

    let interval = u16::try_from(compiled.interval).map_err(|_| {
        RecurrenceError::Export(format!("interval {} is too large", compiled.interval))
    })?;

    let mut out = match &compiled.pattern {
        Pattern::Daily => RRule::new(rrule::Frequency::Daily),
        Pattern::Weekly { days } => {
            let rr = RRule::new(rrule::Frequency::Weekly);
            if days.is_empty() {
                rr
            } else {
                rr.by_weekday(days.iter().map(|d| NWeekday::Every(*d)).collect())
            }
        }
        Pattern::MonthlyOnDay { day } => {
            let rr = RRule::new(rrule::Frequency::Monthly);
            match day {
                Some(day) => rr.by_month_day(vec![*day as i8]),
                None => rr,
            }
        }
        Pattern::MonthlyOnWeekday { position, weekday } => RRule::new(rrule::Frequency::Monthly)
            .by_weekday(vec![NWeekday::Nth(position.ordinal() as i16, *weekday)]),
        Pattern::Yearly { month } => {
            let rr = RRule::new(rrule::Frequency::Yearly);
            match month {
                Some(m) => {
                    let month = Month::try_from(*m as u8).map_err(|_| {
                        RecurrenceError::InvalidRule(format!("month must be 1-12, got {m}"))
                    })?;
                    rr.by_month(&[month])
                }
                None => rr,
            }
        }
    };

    out = out.interval(interval);
    if let Some(count) = compiled.count {
        out = out.count(count);
    }
    if let Some(until) = compiled.until {
        out = out.until(until.with_timezone(tz));
    }
    Ok(out)
}

/// Build the full recurrence set for an event, anchored at its start in the
/// configured zone, with `options.exclusions` as EXDATEs.
///
/// # Errors
///
/// See [`to_rrule`]; also [`RecurrenceError::Export`] if `rrule` rejects the
/// resulting rule.
pub fn to_rrule_set(
    event: &Event,
    rule: &RecurrenceRule,
    options: &ExpandOptions,
) -> Result<RRuleSet> {
    let tz = rrule::Tz::Tz(options.timezone);
    let dt_start = event.start_time.with_timezone(&tz);

    let mut set = to_rrule(rule, &tz)?
        .build(dt_start)
        .map_err(|e| RecurrenceError::Export(e.to_string()))?;

    for excluded in &options.exclusions {
        set = set.exdate(excluded.with_timezone(&tz));
    }
    Ok(set)
}

/// Render an event's series as iCalendar text (`DTSTART`, `RRULE`, `EXDATE`).
///
/// # Errors
///
/// See [`to_rrule_set`].
pub fn to_ical(event: &Event, rule: &RecurrenceRule, options: &ExpandOptions) -> Result<String> {
    Ok(to_rrule_set(event, rule, options)?.to_string())
}
