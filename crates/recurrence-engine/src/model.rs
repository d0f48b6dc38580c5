//! Event, rule, and occurrence records.
//!
//! These are the shapes the surrounding system stores and serves. The rule
//! record is kept close to its stored form (frequency as text, weekdays as a
//! comma-separated code list) so that bad stored values reach
//! [`crate::rule::CompiledRule::compile`] and are rejected there instead of
//! being silently coerced at deserialization time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecurrenceError, Result};
use crate::rule::CompiledRule;

/// A stored calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    /// Owning user.
    pub user_id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Event {
    /// The event's own length, carried unchanged onto every occurrence.
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// The event's own interval as an original occurrence.
    pub fn own_occurrence(&self) -> Occurrence {
        Occurrence {
            start_time: self.start_time,
            end_time: self.end_time,
            event_id: self.id,
            is_original: true,
        }
    }
}

/// A stored recurrence rule, one-to-one with a recurring [`Event`].
///
/// Fields are read positionally by frequency: `weekdays` only for WEEKLY,
/// `month_day` and the relative pair only for MONTHLY, `month` only for
/// YEARLY. Fields that do not apply are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// `DAILY`, `WEEKLY`, `MONTHLY` or `YEARLY`.
    pub frequency: String,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Occurrences at or before this instant are generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    /// Comma-separated weekday codes, 0 = Monday .. 6 = Sunday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    /// 1..=4, or -1 for the last one in the month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_of_month: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday_of_month: Option<u32>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRule {
    /// A rule with the given frequency and every other field at its default.
    pub fn new(frequency: impl Into<String>) -> Self {
        Self {
            frequency: frequency.into(),
            interval: 1,
            count: None,
            until: None,
            weekdays: None,
            month_day: None,
            month: None,
            week_of_month: None,
            weekday_of_month: None,
        }
    }

    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn weekdays(mut self, codes: impl Into<String>) -> Self {
        self.weekdays = Some(codes.into());
        self
    }

    pub fn month_day(mut self, day: u32) -> Self {
        self.month_day = Some(day);
        self
    }

    pub fn month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    /// Set the relative "Nth weekday of the month" pair.
    pub fn on_weekday_of_month(mut self, week: i32, weekday: u32) -> Self {
        self.week_of_month = Some(week);
        self.weekday_of_month = Some(weekday);
        self
    }
}

/// One concrete instance of an event. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub event_id: u64,
    /// True exactly for the occurrence starting at the event's own start.
    pub is_original: bool,
}

/// An event read together with its rule as one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<RecurrenceRule>,
}

impl EventRecord {
    /// Pair an event with its rule, enforcing the write-time invariants.
    ///
    /// # Errors
    ///
    /// See [`validate_event`].
    pub fn new(event: Event, recurrence_rule: Option<RecurrenceRule>) -> Result<Self> {
        validate_event(&event, recurrence_rule.as_ref())?;
        Ok(Self {
            event,
            recurrence_rule,
        })
    }

    pub fn rule(&self) -> Option<&RecurrenceRule> {
        self.recurrence_rule.as_ref()
    }
}

/// Check an event and its rule the way the write boundary does.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidEvent`] if the end is not after the start,
/// if a recurring event has no rule, or if a non-recurring event carries one.
/// Returns [`RecurrenceError::InvalidRule`] if the rule does not compile.
pub fn validate_event(event: &Event, rule: Option<&RecurrenceRule>) -> Result<()> {
    if event.start_time >= event.end_time {
        return Err(RecurrenceError::InvalidEvent(
            "end time must be after start time".to_string(),
        ));
    }

    match (event.is_recurring, rule) {
        (true, None) => Err(RecurrenceError::InvalidEvent(
            "recurrence rule is required for recurring events".to_string(),
        )),
        (false, Some(_)) => Err(RecurrenceError::InvalidEvent(
            "recurrence rule should not be provided for non-recurring events".to_string(),
        )),
        (true, Some(rule)) => CompiledRule::compile(rule).map(|_| ()),
        (false, None) => Ok(()),
    }
}
