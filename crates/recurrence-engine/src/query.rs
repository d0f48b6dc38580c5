//! Query layer: date windows, event listings, upcoming view, and
//! single-occurrence deletion intents.
//!
//! Storage and transport live outside this crate. Callers hand in the event
//! records they loaded (one consistent snapshot per event) and get back the
//! filtered, sorted listing, with occurrences attached when asked for.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dst::{resolve_local, DstPolicy};
use crate::error::{RecurrenceError, Result};
use crate::expander::{expand_with_options, ExpandOptions, DEFAULT_HORIZON_DAYS};
use crate::model::{Event, EventRecord, Occurrence};

/// Default length of the upcoming view.
pub const DEFAULT_UPCOMING_DAYS: i64 = 30;

/// Date format accepted for window bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Datetime format accepted for occurrence deletion requests.
pub const OCCURRENCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Settings shared by every query.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Zone in which calendar dates become day-start/day-end instants.
    pub timezone: Tz,
    pub upcoming_days: i64,
    pub horizon: Duration,
    pub dst_policy: DstPolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            upcoming_days: DEFAULT_UPCOMING_DAYS,
            horizon: Duration::days(DEFAULT_HORIZON_DAYS),
            dst_policy: DstPolicy::default(),
        }
    }
}

impl QueryConfig {
    fn expand_options(&self, anchor: DateTime<Utc>) -> ExpandOptions {
        ExpandOptions::default()
            .with_anchor(anchor)
            .with_timezone(self.timezone)
            .with_horizon(self.horizon)
            .with_dst_policy(self.dst_policy)
    }
}

/// A possibly half-open range of instants. Both ends are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Build a window from `YYYY-MM-DD` calendar dates. The start date maps to
    /// the first instant of its day in `tz`, the end date to the last.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidWindow`] if a date does not parse or
    /// the start falls after the end.
    pub fn from_dates(start: Option<&str>, end: Option<&str>, tz: &Tz) -> Result<Self> {
        let start = start
            .map(|s| parse_date(s).and_then(|d| day_boundary(d.and_hms_micro_opt(0, 0, 0, 0), tz)))
            .transpose()?;
        let end = end
            .map(|s| {
                parse_date(s)
                    .and_then(|d| day_boundary(d.and_hms_micro_opt(23, 59, 59, 999_999), tz))
            })
            .transpose()?;

        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(RecurrenceError::InvalidWindow(format!(
                    "start {s} is after end {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Whether an instant lies in the window; open ends accept everything.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| instant >= s) && self.end.is_none_or(|e| instant <= e)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|e| {
        RecurrenceError::InvalidWindow(format!("'{}': {} (expected YYYY-MM-DD)", s, e))
    })
}

fn day_boundary(naive: Option<NaiveDateTime>, tz: &Tz) -> Result<DateTime<Utc>> {
    let naive = naive
        .ok_or_else(|| RecurrenceError::InvalidWindow("day boundary out of range".to_string()))?;
    resolve_local(tz, &naive, DstPolicy::ShiftForward)
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RecurrenceError::InvalidWindow(format!("no instant for {naive} in {tz}")))
}

/// Parameters of a listing request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// Attach expanded occurrences to each listed event.
    #[serde(default)]
    pub show_occurrences: bool,
}

/// An event as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventListing {
    #[serde(flatten)]
    pub record: EventRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<Vec<Occurrence>>,
}

/// List a user's events, sorted by start time.
///
/// When both dates are given, non-recurring events must start inside the
/// window; recurring events are always listed since their occurrences may
/// land there. With `show_occurrences`, each listing carries the expansion of
/// its event over the (possibly half-open) window.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidWindow`] for unparseable dates, or
/// [`RecurrenceError::InvalidRule`] if a stored rule does not compile.
pub fn list_events(
    records: &[EventRecord],
    user_id: u64,
    query: &ListQuery,
    config: &QueryConfig,
    anchor: DateTime<Utc>,
) -> Result<Vec<EventListing>> {
    let window = DateWindow::from_dates(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        &config.timezone,
    )?;
    debug!(user_id, ?window, show_occurrences = query.show_occurrences, "listing events");

    let filter = if window.is_bounded() {
        window
    } else {
        DateWindow::default()
    };
    build_listing(
        records,
        user_id,
        &filter,
        query.show_occurrences.then_some(&window),
        config,
        anchor,
    )
}

/// The user's events over `[anchor, anchor + upcoming_days]`, each with its
/// occurrences in that window.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidWindow`] if the window end is out of
/// range, or [`RecurrenceError::InvalidRule`] if a stored rule does not compile.
pub fn upcoming(
    records: &[EventRecord],
    user_id: u64,
    config: &QueryConfig,
    anchor: DateTime<Utc>,
) -> Result<Vec<EventListing>> {
    let end = Duration::try_days(config.upcoming_days)
        .and_then(|span| anchor.checked_add_signed(span))
        .ok_or_else(|| {
            RecurrenceError::InvalidWindow(format!(
                "{} upcoming days past {anchor} is out of range",
                config.upcoming_days
            ))
        })?;
    let window = DateWindow::new(Some(anchor), Some(end));
    debug!(user_id, ?window, "listing upcoming events");
    build_listing(records, user_id, &window, Some(&window), config, anchor)
}

fn build_listing(
    records: &[EventRecord],
    user_id: u64,
    filter: &DateWindow,
    expand_over: Option<&DateWindow>,
    config: &QueryConfig,
    anchor: DateTime<Utc>,
) -> Result<Vec<EventListing>> {
    let mut selected: Vec<&EventRecord> = records
        .iter()
        .filter(|r| r.event.user_id == user_id)
        .filter(|r| r.event.is_recurring || filter.contains(r.event.start_time))
        .collect();
    selected.sort_by_key(|r| r.event.start_time);

    let options = config.expand_options(anchor);
    selected
        .into_iter()
        .map(|record| -> Result<EventListing> {
            let occurrences = expand_over
                .map(|w| {
                    expand_with_options(&record.event, record.rule(), w.start, w.end, &options)
                })
                .transpose()?;
            Ok(EventListing {
                record: record.clone(),
                occurrences,
            })
        })
        .collect()
}

/// A validated request to drop one occurrence of a recurring event.
///
/// Nothing is stored here; the caller persists the intent and feeds
/// `occurrence_start` back through [`ExpandOptions::exclusions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionIntent {
    pub event_id: u64,
    pub occurrence_start: DateTime<Utc>,
}

/// Validate a single-occurrence deletion request.
///
/// `occurrence` is a local `YYYY-MM-DDTHH:MM:SS` datetime in `tz`.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidDatetime`] if the timestamp does not parse
/// or names no instant in `tz`, and [`RecurrenceError::NotRecurring`] if the
/// event has no series to delete from.
pub fn request_occurrence_deletion(
    event: &Event,
    occurrence: &str,
    tz: &Tz,
) -> Result<DeletionIntent> {
    let naive = NaiveDateTime::parse_from_str(occurrence.trim(), OCCURRENCE_FORMAT).map_err(|_| {
        RecurrenceError::InvalidDatetime(format!(
            "'{}': invalid date format, use YYYY-MM-DDTHH:MM:SS",
            occurrence
        ))
    })?;

    if !event.is_recurring {
        return Err(RecurrenceError::NotRecurring(event.id));
    }

    let occurrence_start = resolve_local(tz, &naive, DstPolicy::Skip)
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            RecurrenceError::InvalidDatetime(format!("'{}' does not exist in {}", occurrence, tz))
        })?;

    debug!(event_id = event.id, %occurrence_start, "occurrence marked for deletion");
    Ok(DeletionIntent {
        event_id: event.id,
        occurrence_start,
    })
}
