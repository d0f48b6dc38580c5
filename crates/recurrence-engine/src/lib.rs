//! # recurrence-engine
//!
//! Deterministic recurrence expansion for calendar events.
//!
//! Turns a stored event and its optional recurrence rule (frequency, interval,
//! count/until, weekday set, day of month, month, or "Nth weekday of the
//! month") into a correctly ordered sequence of concrete occurrences, bounded
//! and filtered by a query window. Expansion is pure: the same event, rule,
//! window and options always produce the same occurrences.
//!
//! ## Modules
//!
//! - [`expander`] — event + rule + window → ordered occurrences
//! - [`rule`] — stored rule record → validated, typed pattern
//! - [`calendar`] — month lengths, Nth/last weekday of month, month stepping
//! - [`dst`] — DST transition policies (skip, shift, wall clock)
//! - [`query`] — date windows, listings, upcoming view, deletion intents
//! - [`ical`] — RFC 5545 RRULE export via the `rrule` crate
//! - [`model`] — event, rule and occurrence records
//! - [`error`] — Error types

pub mod calendar;
pub mod dst;
pub mod error;
pub mod expander;
pub mod ical;
pub mod model;
pub mod query;
pub mod rule;

pub use dst::DstPolicy;
pub use error::RecurrenceError;
pub use expander::{expand, expand_with_options, occurrences, ExpandOptions, Occurrences};
pub use ical::{to_ical, to_rrule_set};
pub use model::{validate_event, Event, EventRecord, Occurrence, RecurrenceRule};
pub use query::{
    list_events, request_occurrence_deletion, upcoming, DateWindow, DeletionIntent, EventListing,
    ListQuery, QueryConfig,
};
pub use rule::{CompiledRule, Frequency, MonthWeek, Pattern};
