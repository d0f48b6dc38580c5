//! DST transition policies for recurring events.
//!
//! Occurrences are generated as local wall-clock times and then pinned to
//! instants. Most local times map to exactly one instant; the ones that
//! don't are handled here.

use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Policy for handling events that fall during DST transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Skip instances that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the next valid time after the gap
    ShiftForward,
    /// Use wall clock time (maintain local time, adjust UTC offset)
    #[default]
    WallClock,
}

/// Longest gap we search across; real-world transitions are at most a few hours.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Pin a local wall-clock time in `tz` to an instant.
///
/// Ambiguous times (fall back) take the earlier instant under every policy.
/// Nonexistent times (spring forward) follow `policy`; `None` means the
/// occurrence is dropped.
pub fn resolve_local(tz: &Tz, naive: &NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Tz>> {
    if let Some(dt) = tz.from_local_datetime(naive).earliest() {
        return Some(dt);
    }

    match policy {
        DstPolicy::Skip => None,
        DstPolicy::ShiftForward => (1..=MAX_GAP_MINUTES).find_map(|m| {
            let shifted = *naive + Duration::minutes(m);
            tz.from_local_datetime(&shifted).earliest()
        }),
        DstPolicy::WallClock => {
            // Read the naive time with the offset in force just before the gap.
            let before = (1..=MAX_GAP_MINUTES).find_map(|m| {
                let earlier = *naive - Duration::minutes(m);
                tz.from_local_datetime(&earlier).earliest()
            })?;
            let offset = before.offset().fix();
            let utc = *naive - Duration::seconds(offset.local_minus_utc() as i64);
            Some(tz.from_utc_datetime(&utc))
        }
    }
}
