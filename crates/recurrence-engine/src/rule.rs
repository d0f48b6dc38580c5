//! Rule compilation: stored rule record → closed, validated pattern.
//!
//! The expander never looks at a raw [`RecurrenceRule`]. Every value it reads
//! goes through [`CompiledRule::compile`] first, so an unknown frequency or an
//! out-of-range code fails loudly instead of producing a wrong sequence.
//!
//! Only the fields that apply to the active frequency are read (and
//! validated). A `month` on a WEEKLY rule is ignored, not rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc, Weekday};
use serde::Serialize;

use crate::error::{RecurrenceError, Result};
use crate::model::RecurrenceRule;

/// How far one step of the rule moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FromStr for Frequency {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(RecurrenceError::InvalidRule(format!(
                "unrecognized frequency '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        };
        f.write_str(s)
    }
}

/// Which matching weekday of a month a relative pattern selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MonthWeek {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

impl MonthWeek {
    /// Parse the stored code: 1..=4, or -1 for last.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(MonthWeek::First),
            2 => Ok(MonthWeek::Second),
            3 => Ok(MonthWeek::Third),
            4 => Ok(MonthWeek::Fourth),
            -1 => Ok(MonthWeek::Last),
            _ => Err(RecurrenceError::InvalidRule(format!(
                "week_of_month must be 1-4 or -1, got {code}"
            ))),
        }
    }

    /// Signed position: positive counts from the front of the month,
    /// negative from the back.
    pub fn ordinal(self) -> i32 {
        match self {
            MonthWeek::First => 1,
            MonthWeek::Second => 2,
            MonthWeek::Third => 3,
            MonthWeek::Fourth => 4,
            MonthWeek::Last => -1,
        }
    }
}

/// Parse a single weekday code (0 = Monday .. 6 = Sunday).
pub fn weekday_from_code(code: u32) -> Result<Weekday> {
    match code {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        _ => Err(RecurrenceError::InvalidRule(format!(
            "weekday code must be 0-6, got {code}"
        ))),
    }
}

/// Parse a comma-separated weekday code list like `"0,2,4"`.
///
/// Whitespace around codes is ignored, duplicates collapse, and the result
/// is sorted Monday-first. An empty or blank list yields no weekdays.
pub fn parse_weekday_codes(s: &str) -> Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let code: u32 = part.parse().map_err(|_| {
            RecurrenceError::InvalidRule(format!("malformed weekday code '{part}' in '{s}'"))
        })?;
        let day = weekday_from_code(code)?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    days.sort_by_key(|d: &Weekday| d.num_days_from_monday());
    Ok(days)
}

/// The day-level constraint a rule applies within each period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Pattern {
    Daily,
    /// Empty `days` means "the start's own weekday".
    Weekly { days: Vec<Weekday> },
    /// `None` means "the start's own day of month".
    MonthlyOnDay { day: Option<u32> },
    MonthlyOnWeekday { position: MonthWeek, weekday: Weekday },
    /// `None` means "the start's own month".
    Yearly { month: Option<u32> },
}

impl Pattern {
    pub fn frequency(&self) -> Frequency {
        match self {
            Pattern::Daily => Frequency::Daily,
            Pattern::Weekly { .. } => Frequency::Weekly,
            Pattern::MonthlyOnDay { .. } | Pattern::MonthlyOnWeekday { .. } => Frequency::Monthly,
            Pattern::Yearly { .. } => Frequency::Yearly,
        }
    }
}

/// A rule whose every field has been checked and typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledRule {
    pub pattern: Pattern,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
}

impl CompiledRule {
    /// Compile a stored rule.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidRule`] for an unrecognized frequency,
    /// a zero interval or count, or an out-of-range value in a field that the
    /// frequency reads.
    pub fn compile(rule: &RecurrenceRule) -> Result<Self> {
        let frequency: Frequency = rule.frequency.parse()?;

        if rule.interval == 0 {
            return Err(RecurrenceError::InvalidRule(
                "interval must be at least 1".to_string(),
            ));
        }
        if rule.count == Some(0) {
            return Err(RecurrenceError::InvalidRule(
                "count must be positive".to_string(),
            ));
        }

        let pattern = match frequency {
            Frequency::Daily => Pattern::Daily,
            Frequency::Weekly => {
                let days = match rule.weekdays.as_deref() {
                    Some(codes) => parse_weekday_codes(codes)?,
                    None => Vec::new(),
                };
                Pattern::Weekly { days }
            }
            Frequency::Monthly => match (rule.week_of_month, rule.weekday_of_month) {
                // The relative pair wins over month_day when both are present.
                (Some(week), Some(weekday)) => Pattern::MonthlyOnWeekday {
                    position: MonthWeek::from_code(week)?,
                    weekday: weekday_from_code(weekday)?,
                },
                _ => {
                    if let Some(day) = rule.month_day {
                        if !(1..=31).contains(&day) {
                            return Err(RecurrenceError::InvalidRule(format!(
                                "month_day must be 1-31, got {day}"
                            )));
                        }
                    }
                    Pattern::MonthlyOnDay {
                        day: rule.month_day,
                    }
                }
            },
            Frequency::Yearly => {
                if let Some(month) = rule.month {
                    if !(1..=12).contains(&month) {
                        return Err(RecurrenceError::InvalidRule(format!(
                            "month must be 1-12, got {month}"
                        )));
                    }
                }
                Pattern::Yearly { month: rule.month }
            }
        };

        Ok(Self {
            pattern,
            interval: rule.interval,
            count: rule.count,
            until: rule.until,
        })
    }

    pub fn frequency(&self) -> Frequency {
        self.pattern.frequency()
    }
}
