//! Error types for recurrence-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid date window: {0}")]
    InvalidWindow(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Event {0} is not recurring")]
    NotRecurring(u64),

    #[error("RRULE export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, RecurrenceError>;
