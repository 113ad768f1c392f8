use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// Failure to obtain a calendar page for one date.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to booking site failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Calendar fetch failed ({status}) for {date}")]
    Status { date: NaiveDate, status: u16 },
    #[error("Session still expired after renewal for {date}")]
    SessionExpired { date: NaiveDate },
}

/// Configuration that cannot be turned into a watch plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Use both --start-date and --end-date when specifying a range")]
    IncompleteRange,
    #[error("--date cannot be combined with --start-date/--end-date")]
    ConflictingDates,
    #[error("--start-date must be <= --end-date (got {start} > {end})")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("Watched date span is empty")]
    EmptySpan,
    #[error("Date '{0}' must be YYYY-MM-DD, YYYYMMDD or DD/MM/YYYY")]
    InvalidDate(String),
    #[error("Time '{0}' must be HH:MM or HH:MM:SS")]
    InvalidTime(String),
    #[error("Unknown weekday '{0}' (use mon, tue, wed, thu, fri, sat or sun)")]
    InvalidWeekday(String),
    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("Minimum consecutive hours must be at least 1")]
    ZeroMinHours,
    #[error("Time window {from} to {to} is empty")]
    EmptyWindow { from: NaiveTime, to: NaiveTime },
}
