use thiserror::Error;

use crate::domain::Granularity;

pub type ReportResult<T> = Result<T, ReportError>;

/// Top-level error for report queries and cache rebuilds.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raised by the calendar codec when a label or date cannot be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("malformed {granularity} label `{label}`")]
    MalformedLabel {
        granularity: Granularity,
        label: String,
    },
    #[error("unknown month name `{0}`")]
    UnknownMonth(String),
    #[error("date {year:04}/{month:02}/{day:02} is outside the display calendar")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("week {week} is outside year {year}")]
    InvalidWeek { year: i32, week: u32 },
    #[error("date is outside the supported range")]
    OutOfRange,
}

/// Failures surfaced by the backing document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("cannot convert field `{field}` value {value} to a date")]
    Conversion { field: String, value: String },
    #[error("duplicate key on index `{index}`: {key}")]
    DuplicateKey { index: String, key: String },
    #[error("index options conflict on `{0}`")]
    IndexOptionsConflict(String),
    #[error("index `{0}` not found")]
    IndexNotFound(String),
}
