// src/error.rs

use chrono::NaiveDate;
use thiserror::Error;

use crate::holiday_client::HolidayClientError;

// --- Validation Errors ---

/// Input rejected before any computation or persistence. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The input contains an invalid date: '{value}'")]
    InvalidDate { value: String },

    #[error("'from' ({from}) can not be later than 'till' ({till})")]
    InvalidRange { from: NaiveDate, till: NaiveDate },

    #[error("'end' must be after 'start'")]
    EndBeforeStart,

    #[error("'pause' has not the form hh:mm: '{value}'")]
    InvalidPause { value: String },

    #[error("Working time ({working_minutes} min) must be greater than pause ({pause_minutes} min)")]
    PauseExceedsWorkingTime {
        working_minutes: i64,
        pause_minutes: i64,
    },

    #[error("Target hours for {weekday} must be between 0 and 10, got {hours}")]
    HoursOutOfRange { weekday: String, hours: u8 },

    #[error("A new working model must start at least one day after the last one ({last_valid_from})")]
    WorkingModelTooEarly { last_valid_from: NaiveDate },

    #[error("Mandatory field missing: {field}")]
    MissingField { field: String },

    #[error("Unknown vacation status: '{value}'")]
    InvalidStatus { value: String },
}

impl ValidationError {
    /// Numeric code reported to API clients.
    pub fn code(&self) -> u16 {
        match self {
            ValidationError::InvalidDate { .. } => 4012,
            ValidationError::InvalidRange { .. } => 4013,
            ValidationError::MissingField { .. } | ValidationError::InvalidStatus { .. } => 4014,
            ValidationError::EndBeforeStart
            | ValidationError::InvalidPause { .. }
            | ValidationError::PauseExceedsWorkingTime { .. } => 4019,
            ValidationError::WorkingModelTooEarly { .. } => 4024,
            ValidationError::HoursOutOfRange { .. } => 4027,
        }
    }
}

// --- Service Errors ---

#[derive(Error, Debug)]
pub enum TimesbookError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Overlapping of the periods: {from}..{till} collides with an existing entry")]
    Overlap { from: NaiveDate, till: NaiveDate },

    #[error("{entity} '{key}' was not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Holiday calendar for {year} unavailable")]
    UpstreamUnavailable {
        year: i32,
        #[source]
        source: HolidayClientError,
    },

    #[error("Repository query '{operation}' failed: {message}")]
    Repository {
        operation: &'static str,
        message: String,
        transient: bool,
    },

    #[error("Computation exceeded its time budget of {secs}s")]
    Timeout { secs: u64 },
}

impl TimesbookError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        TimesbookError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Whether the failure came from I/O that may succeed on a later attempt.
    /// Validation, overlap and not-found outcomes are final.
    pub fn is_transient(&self) -> bool {
        match self {
            TimesbookError::UpstreamUnavailable { source, .. } => source.is_transient(),
            TimesbookError::Repository { transient, .. } => *transient,
            TimesbookError::Validation(_)
            | TimesbookError::Overlap { .. }
            | TimesbookError::NotFound { .. }
            | TimesbookError::Timeout { .. } => false,
        }
    }

    /// Numeric code reported to API clients.
    pub fn code(&self) -> u16 {
        match self {
            TimesbookError::Validation(v) => v.code(),
            TimesbookError::Overlap { .. } => 4015,
            TimesbookError::NotFound { .. } => 4021,
            TimesbookError::UpstreamUnavailable { .. } => 5003,
            TimesbookError::Repository { .. } => 5001,
            TimesbookError::Timeout { .. } => 5004,
        }
    }
}

pub type Result<T, E = TimesbookError> = std::result::Result<T, E>;
