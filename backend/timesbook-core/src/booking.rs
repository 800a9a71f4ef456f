// src/booking.rs

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ValidationError;
use crate::models::BookingEntry;

static PAUSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").expect("pause pattern is a valid regex")
});

// --- Arithmetic ---

/// Parses an `hh:mm` pause into minutes.
pub fn parse_pause(value: &str) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidPause {
        value: value.to_string(),
    };
    let caps = PAUSE_PATTERN.captures(value.trim()).ok_or_else(invalid)?;
    let hours: i64 = caps[1].parse().map_err(|_| invalid())?;
    let minutes: i64 = caps[2].parse().map_err(|_| invalid())?;
    Ok(hours * 60 + minutes)
}

/// Net worked minutes of a stored entry. Stored data is summed as-is: a broken
/// pause counts as zero and a non-positive result is returned unchanged.
pub fn worked_minutes(entry: &BookingEntry) -> i64 {
    let gross = (entry.end - entry.start).num_minutes();
    let pause = parse_pause(&entry.pause).unwrap_or_else(|e| {
        warn!(
            "Booking of {} on {} has an unreadable pause ({}); counting it as 0",
            entry.username, entry.day, e
        );
        0
    });
    gross - pause
}

// --- Validation ---

/// Checks a new entry before it is stored.
pub fn validate_booking(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    pause: &str,
) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::EndBeforeStart);
    }
    let pause_minutes = parse_pause(pause)?;
    let working_minutes = (end - start).num_minutes();
    if working_minutes <= pause_minutes {
        return Err(ValidationError::PauseExceedsWorkingTime {
            working_minutes,
            pause_minutes,
        });
    }
    Ok(())
}

/// Raw booking body as sent by clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub day: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub pause: Option<String>,
    pub activities: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::MissingField {
            field: field.to_string(),
        })
}

pub fn parse_day(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidDate {
            value: value.to_string(),
        })
}

impl BookingRequest {
    /// Trims, parses and validates the body into a storable entry.
    pub fn into_entry(self, username: &str) -> Result<BookingEntry, ValidationError> {
        let day = parse_day(required(&self.day, "day")?)?;
        let start = parse_timestamp(required(&self.start, "start")?)?;
        let end = parse_timestamp(required(&self.end, "end")?)?;
        let pause = self
            .pause
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or("00:00")
            .to_string();
        validate_booking(start, end, &pause)?;

        Ok(BookingEntry {
            username: username.trim().to_string(),
            day,
            start,
            end,
            pause,
            activities: self.activities.unwrap_or_default().trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn entry(start: &str, end: &str, pause: &str) -> BookingEntry {
        BookingEntry {
            username: "max".to_string(),
            day: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            start: ts(start),
            end: ts(end),
            pause: pause.to_string(),
            activities: String::new(),
        }
    }

    #[test]
    fn pause_is_parsed_as_hours_and_minutes() {
        assert_eq!(parse_pause("00:30"), Ok(30));
        assert_eq!(parse_pause("01:15"), Ok(75));
        assert_eq!(parse_pause(" 00:00 "), Ok(0));
        assert!(parse_pause("0:30").is_err());
        assert!(parse_pause("24:00").is_err());
        assert!(parse_pause("00:60").is_err());
        assert!(parse_pause("30").is_err());
    }

    #[test]
    fn worked_minutes_subtract_the_pause() {
        let e = entry("2023-01-02T08:00:00Z", "2023-01-02T16:30:00Z", "00:30");
        assert_eq!(worked_minutes(&e), 480);
    }

    #[test]
    fn broken_stored_pause_counts_as_zero() {
        let e = entry("2023-01-02T08:00:00Z", "2023-01-02T09:00:00Z", "half an hour");
        assert_eq!(worked_minutes(&e), 60);
    }

    #[test]
    fn stored_negative_entries_are_summed_not_rejected() {
        let e = entry("2023-01-02T08:00:00Z", "2023-01-02T08:10:00Z", "00:30");
        assert_eq!(worked_minutes(&e), -20);
    }

    #[test]
    fn end_must_follow_start() {
        let err = validate_booking(
            ts("2023-01-02T16:00:00Z"),
            ts("2023-01-02T08:00:00Z"),
            "00:00",
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EndBeforeStart);
    }

    #[test]
    fn pause_must_be_shorter_than_working_time() {
        let err = validate_booking(
            ts("2023-01-02T08:00:00Z"),
            ts("2023-01-02T08:30:00Z"),
            "00:30",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::PauseExceedsWorkingTime { .. }));
    }

    #[test]
    fn request_is_trimmed_and_validated() {
        let request = BookingRequest {
            day: Some(" 2023-01-02 ".to_string()),
            start: Some("2023-01-02T08:00:00+01:00".to_string()),
            end: Some("2023-01-02T16:30:00+01:00".to_string()),
            pause: Some("00:30".to_string()),
            activities: Some("  reviews ".to_string()),
        };
        let entry = request.into_entry("max").unwrap();
        assert_eq!(entry.day, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(entry.activities, "reviews");
        assert_eq!(worked_minutes(&entry), 480);
    }

    #[test]
    fn missing_and_malformed_fields_are_reported() {
        let missing = BookingRequest::default().into_entry("max").unwrap_err();
        assert_eq!(
            missing,
            ValidationError::MissingField {
                field: "day".to_string()
            }
        );

        let malformed = BookingRequest {
            day: Some("02.01.2023".to_string()),
            ..Default::default()
        }
        .into_entry("max")
        .unwrap_err();
        assert_eq!(malformed.code(), 4012);
    }
}
