// src/overlap.rs

use chrono::NaiveDate;

use crate::error::TimesbookError;
use crate::models::{DateInterval, Vacation};

/// Candidate span being checked against stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub from: NaiveDate,
    pub till: NaiveDate,
}

impl DateInterval for Span {
    fn from_date(&self) -> NaiveDate {
        self.from
    }
    fn till_date(&self) -> NaiveDate {
        self.till
    }
}

/// Inclusive overlap in either direction: one span's start or end falls inside the other.
pub fn intervals_overlap(a: &impl DateInterval, b: &impl DateInterval) -> bool {
    a.from_date() <= b.till_date() && b.from_date() <= a.till_date()
}

/// True when `candidate` collides with any non-canceled vacation.
pub fn has_overlap(existing: &[Vacation], candidate: &impl DateInterval) -> bool {
    existing
        .iter()
        .filter(|v| v.status.is_active())
        .any(|v| intervals_overlap(v, candidate))
}

/// Rejects the candidate with a conflict error when it overlaps an active vacation.
pub fn ensure_no_overlap(existing: &[Vacation], candidate: Span) -> Result<(), TimesbookError> {
    if has_overlap(existing, &candidate) {
        return Err(TimesbookError::Overlap {
            from: candidate.from,
            till: candidate.till,
        });
    }
    Ok(())
}
