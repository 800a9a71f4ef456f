// src/clock.rs

use chrono::{Duration, Local, NaiveDate};
use std::sync::{Arc, Mutex};

/// Source of "today" for computations that default `asOf` to now.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests and the CLI `--as-of` flag.
#[derive(Debug, Clone)]
pub struct FixedClock {
    current: Arc<Mutex<NaiveDate>>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            current: Arc::new(Mutex::new(date)),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = date;
    }

    /// Moves the clock by `days`. Returns false, leaving the date unchanged, when the result is out of range.
    pub fn advance(&self, days: i64) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match Duration::try_days(days).and_then(|delta| current.checked_add_signed(delta)) {
            Some(next) => {
                *current = next;
                true
            }
            None => false,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2023, 1, 8).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2023, 1, 8).unwrap());
        assert!(clock.advance(7));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());

        let shared = clock.clone();
        shared.set(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn advancing_past_the_calendar_keeps_the_date() {
        let clock = FixedClock::new(NaiveDate::MAX);
        assert!(!clock.advance(1));
        assert_eq!(clock.today(), NaiveDate::MAX);
        assert!(!clock.advance(i64::MAX));
        assert!(clock.advance(-1));
        assert_eq!(clock.today(), NaiveDate::MAX.pred_opt().unwrap());
    }
}
