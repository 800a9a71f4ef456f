// src/day_classifier.rs

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::calendar::{is_holiday, is_sick_day, is_vacation_day};
use crate::models::{SickTime, Vacation};

// Why a day is, or is not, owed as working time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Workday,
    Holiday,
    Sick,
    Vacation,
}

/// Classifies a single day. A holiday wins over sick leave, sick leave over vacation.
pub fn classify_day(
    date: NaiveDate,
    holidays: &HashSet<NaiveDate>,
    sick_times: &[SickTime],
    vacations: &[Vacation],
) -> DayKind {
    if is_holiday(holidays, date) {
        DayKind::Holiday
    } else if is_sick_day(sick_times, date) {
        DayKind::Sick
    } else if is_vacation_day(vacations, date) {
        DayKind::Vacation
    } else {
        DayKind::Workday
    }
}

/// True iff the day is neither a holiday, a sick day, nor an approved vacation day.
/// Target hours are not considered here; a Sunday still "counts" but owes zero minutes.
pub fn should_count_as_work_day(
    date: NaiveDate,
    holidays: &HashSet<NaiveDate>,
    sick_times: &[SickTime],
    vacations: &[Vacation],
) -> bool {
    classify_day(date, holidays, sick_times, vacations) == DayKind::Workday
}

/// Whether an approved vacation day should be handed back: it is also a holiday or sick day.
pub fn is_restored_vacation_day(
    date: NaiveDate,
    holidays: &HashSet<NaiveDate>,
    sick_times: &[SickTime],
) -> bool {
    is_holiday(holidays, date) || is_sick_day(sick_times, date)
}
