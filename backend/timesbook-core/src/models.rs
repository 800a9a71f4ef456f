// src/models.rs

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Constants ---

/// Correction type summed into the flextime balance.
pub const CORRECTION_TYPE_FLEXTIME: &str = "flextime";

/// Upper bound for target hours on a single weekday.
pub const MAX_TARGET_HOURS: u8 = 10;

type Username = String;

// --- Users ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: Username,
    pub name: String,
    pub organization: String,
    pub role: Role,
    /// Start of all time accounting for this user.
    pub registration_date: NaiveDate,
    /// Stored in insertion order; sort by `valid_from` before resolving.
    #[serde(default)]
    pub working_models: Vec<WorkingModel>,
}

// --- Working Models ---

/// Weekly target hours, effective from `valid_from` until the next version starts.
/// Sunday is never modeled and always counts as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingModel {
    #[serde(rename = "1")]
    pub monday: u8,
    #[serde(rename = "2")]
    pub tuesday: u8,
    #[serde(rename = "3")]
    pub wednesday: u8,
    #[serde(rename = "4")]
    pub thursday: u8,
    #[serde(rename = "5")]
    pub friday: u8,
    #[serde(rename = "6")]
    pub saturday: u8,
    pub valid_from: NaiveDate,
    /// Annual vacation days granted while this version is active.
    pub vacation_entitlement: u16,
}

impl WorkingModel {
    /// Builds a model from Monday..Saturday hours.
    pub fn new(hours: [u8; 6], valid_from: NaiveDate, vacation_entitlement: u16) -> Self {
        let [monday, tuesday, wednesday, thursday, friday, saturday] = hours;
        Self {
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            valid_from,
            vacation_entitlement,
        }
    }

    pub fn target_hours(&self, weekday: Weekday) -> u8 {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => 0,
        }
    }

    pub fn is_working_day(&self, weekday: Weekday) -> bool {
        self.target_hours(weekday) > 0
    }

    /// Monday..Saturday hours paired with their weekday.
    pub fn weekly_hours(&self) -> [(Weekday, u8); 6] {
        [
            (Weekday::Mon, self.monday),
            (Weekday::Tue, self.tuesday),
            (Weekday::Wed, self.wednesday),
            (Weekday::Thu, self.thursday),
            (Weekday::Fri, self.friday),
            (Weekday::Sat, self.saturday),
        ]
    }
}

// --- Intervals ---

/// An inclusive `[from, till]` span of calendar days.
pub trait DateInterval {
    fn from_date(&self) -> NaiveDate;
    fn till_date(&self) -> NaiveDate;

    fn contains(&self, date: NaiveDate) -> bool {
        self.from_date() <= date && date <= self.till_date()
    }

    /// Iterates every day of the span, both ends included.
    fn days(&self) -> DayIter {
        DayIter::new(self.from_date(), self.till_date())
    }
}

/// Inclusive day-by-day walk from `next` to `last`.
#[derive(Debug, Clone)]
pub struct DayIter {
    next: Option<NaiveDate>,
    last: NaiveDate,
}

impl DayIter {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            next: (first <= last).then_some(first),
            last,
        }
    }
}

impl Iterator for DayIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| *d <= self.last);
        Some(current)
    }
}

// --- Booking Entries ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEntry {
    pub username: Username,
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Break duration as `hh:mm`.
    pub pause: String,
    #[serde(default)]
    pub activities: String,
}

// --- Vacations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VacationStatus {
    Pending,
    Approved,
    Rejected,
    Canceled,
}

impl VacationStatus {
    /// Whether the request still blocks its date range for new requests.
    pub fn is_active(self) -> bool {
        self != VacationStatus::Canceled
    }
}

impl fmt::Display for VacationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VacationStatus::Pending => write!(f, "pending"),
            VacationStatus::Approved => write!(f, "approved"),
            VacationStatus::Rejected => write!(f, "rejected"),
            VacationStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for VacationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(VacationStatus::Pending),
            "approved" => Ok(VacationStatus::Approved),
            "rejected" => Ok(VacationStatus::Rejected),
            "canceled" | "cancelled" => Ok(VacationStatus::Canceled),
            other => Err(format!("Unknown vacation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vacation {
    pub id: u64,
    pub username: Username,
    pub from: NaiveDate,
    pub till: NaiveDate,
    pub status: VacationStatus,
}

impl DateInterval for Vacation {
    fn from_date(&self) -> NaiveDate {
        self.from
    }
    fn till_date(&self) -> NaiveDate {
        self.till
    }
}

// --- Sick Times ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SickTime {
    pub id: u64,
    pub username: Username,
    pub from: NaiveDate,
    pub till: NaiveDate,
}

impl DateInterval for SickTime {
    fn from_date(&self) -> NaiveDate {
        self.from
    }
    fn till_date(&self) -> NaiveDate {
        self.till
    }
}

// --- Corrections ---

/// Manual signed adjustment in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub id: u64,
    pub username: Username,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: i64,
    #[serde(default)]
    pub reason: String,
    pub date: NaiveDate,
}
