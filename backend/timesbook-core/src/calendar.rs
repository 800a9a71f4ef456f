// src/calendar.rs

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::TimesbookError;
use crate::holiday_client::HolidayClientError;
use crate::models::{DateInterval, SickTime, Vacation, VacationStatus};
use crate::retry::RetryPolicy;

// --- Holiday Source ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub date: NaiveDate,
}

/// External calendar of national holidays, queried one year at a time.
#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>, HolidayClientError>;
}

/// Fixed holiday table, used for seeded deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticHolidays {
    by_year: BTreeMap<i32, Vec<Holiday>>,
}

impl StaticHolidays {
    pub fn new(holidays: impl IntoIterator<Item = Holiday>) -> Self {
        let mut by_year: BTreeMap<i32, Vec<Holiday>> = BTreeMap::new();
        for holiday in holidays {
            by_year.entry(holiday.date.year()).or_default().push(holiday);
        }
        Self { by_year }
    }
}

#[async_trait]
impl HolidaySource for StaticHolidays {
    async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>, HolidayClientError> {
        Ok(self.by_year.get(&year).cloned().unwrap_or_default())
    }
}

// --- Outage Policy ---

/// What a computation does when the holiday source cannot deliver a year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayPolicy {
    /// Fail the whole computation with `UpstreamUnavailable`.
    #[default]
    Strict,
    /// Continue as if the year had no holidays, logging a warning.
    AssumeNoHolidays,
}

impl FromStr for HolidayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(HolidayPolicy::Strict),
            "assume_no_holidays" => Ok(HolidayPolicy::AssumeNoHolidays),
            other => Err(format!("Unknown holiday policy: {}", other)),
        }
    }
}

// --- Per-Computation Calendar ---

/// Year-scoped holiday cache living for a single computation. Each year is
/// fetched at most once, never per day.
pub struct HolidayCalendar<'a> {
    source: &'a dyn HolidaySource,
    policy: HolidayPolicy,
    retry: RetryPolicy,
    years: HashMap<i32, HashSet<NaiveDate>>,
}

impl<'a> HolidayCalendar<'a> {
    pub fn new(source: &'a dyn HolidaySource, policy: HolidayPolicy, retry: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            retry,
            years: HashMap::new(),
        }
    }

    /// Holidays of `year`, fetching on first use.
    pub async fn holidays_for_year(
        &mut self,
        year: i32,
    ) -> Result<&HashSet<NaiveDate>, TimesbookError> {
        if !self.years.contains_key(&year) {
            let fetched = self.fetch(year).await?;
            self.years.insert(year, fetched);
        }
        Ok(&self.years[&year])
    }

    async fn fetch(&self, year: i32) -> Result<HashSet<NaiveDate>, TimesbookError> {
        let source = self.source;
        let result = self
            .retry
            .run("fetch holidays", move || source.fetch_year(year))
            .await;
        match result {
            Ok(holidays) => {
                debug!("Loaded {} holidays for {}", holidays.len(), year);
                Ok(holidays.into_iter().map(|h| h.date).collect())
            }
            Err(e) => match self.policy {
                HolidayPolicy::Strict => Err(TimesbookError::UpstreamUnavailable { year, source: e }),
                HolidayPolicy::AssumeNoHolidays => {
                    warn!(
                        "Holidays for {} unavailable ({}); continuing without holidays for that year",
                        year, e
                    );
                    Ok(HashSet::new())
                }
            },
        }
    }

    /// Whether `date` is a holiday, loading its year if needed.
    pub async fn is_holiday(&mut self, date: NaiveDate) -> Result<bool, TimesbookError> {
        let holidays = self.holidays_for_year(date.year()).await?;
        Ok(is_holiday(holidays, date))
    }

    pub fn loaded_years(&self) -> usize {
        self.years.len()
    }
}

// --- Day Predicates ---

pub fn is_holiday(holidays: &HashSet<NaiveDate>, date: NaiveDate) -> bool {
    holidays.contains(&date)
}

pub fn is_sick_day(sick_times: &[SickTime], date: NaiveDate) -> bool {
    sick_times.iter().any(|s| s.contains(date))
}

/// Only approved vacations count.
pub fn is_vacation_day(vacations: &[Vacation], date: NaiveDate) -> bool {
    vacations
        .iter()
        .filter(|v| v.status == VacationStatus::Approved)
        .any(|v| v.contains(date))
}
