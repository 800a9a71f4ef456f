// src/flextime.rs

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::booking::worked_minutes;
use crate::calendar::{HolidayCalendar, HolidayPolicy, HolidaySource};
use crate::day_classifier::should_count_as_work_day;
use crate::error::TimesbookError;
use crate::models::{Correction, DayIter, SickTime, User, Vacation, VacationStatus, CORRECTION_TYPE_FLEXTIME};
use crate::repository::Repositories;
use crate::retry::RetryPolicy;
use crate::working_model::WorkingModelResolver;

// --- Policies ---

/// Which flextime corrections enter the balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionPolicy {
    /// Every correction of the user, whatever its date.
    #[default]
    Lifetime,
    /// Only corrections dated inside `[registrationDate, asOf]`.
    WithinPeriod,
}

impl FromStr for CorrectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lifetime" => Ok(CorrectionPolicy::Lifetime),
            "within_period" => Ok(CorrectionPolicy::WithinPeriod),
            other => Err(format!("Unknown correction policy: {}", other)),
        }
    }
}

pub fn sum_corrections(
    corrections: &[Correction],
    policy: CorrectionPolicy,
    from: NaiveDate,
    till: NaiveDate,
) -> i64 {
    corrections
        .iter()
        .filter(|c| match policy {
            CorrectionPolicy::Lifetime => true,
            CorrectionPolicy::WithinPeriod => from <= c.date && c.date <= till,
        })
        .map(|c| c.value)
        .sum()
}

/// Knobs shared by the flextime engine and the vacation ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub holiday_policy: HolidayPolicy,
    pub correction_policy: CorrectionPolicy,
    pub retry: RetryPolicy,
}

// --- Result ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlextimeBalance {
    pub expected_minutes: i64,
    pub actual_minutes: i64,
    pub correction_minutes: i64,
    /// `actual - expected + corrections`; positive means overtime.
    pub balance: i64,
}

// --- Engine ---

pub struct FlextimeEngine<'a> {
    repos: &'a Repositories,
    holidays: &'a dyn HolidaySource,
    settings: EngineSettings,
}

impl<'a> FlextimeEngine<'a> {
    pub fn new(
        repos: &'a Repositories,
        holidays: &'a dyn HolidaySource,
        settings: EngineSettings,
    ) -> Self {
        Self {
            repos,
            holidays,
            settings,
        }
    }

    /// Signed flextime in minutes for `[registrationDate, as_of]`, both ends included.
    pub async fn compute(&self, user: &User, as_of: NaiveDate) -> Result<FlextimeBalance, TimesbookError> {
        let from = user.registration_date;
        let username = user.username.as_str();
        let retry = self.settings.retry;

        let expected_minutes = if from <= as_of {
            let sick_repo = self.repos.sick_times.as_ref();
            let sick_times = retry
                .run("find sick times", move || {
                    sick_repo.find_by_username_and_range(username, from, as_of)
                })
                .await?;
            let vacation_repo = self.repos.vacations.as_ref();
            let vacations = retry
                .run("find approved vacations", move || {
                    vacation_repo.find_by_username_and_status(username, VacationStatus::Approved)
                })
                .await?;
            self.expected_minutes(user, from, as_of, &sick_times, &vacations)
                .await?
        } else {
            0
        };

        let booking_repo = self.repos.bookings.as_ref();
        let bookings = retry
            .run("find booking entries", move || {
                booking_repo.find_by_username_and_range(username, from, as_of)
            })
            .await?;
        let actual_minutes: i64 = bookings.iter().map(worked_minutes).sum();

        let correction_repo = self.repos.corrections.as_ref();
        let corrections = retry
            .run("find corrections", move || {
                correction_repo.find_by_username_and_type(username, CORRECTION_TYPE_FLEXTIME)
            })
            .await?;
        let correction_minutes =
            sum_corrections(&corrections, self.settings.correction_policy, from, as_of);

        let balance = FlextimeBalance {
            expected_minutes,
            actual_minutes,
            correction_minutes,
            balance: actual_minutes - expected_minutes + correction_minutes,
        };
        info!(
            "Flextime for {} as of {}: expected={} actual={} corrections={} balance={}",
            username, as_of, expected_minutes, actual_minutes, correction_minutes, balance.balance
        );
        Ok(balance)
    }

    async fn expected_minutes(
        &self,
        user: &User,
        from: NaiveDate,
        till: NaiveDate,
        sick_times: &[SickTime],
        vacations: &[Vacation],
    ) -> Result<i64, TimesbookError> {
        let resolver = WorkingModelResolver::new(&user.working_models);
        let mut calendar = HolidayCalendar::new(
            self.holidays,
            self.settings.holiday_policy,
            self.settings.retry,
        );

        let mut expected = 0i64;
        let mut current_key: Option<(NaiveDate, i32)> = None;
        let mut current_year = None;
        for day in DayIter::new(from, till) {
            if current_year != Some(day.year()) {
                // Year boundary: give the runtime a chance to enforce request timeouts.
                current_year = Some(day.year());
                tokio::task::yield_now().await;
            }
            let Some(model) = resolver.resolve(day) else {
                continue;
            };
            let key = (model.valid_from, day.year());
            if current_key != Some(key) {
                debug!(
                    "{}: working model from {} applies in {}",
                    user.username, model.valid_from, key.1
                );
                current_key = Some(key);
            }

            let target_hours = model.target_hours(day.weekday());
            if target_hours == 0 {
                continue;
            }
            let holidays = calendar.holidays_for_year(day.year()).await?;
            if should_count_as_work_day(day, holidays, sick_times, vacations) {
                expected += i64::from(target_hours) * 60;
            }
        }
        Ok(expected)
    }
}
