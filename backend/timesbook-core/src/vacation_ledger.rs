// src/vacation_ledger.rs

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar::{HolidayCalendar, HolidaySource};
use crate::day_classifier::is_restored_vacation_day;
use crate::error::{TimesbookError, ValidationError};
use crate::flextime::EngineSettings;
use crate::models::{DayIter, User, VacationStatus, WorkingModel};
use crate::repository::Repositories;
use crate::working_model::WorkingModelResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VacationBalance {
    /// Pro-rated entitlement accrued from registration through Dec 31 of the `asOf` year.
    pub entitlement: Decimal,
    pub taken_days: u32,
    pub restored_days: u32,
    pub remaining: Decimal,
}

fn year_end(year: i32) -> Result<NaiveDate, ValidationError> {
    NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| ValidationError::InvalidDate {
        value: format!("{}-12-31", year),
    })
}

/// Days of `year` on which `model` has positive target hours, holidays ignored.
pub fn working_days_in_year(model: &WorkingModel, year: i32) -> u32 {
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };
    DayIter::new(first, last)
        .filter(|day| model.is_working_day(day.weekday()))
        .count() as u32
}

/// Entitlement earned per working day under `model` in `year`. Zero when the model has no working days.
pub fn daily_share(model: &WorkingModel, year: i32) -> Decimal {
    match working_days_in_year(model, year) {
        0 => Decimal::ZERO,
        days => Decimal::from(model.vacation_entitlement) / Decimal::from(days),
    }
}

/// Sums the daily shares over every working day in `[from, till]`.
pub fn accrued_entitlement(resolver: &WorkingModelResolver, from: NaiveDate, till: NaiveDate) -> Decimal {
    let mut total = Decimal::ZERO;
    let mut cached: Option<((NaiveDate, i32), Decimal)> = None;

    for day in DayIter::new(from, till) {
        let Some(model) = resolver.resolve(day) else {
            continue;
        };
        if !model.is_working_day(day.weekday()) {
            continue;
        }
        let key = (model.valid_from, day.year());
        let share = match cached {
            Some((cached_key, share)) if cached_key == key => share,
            _ => {
                let share = daily_share(model, day.year());
                debug!(
                    "Daily vacation share for model {} in {}: {}",
                    model.valid_from, key.1, share
                );
                cached = Some((key, share));
                share
            }
        };
        total += share;
    }
    total
}

pub struct VacationLedger<'a> {
    repos: &'a Repositories,
    holidays: &'a dyn HolidaySource,
    settings: EngineSettings,
}

impl<'a> VacationLedger<'a> {
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

    /// Remaining vacation days as of `as_of`. Fractional; rounding is left to presentation.
    pub async fn compute(&self, user: &User, as_of: NaiveDate) -> Result<VacationBalance, TimesbookError> {
        let from = user.registration_date;
        let till = year_end(as_of.year())?;
        let username = user.username.as_str();
        let retry = self.settings.retry;
        let resolver = WorkingModelResolver::new(&user.working_models);

        let mut entitlement = Decimal::ZERO;
        for year in from.year()..=till.year() {
            let year_from = NaiveDate::from_ymd_opt(year, 1, 1).map_or(from, |d| d.max(from));
            entitlement += accrued_entitlement(&resolver, year_from, year_end(year)?.min(till));
            tokio::task::yield_now().await;
        }

        let vacation_repo = self.repos.vacations.as_ref();
        let vacations = retry
            .run("find approved vacations", move || {
                vacation_repo.find_by_username_and_status(username, VacationStatus::Approved)
            })
            .await?;
        let sick_repo = self.repos.sick_times.as_ref();
        let sick_times = if from <= till {
            retry
                .run("find sick times", move || {
                    sick_repo.find_by_username_and_range(username, from, till)
                })
                .await?
        } else {
            Vec::new()
        };

        let mut calendar = HolidayCalendar::new(
            self.holidays,
            self.settings.holiday_policy,
            self.settings.retry,
        );
        let mut taken_days = 0u32;
        let mut restored_days = 0u32;
        for vacation in &vacations {
            let first = vacation.from.max(from);
            let last = vacation.till.min(till);
            let mut current_year = None;
            for day in DayIter::new(first, last) {
                if current_year != Some(day.year()) {
                    current_year = Some(day.year());
                    tokio::task::yield_now().await;
                }
                let Some(model) = resolver.resolve(day) else {
                    continue;
                };
                if !model.is_working_day(day.weekday()) {
                    continue;
                }
                taken_days += 1;
                let holidays = calendar.holidays_for_year(day.year()).await?;
                if is_restored_vacation_day(day, holidays, &sick_times) {
                    restored_days += 1;
                }
            }
        }

        let remaining = entitlement - Decimal::from(taken_days) + Decimal::from(restored_days);
        info!(
            "Vacation for {} as of {}: entitlement={} taken={} restored={} remaining={}",
            username,
            as_of,
            entitlement.round_dp(2),
            taken_days,
            restored_days,
            remaining.round_dp(2)
        );
        Ok(VacationBalance {
            entitlement,
            taken_days,
            restored_days,
            remaining,
        })
    }
}
