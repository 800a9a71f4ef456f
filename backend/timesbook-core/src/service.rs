// src/service.rs

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::booking::BookingRequest;
use crate::calendar::HolidaySource;
use crate::clock::Clock;
use crate::error::{TimesbookError, ValidationError};
use crate::flextime::{EngineSettings, FlextimeBalance, FlextimeEngine};
use crate::models::{BookingEntry, Correction, SickTime, User, Vacation, VacationStatus, WorkingModel};
use crate::repository::Repositories;
use crate::vacation_ledger::{VacationBalance, VacationLedger};
use crate::working_model::{append_version, remove_version, sorted_versions};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn ensure_range(from: NaiveDate, till: NaiveDate) -> Result<(), ValidationError> {
    if from > till {
        return Err(ValidationError::InvalidRange { from, till });
    }
    Ok(())
}

/// Orchestrates lookups, engines and writes for the HTTP layer and the CLI.
#[derive(Clone)]
pub struct TimeAccountService {
    repos: Repositories,
    holidays: Arc<dyn HolidaySource>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    request_timeout: Duration,
}

impl TimeAccountService {
    pub fn new(
        repos: Repositories,
        holidays: Arc<dyn HolidaySource>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
        request_timeout: Duration,
    ) -> Self {
        Self {
            repos,
            holidays,
            clock,
            settings,
            request_timeout,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    async fn find_user(&self, username: &str) -> Result<User, TimesbookError> {
        let users = self.repos.users.as_ref();
        self.settings
            .retry
            .run("find user", move || users.find_by_username(username))
            .await?
            .ok_or_else(|| TimesbookError::not_found("User", username))
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, TimesbookError>>,
    ) -> Result<T, TimesbookError> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} exceeded {:?}", operation, self.request_timeout);
                Err(TimesbookError::Timeout {
                    secs: self.request_timeout.as_secs(),
                })
            }
        }
    }

    // --- Balances ---

    pub async fn flextime(&self, username: &str) -> Result<FlextimeBalance, TimesbookError> {
        self.flextime_as_of(username, self.today()).await
    }

    pub async fn flextime_as_of(
        &self,
        username: &str,
        as_of: NaiveDate,
    ) -> Result<FlextimeBalance, TimesbookError> {
        self.with_timeout("flextime", async {
            let user = self.find_user(username).await?;
            FlextimeEngine::new(&self.repos, self.holidays.as_ref(), self.settings)
                .compute(&user, as_of)
                .await
        })
        .await
    }

    pub async fn remaining_vacation(&self, username: &str) -> Result<VacationBalance, TimesbookError> {
        self.remaining_vacation_as_of(username, self.today()).await
    }

    pub async fn remaining_vacation_as_of(
        &self,
        username: &str,
        as_of: NaiveDate,
    ) -> Result<VacationBalance, TimesbookError> {
        self.with_timeout("remaining vacation", async {
            let user = self.find_user(username).await?;
            VacationLedger::new(&self.repos, self.holidays.as_ref(), self.settings)
                .compute(&user, as_of)
                .await
        })
        .await
    }

    // --- Booking Entries ---

    pub async fn book_day(
        &self,
        username: &str,
        request: BookingRequest,
    ) -> Result<BookingEntry, TimesbookError> {
        let entry = request.into_entry(username)?;
        self.find_user(&entry.username).await?;
        self.repos.bookings.upsert_booking(entry.clone()).await?;
        info!("Booked {} for {}", entry.day, entry.username);
        Ok(entry)
    }

    pub async fn booking_entries(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<BookingEntry>, TimesbookError> {
        ensure_range(from, till)?;
        self.repos
            .bookings
            .find_by_username_and_range(username, from, till)
            .await
    }

    // --- Vacations and Sick Times ---

    pub async fn request_vacation(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vacation, TimesbookError> {
        ensure_range(from, till)?;
        self.find_user(username).await?;
        let vacation = self
            .repos
            .vacations
            .insert_exclusive(username, from, till, VacationStatus::Pending)
            .await?;
        info!("Vacation {} requested by {}: {}..{}", vacation.id, username, from, till);
        Ok(vacation)
    }

    pub async fn set_vacation_status(
        &self,
        id: u64,
        status: VacationStatus,
    ) -> Result<Vacation, TimesbookError> {
        let vacation = self.repos.vacations.set_status(id, status).await?;
        info!("Vacation {} is now {}", id, status);
        Ok(vacation)
    }

    pub async fn vacations(&self, username: &str) -> Result<Vec<Vacation>, TimesbookError> {
        self.repos.vacations.find_all_by_username(username).await
    }

    pub async fn record_sick_time(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<SickTime, TimesbookError> {
        ensure_range(from, till)?;
        self.find_user(username).await?;
        self.repos.sick_times.insert_sick_time(username, from, till).await
    }

    // --- Corrections ---

    pub async fn add_correction(
        &self,
        username: &str,
        kind: &str,
        value: i64,
        reason: &str,
        date: NaiveDate,
    ) -> Result<Correction, TimesbookError> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(ValidationError::MissingField {
                field: "type".to_string(),
            }
            .into());
        }
        self.find_user(username).await?;
        let correction = self
            .repos
            .corrections
            .insert_correction(username, kind, value, reason.trim(), date)
            .await?;
        info!("Correction of {} min ({}) recorded for {}", value, kind, username);
        Ok(correction)
    }

    pub async fn corrections(&self, username: &str, kind: &str) -> Result<Vec<Correction>, TimesbookError> {
        self.repos
            .corrections
            .find_by_username_and_type(username, kind)
            .await
    }

    // --- Working Models ---

    pub async fn working_models(&self, username: &str) -> Result<Vec<WorkingModel>, TimesbookError> {
        let user = self.find_user(username).await?;
        Ok(sorted_versions(&user.working_models))
    }

    pub async fn add_working_model(
        &self,
        username: &str,
        model: WorkingModel,
    ) -> Result<Vec<WorkingModel>, TimesbookError> {
        let valid_from = model.valid_from;
        let versions = self
            .repos
            .users
            .update_working_models(
                username,
                Box::new(move |versions: &mut Vec<WorkingModel>| -> Result<(), TimesbookError> {
                    Ok(append_version(versions, model)?)
                }),
            )
            .await?;
        info!("Working model from {} added for {}", valid_from, username);
        Ok(versions)
    }

    pub async fn remove_working_model(
        &self,
        username: &str,
        valid_from: NaiveDate,
    ) -> Result<Vec<WorkingModel>, TimesbookError> {
        let versions = self
            .repos
            .users
            .update_working_models(
                username,
                Box::new(move |versions: &mut Vec<WorkingModel>| -> Result<(), TimesbookError> {
                    remove_version(versions, valid_from).map(|_| ())
                }),
            )
            .await?;
        info!("Working model from {} removed for {}", valid_from, username);
        Ok(versions)
    }

    // --- Users ---

    pub async fn remove_user(&self, username: &str) -> Result<(), TimesbookError> {
        if !self.repos.users.remove_user(username).await? {
            return Err(TimesbookError::not_found("User", username));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::StaticHolidays;
    use crate::clock::FixedClock;
    use crate::models::Role;
    use crate::repository::{BookingRepository, InMemoryStore, UserRepository};
    use crate::retry::RetryPolicy;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn create_test_service(store: &InMemoryStore, today: &str) -> TimeAccountService {
        TimeAccountService::new(
            Repositories::in_memory(Arc::new(store.clone())),
            Arc::new(StaticHolidays::default()),
            Arc::new(FixedClock::new(d(today))),
            EngineSettings {
                retry: RetryPolicy::none(),
                ..Default::default()
            },
            Duration::from_secs(5),
        )
    }

    async fn seed_user(store: &InMemoryStore) {
        store
            .save_user(User {
                username: "max".to_string(),
                name: "Max Mustermann".to_string(),
                organization: "ACME".to_string(),
                role: Role::User,
                registration_date: d("2023-01-01"),
                working_models: vec![WorkingModel::new([8, 8, 8, 8, 8, 0], d("2023-01-01"), 24)],
            })
            .await
            .unwrap();
    }

    fn booking(day: &str, start: &str, end: &str, pause: &str) -> BookingRequest {
        BookingRequest {
            day: Some(day.to_string()),
            start: Some(format!("{}T{}:00Z", day, start)),
            end: Some(format!("{}T{}:00Z", day, end)),
            pause: Some(pause.to_string()),
            activities: None,
        }
    }

    #[tokio::test]
    async fn flextime_uses_the_clock_for_as_of() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-01-08");
        assert_eq!(service.flextime("max").await.unwrap().balance, -2400);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let service = create_test_service(&InMemoryStore::new(), "2023-01-08");
        let err = service.flextime("nobody").await.unwrap_err();
        assert!(matches!(err, TimesbookError::NotFound { entity: "User", .. }));
        assert_eq!(err.code(), 4021);
    }

    #[tokio::test]
    async fn booked_day_reads_back_with_its_worked_minutes() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-01-08");
        service
            .book_day("max", booking("2023-01-02", "08:00", "17:00", "00:30"))
            .await
            .unwrap();
        let entries = service
            .booking_entries("max", d("2023-01-02"), d("2023-01-02"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(crate::booking::worked_minutes(&entries[0]), 510);
    }

    #[tokio::test]
    async fn invalid_booking_is_rejected_before_storage() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-01-08");
        let err = service
            .book_day("max", booking("2023-01-02", "08:00", "08:20", "00:30"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 4019);
        let stored = BookingRepository::find_by_username_and_range(
            &store,
            "max",
            d("2023-01-01"),
            d("2023-12-31"),
        )
        .await
        .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn reversed_ranges_are_invalid() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-01-08");
        let err = service
            .request_vacation("max", d("2023-07-14"), d("2023-07-10"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 4013);
        assert!(service
            .booking_entries("max", d("2023-02-01"), d("2023-01-01"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn second_overlapping_vacation_is_a_conflict() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-06-01");
        let first = service
            .request_vacation("max", d("2023-07-10"), d("2023-07-14"))
            .await
            .unwrap();
        assert_eq!(first.status, VacationStatus::Pending);

        let err = service
            .request_vacation("max", d("2023-07-12"), d("2023-07-20"))
            .await
            .unwrap_err();
        assert!(matches!(err, TimesbookError::Overlap { .. }));
        assert_eq!(err.code(), 4015);
        assert_eq!(service.vacations("max").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn approving_a_vacation_reduces_remaining_days() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-08-01");
        let before = service.remaining_vacation("max").await.unwrap();
        let vacation = service
            .request_vacation("max", d("2023-07-10"), d("2023-07-14"))
            .await
            .unwrap();
        service
            .set_vacation_status(vacation.id, VacationStatus::Approved)
            .await
            .unwrap();
        let after = service.remaining_vacation("max").await.unwrap();
        assert_eq!(before.remaining - after.remaining, rust_decimal_macros::dec!(5));
    }

    #[tokio::test]
    async fn working_models_must_advance() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-08-01");
        let err = service
            .add_working_model("max", WorkingModel::new([6; 6], d("2023-01-01"), 20))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 4024);

        let versions = service
            .add_working_model("max", WorkingModel::new([6, 6, 6, 6, 6, 0], d("2023-03-01"), 20))
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);

        let remaining = service
            .remove_working_model("max", d("2023-03-01"))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(service.working_models("max").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrections_shift_the_balance() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-01-08");
        service
            .add_correction("max", "flextime", 2400, " overtime sheet ", d("2023-01-06"))
            .await
            .unwrap();
        assert_eq!(service.flextime("max").await.unwrap().balance, 0);
        let listed = service.corrections("max", "flextime").await.unwrap();
        assert_eq!(listed[0].reason, "overtime sheet");

        let err = service
            .add_correction("max", "  ", 10, "", d("2023-01-06"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 4014);
    }

    #[tokio::test]
    async fn removing_a_user_cascades_and_then_reports_not_found() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-01-08");
        service
            .book_day("max", booking("2023-01-02", "08:00", "16:00", "00:00"))
            .await
            .unwrap();
        service.remove_user("max").await.unwrap();
        assert!(store.find_by_username("max").await.unwrap().is_none());
        assert!(service
            .booking_entries("max", d("2023-01-01"), d("2023-12-31"))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            service.remove_user("max").await,
            Err(TimesbookError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn long_walks_are_cut_off_by_the_request_timeout() {
        let store = InMemoryStore::new();
        store
            .save_user(User {
                username: "ancient".to_string(),
                name: "Ancient".to_string(),
                organization: "ACME".to_string(),
                role: Role::User,
                registration_date: d("1000-01-01"),
                working_models: vec![WorkingModel::new([8, 8, 8, 8, 8, 0], d("1000-01-01"), 24)],
            })
            .await
            .unwrap();
        let service = TimeAccountService {
            request_timeout: Duration::from_millis(1),
            ..create_test_service(&store, "2023-01-08")
        };
        let flextime = service.flextime_as_of("ancient", d("9000-12-31")).await;
        assert!(matches!(flextime, Err(TimesbookError::Timeout { .. })));
        let vacation = service.remaining_vacation_as_of("ancient", d("9000-12-31")).await;
        assert!(matches!(vacation, Err(TimesbookError::Timeout { .. })));
    }

    #[tokio::test]
    async fn open_ended_vacation_is_only_walked_inside_the_window() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = TimeAccountService {
            request_timeout: Duration::from_millis(500),
            ..create_test_service(&store, "2023-08-01")
        };
        let vacation = service
            .request_vacation("max", d("2023-12-25"), NaiveDate::MAX)
            .await
            .unwrap();
        service
            .set_vacation_status(vacation.id, VacationStatus::Approved)
            .await
            .unwrap();
        let balance = service.remaining_vacation("max").await.unwrap();
        // Dec 25..29 are the only working days left in 2023.
        assert_eq!(balance.taken_days, 5);
    }

    #[tokio::test]
    async fn reactivated_vacation_cannot_double_book_days() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-08-01");
        let first = service
            .request_vacation("max", d("2023-07-10"), d("2023-07-14"))
            .await
            .unwrap();
        service
            .set_vacation_status(first.id, VacationStatus::Canceled)
            .await
            .unwrap();
        let second = service
            .request_vacation("max", d("2023-07-12"), d("2023-07-13"))
            .await
            .unwrap();
        service
            .set_vacation_status(second.id, VacationStatus::Approved)
            .await
            .unwrap();

        let err = service
            .set_vacation_status(first.id, VacationStatus::Approved)
            .await
            .unwrap_err();
        assert_eq!(err.code(), 4015);
        assert_eq!(service.remaining_vacation("max").await.unwrap().taken_days, 2);
    }

    #[tokio::test]
    async fn concurrent_working_model_appends_are_not_lost() {
        let store = InMemoryStore::new();
        seed_user(&store).await;
        let service = create_test_service(&store, "2023-08-01");
        let handles: Vec<_> = (2..=9)
            .map(|month| {
                let service = service.clone();
                tokio::spawn(async move {
                    let valid_from = NaiveDate::from_ymd_opt(2023, month, 1).unwrap();
                    service
                        .add_working_model("max", WorkingModel::new([6, 6, 6, 6, 6, 0], valid_from, 20))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(err) => assert_eq!(err.code(), 4024),
            }
        }
        assert!(accepted >= 1);
        let stored = service.working_models("max").await.unwrap();
        assert_eq!(stored.len(), 1 + accepted);
    }
}
