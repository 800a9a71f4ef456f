// src/vacation_ledger_tests.rs

#[cfg(test)]
mod tests {
    use crate::calendar::{Holiday, HolidayPolicy, HolidaySource, StaticHolidays};
    use crate::error::TimesbookError;
    use crate::flextime::{CorrectionPolicy, EngineSettings};
    use crate::holiday_client::HolidayClientError;
    use crate::models::*;
    use crate::repository::*;
    use crate::retry::RetryPolicy;
    use crate::vacation_ledger::*;
    use crate::working_model::WorkingModelResolver;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn weekdays(valid_from: &str, entitlement: u16) -> WorkingModel {
        WorkingModel::new([8, 8, 8, 8, 8, 0], d(valid_from), entitlement)
    }

    fn create_test_user(registered: &str, models: Vec<WorkingModel>) -> User {
        User {
            username: "erika".to_string(),
            name: "Erika Musterfrau".to_string(),
            organization: "ACME".to_string(),
            role: Role::User,
            registration_date: d(registered),
            working_models: models,
        }
    }

    fn strict() -> EngineSettings {
        EngineSettings {
            holiday_policy: HolidayPolicy::Strict,
            correction_policy: CorrectionPolicy::Lifetime,
            retry: RetryPolicy::none(),
        }
    }

    async fn approve(store: &InMemoryStore, from: &str, till: &str) {
        let vacation = store
            .insert_exclusive("erika", d(from), d(till), VacationStatus::Pending)
            .await
            .unwrap();
        store.set_status(vacation.id, VacationStatus::Approved).await.unwrap();
    }

    async fn ledger(
        store: &InMemoryStore,
        holidays: &dyn HolidaySource,
        user: &User,
        as_of: &str,
    ) -> Result<VacationBalance, TimesbookError> {
        let repos = Repositories::in_memory(Arc::new(store.clone()));
        VacationLedger::new(&repos, holidays, strict())
            .compute(user, d(as_of))
            .await
    }

    struct UnreachableCalendar;

    #[async_trait]
    impl HolidaySource for UnreachableCalendar {
        async fn fetch_year(&self, _year: i32) -> Result<Vec<Holiday>, HolidayClientError> {
            Err(HolidayClientError::ApiError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "calendar offline".to_string(),
            })
        }
    }

    #[test]
    fn full_year_counts_weekday_working_days() {
        assert_eq!(working_days_in_year(&weekdays("2023-01-01", 24), 2023), 260);
        // 2024 is a leap year starting on a Monday
        assert_eq!(working_days_in_year(&weekdays("2024-01-01", 24), 2024), 262);
    }

    #[test]
    fn model_without_working_days_has_zero_share() {
        let idle = WorkingModel::new([0; 6], d("2023-01-01"), 24);
        assert_eq!(daily_share(&idle, 2023), dec!(0));
        let resolver = WorkingModelResolver::new(&[idle]);
        assert_eq!(accrued_entitlement(&resolver, d("2023-01-01"), d("2023-12-31")), dec!(0));
    }

    #[test]
    fn full_year_accrues_the_whole_entitlement() {
        let resolver = WorkingModelResolver::new(&[weekdays("2023-01-01", 24)]);
        let total = accrued_entitlement(&resolver, d("2023-01-01"), d("2023-12-31"));
        assert_eq!(total.round_dp(6), dec!(24));
    }

    #[test]
    fn mid_year_model_divides_by_the_full_year() {
        let resolver = WorkingModelResolver::new(&[weekdays("2023-01-01", 24), weekdays("2023-07-01", 30)]);
        let total = accrued_entitlement(&resolver, d("2023-01-01"), d("2023-12-31"));
        // 130 working days at 24/260 and 130 at 30/260
        assert_eq!(total.round_dp(6), dec!(27));
    }

    #[tokio::test]
    async fn mid_year_registration_accrues_pro_rata() {
        let store = InMemoryStore::new();
        let user = create_test_user("2023-07-01", vec![weekdays("2023-01-01", 24)]);
        let balance = ledger(&store, &StaticHolidays::default(), &user, "2023-08-15").await.unwrap();
        assert_eq!(balance.entitlement.round_dp(6), dec!(12));
    }

    #[tokio::test]
    async fn previous_years_keep_accumulating() {
        let store = InMemoryStore::new();
        let user = create_test_user("2022-01-01", vec![weekdays("2022-01-01", 24)]);
        let balance = ledger(&store, &StaticHolidays::default(), &user, "2023-03-01").await.unwrap();
        assert_eq!(balance.entitlement.round_dp(6), dec!(48));
    }

    #[tokio::test]
    async fn approved_week_consumes_five_days() {
        let store = InMemoryStore::new();
        approve(&store, "2023-07-10", "2023-07-14").await;
        let user = create_test_user("2023-01-01", vec![weekdays("2023-01-01", 24)]);
        let balance = ledger(&store, &StaticHolidays::default(), &user, "2023-08-01").await.unwrap();
        assert_eq!(balance.taken_days, 5);
        assert_eq!(balance.restored_days, 0);
        assert_eq!(balance.remaining, balance.entitlement - dec!(5));
        assert_eq!(balance.remaining.round_dp(6), dec!(19));
    }

    #[tokio::test]
    async fn holiday_inside_vacation_is_given_back() {
        let store = InMemoryStore::new();
        approve(&store, "2023-07-10", "2023-07-14").await;
        let user = create_test_user("2023-01-01", vec![weekdays("2023-01-01", 24)]);

        let without = ledger(&store, &StaticHolidays::default(), &user, "2023-08-01").await.unwrap();
        let holidays = StaticHolidays::new(vec![Holiday {
            name: "Betriebsfeiertag".to_string(),
            date: d("2023-07-12"),
        }]);
        let with = ledger(&store, &holidays, &user, "2023-08-01").await.unwrap();

        assert_eq!(with.restored_days, 1);
        assert_eq!(with.remaining - without.remaining, dec!(1));
    }

    #[tokio::test]
    async fn sick_day_inside_vacation_is_given_back() {
        let store = InMemoryStore::new();
        approve(&store, "2023-07-10", "2023-07-14").await;
        store.insert_sick_time("erika", d("2023-07-13"), d("2023-07-20")).await.unwrap();
        let user = create_test_user("2023-01-01", vec![weekdays("2023-01-01", 24)]);
        let balance = ledger(&store, &StaticHolidays::default(), &user, "2023-08-01").await.unwrap();
        assert_eq!(balance.taken_days, 5);
        assert_eq!(balance.restored_days, 2);
    }

    #[tokio::test]
    async fn weekends_and_pending_requests_are_not_consumed() {
        let store = InMemoryStore::new();
        // Saturday to Sunday of the following week
        approve(&store, "2023-07-08", "2023-07-16").await;
        store
            .insert_exclusive("erika", d("2023-09-04"), d("2023-09-08"), VacationStatus::Pending)
            .await
            .unwrap();
        let user = create_test_user("2023-01-01", vec![weekdays("2023-01-01", 24)]);
        let balance = ledger(&store, &StaticHolidays::default(), &user, "2023-08-01").await.unwrap();
        assert_eq!(balance.taken_days, 5);
    }

    #[tokio::test]
    async fn vacation_days_outside_the_window_are_ignored() {
        let store = InMemoryStore::new();
        approve(&store, "2022-12-28", "2023-01-03").await;
        approve(&store, "2023-12-28", "2024-01-05").await;
        let user = create_test_user("2023-01-01", vec![weekdays("2022-01-01", 24)]);
        let balance = ledger(&store, &StaticHolidays::default(), &user, "2023-06-01").await.unwrap();
        // Jan 2-3 and Dec 28-29 of 2023
        assert_eq!(balance.taken_days, 4);
    }

    #[tokio::test]
    async fn strict_outage_fails_only_when_a_vacation_day_needs_the_calendar() {
        let store = InMemoryStore::new();
        let user = create_test_user("2023-01-01", vec![weekdays("2023-01-01", 24)]);
        assert!(ledger(&store, &UnreachableCalendar, &user, "2023-08-01").await.is_ok());

        approve(&store, "2023-07-10", "2023-07-14").await;
        let err = ledger(&store, &UnreachableCalendar, &user, "2023-08-01").await.unwrap_err();
        assert!(matches!(err, TimesbookError::UpstreamUnavailable { .. }));
    }
}
