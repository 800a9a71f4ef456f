// src/repository.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::calendar::Holiday;
use crate::error::TimesbookError;
use crate::models::{
    BookingEntry, Correction, DateInterval, SickTime, User, Vacation, VacationStatus, WorkingModel,
};
use crate::overlap::{ensure_no_overlap, intervals_overlap, Span};

// --- Repository Contracts ---

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, TimesbookError>;
    /// Inserts or replaces the user record, working models included.
    async fn save_user(&self, user: User) -> Result<(), TimesbookError>;
    /// Removes the user and every booking entry of that user. Returns false if unknown.
    async fn remove_user(&self, username: &str) -> Result<bool, TimesbookError>;
    /// Read-modify-write of a user's working models as one atomic step.
    /// Returns the stored versions after `change` succeeded; nothing is written when it fails.
    async fn update_working_models(
        &self,
        username: &str,
        change: WorkingModelChange,
    ) -> Result<Vec<WorkingModel>, TimesbookError>;
}

/// Edit applied to a user's working-model history inside the store's write lock.
pub type WorkingModelChange =
    Box<dyn FnOnce(&mut Vec<WorkingModel>) -> Result<(), TimesbookError> + Send>;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Entries whose `day` lies in `[from, till]`, ordered by day.
    async fn find_by_username_and_range(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<BookingEntry>, TimesbookError>;
    /// Upsert keyed by (username, day).
    async fn upsert_booking(&self, entry: BookingEntry) -> Result<(), TimesbookError>;
}

#[async_trait]
pub trait VacationRepository: Send + Sync {
    async fn find_by_username_and_status(
        &self,
        username: &str,
        status: VacationStatus,
    ) -> Result<Vec<Vacation>, TimesbookError>;
    async fn find_all_by_username(&self, username: &str) -> Result<Vec<Vacation>, TimesbookError>;
    /// Overlap check and insert as one atomic step. Fails with `Overlap` on conflict.
    async fn insert_exclusive(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
        status: VacationStatus,
    ) -> Result<Vacation, TimesbookError>;
    async fn set_status(&self, id: u64, status: VacationStatus) -> Result<Vacation, TimesbookError>;
}

#[async_trait]
pub trait SickTimeRepository: Send + Sync {
    /// Sick times touching `[from, till]`.
    async fn find_by_username_and_range(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<SickTime>, TimesbookError>;
    async fn insert_sick_time(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<SickTime, TimesbookError>;
}

#[async_trait]
pub trait CorrectionRepository: Send + Sync {
    async fn find_by_username_and_type(
        &self,
        username: &str,
        kind: &str,
    ) -> Result<Vec<Correction>, TimesbookError>;
    async fn insert_correction(
        &self,
        username: &str,
        kind: &str,
        value: i64,
        reason: &str,
        date: NaiveDate,
    ) -> Result<Correction, TimesbookError>;
}

/// The read and write ports the service works against.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub vacations: Arc<dyn VacationRepository>,
    pub sick_times: Arc<dyn SickTimeRepository>,
    pub corrections: Arc<dyn CorrectionRepository>,
}

impl Repositories {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            bookings: store.clone(),
            vacations: store.clone(),
            sick_times: store.clone(),
            corrections: store,
        }
    }
}

// --- Seed Data ---

/// Initial content for the in-memory store, read from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedData {
    pub users: Vec<User>,
    pub booking_entries: Vec<BookingEntry>,
    pub vacations: Vec<Vacation>,
    pub sick_times: Vec<SickTime>,
    pub corrections: Vec<Correction>,
    /// Fixed holidays for deployments without a holiday API.
    pub holidays: Vec<Holiday>,
}

impl SeedData {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// --- In-Memory Store ---

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<String, User>,
    // (username, day) -> entry; BTreeMap keeps range scans ordered by day
    bookings: BTreeMap<(String, NaiveDate), BookingEntry>,
    vacations: BTreeMap<u64, Vacation>,
    sick_times: BTreeMap<u64, SickTime>,
    corrections: BTreeMap<u64, Correction>,
    next_id: u64,
}

impl StoreState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store backing every repository trait with one lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let mut state = StoreState::default();
        for user in seed.users {
            state.users.insert(user.username.clone(), user);
        }
        for entry in seed.booking_entries {
            state.bookings.insert((entry.username.clone(), entry.day), entry);
        }
        let mut max_id = 0;
        for vacation in seed.vacations {
            max_id = max_id.max(vacation.id);
            state.vacations.insert(vacation.id, vacation);
        }
        for sick in seed.sick_times {
            max_id = max_id.max(sick.id);
            state.sick_times.insert(sick.id, sick);
        }
        for correction in seed.corrections {
            max_id = max_id.max(correction.id);
            state.corrections.insert(correction.id, correction);
        }
        state.next_id = max_id;
        info!(
            "Seeded store with {} users, {} bookings, {} vacations",
            state.users.len(),
            state.bookings.len(),
            state.vacations.len()
        );
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn read(&self, operation: &'static str) -> Result<RwLockReadGuard<'_, StoreState>, TimesbookError> {
        self.state.read().map_err(|e| poisoned(operation, e))
    }

    fn write(
        &self,
        operation: &'static str,
    ) -> Result<RwLockWriteGuard<'_, StoreState>, TimesbookError> {
        self.state.write().map_err(|e| poisoned(operation, e))
    }
}

fn poisoned<E: std::fmt::Display>(operation: &'static str, e: E) -> TimesbookError {
    TimesbookError::Repository {
        operation,
        message: format!("Failed to lock store: {}", e),
        transient: false,
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, TimesbookError> {
        Ok(self.read("find_user")?.users.get(username).cloned())
    }

    async fn save_user(&self, user: User) -> Result<(), TimesbookError> {
        let mut state = self.write("save_user")?;
        debug!("Saving user {}", user.username);
        state.users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn remove_user(&self, username: &str) -> Result<bool, TimesbookError> {
        let mut state = self.write("remove_user")?;
        if state.users.remove(username).is_none() {
            return Ok(false);
        }
        let before = state.bookings.len();
        state.bookings.retain(|(owner, _), _| owner != username);
        info!(
            "Removed user {} and {} booking entries",
            username,
            before - state.bookings.len()
        );
        Ok(true)
    }

    async fn update_working_models(
        &self,
        username: &str,
        change: WorkingModelChange,
    ) -> Result<Vec<WorkingModel>, TimesbookError> {
        let mut state = self.write("update_working_models")?;
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| TimesbookError::not_found("User", username))?;
        let mut versions = user.working_models.clone();
        change(&mut versions)?;
        user.working_models = versions.clone();
        debug!("Stored {} working models for {}", versions.len(), username);
        Ok(versions)
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn find_by_username_and_range(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<BookingEntry>, TimesbookError> {
        if from > till {
            return Ok(Vec::new());
        }
        let state = self.read("find_bookings")?;
        let range = (username.to_string(), from)..=(username.to_string(), till);
        Ok(state.bookings.range(range).map(|(_, e)| e.clone()).collect())
    }

    async fn upsert_booking(&self, entry: BookingEntry) -> Result<(), TimesbookError> {
        let mut state = self.write("upsert_booking")?;
        let key = (entry.username.clone(), entry.day);
        if state.bookings.insert(key, entry).is_some() {
            debug!("Replaced existing booking entry");
        }
        Ok(())
    }
}

#[async_trait]
impl VacationRepository for InMemoryStore {
    async fn find_by_username_and_status(
        &self,
        username: &str,
        status: VacationStatus,
    ) -> Result<Vec<Vacation>, TimesbookError> {
        let state = self.read("find_vacations_by_status")?;
        Ok(state
            .vacations
            .values()
            .filter(|v| v.username == username && v.status == status)
            .cloned()
            .collect())
    }

    async fn find_all_by_username(&self, username: &str) -> Result<Vec<Vacation>, TimesbookError> {
        let state = self.read("find_vacations")?;
        Ok(state
            .vacations
            .values()
            .filter(|v| v.username == username)
            .cloned()
            .collect())
    }

    async fn insert_exclusive(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
        status: VacationStatus,
    ) -> Result<Vacation, TimesbookError> {
        // Check and insert under one write lock so concurrent requests serialise here.
        let mut state = self.write("insert_vacation")?;
        let existing: Vec<Vacation> = state
            .vacations
            .values()
            .filter(|v| v.username == username)
            .cloned()
            .collect();
        ensure_no_overlap(&existing, Span { from, till })?;

        let vacation = Vacation {
            id: state.allocate_id(),
            username: username.to_string(),
            from,
            till,
            status,
        };
        state.vacations.insert(vacation.id, vacation.clone());
        Ok(vacation)
    }

    async fn set_status(&self, id: u64, status: VacationStatus) -> Result<Vacation, TimesbookError> {
        let mut state = self.write("set_vacation_status")?;
        let current = state
            .vacations
            .get(&id)
            .cloned()
            .ok_or_else(|| TimesbookError::not_found("Vacation", id.to_string()))?;
        if !current.status.is_active() && status.is_active() {
            // Reactivation re-enters the overlap invariant, checked under the same write lock.
            let others: Vec<Vacation> = state
                .vacations
                .values()
                .filter(|v| v.username == current.username && v.id != id)
                .cloned()
                .collect();
            ensure_no_overlap(
                &others,
                Span {
                    from: current.from,
                    till: current.till,
                },
            )?;
        }
        let vacation = state
            .vacations
            .get_mut(&id)
            .ok_or_else(|| TimesbookError::not_found("Vacation", id.to_string()))?;
        vacation.status = status;
        Ok(vacation.clone())
    }
}

#[async_trait]
impl SickTimeRepository for InMemoryStore {
    async fn find_by_username_and_range(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<SickTime>, TimesbookError> {
        let window = Span { from, till };
        let state = self.read("find_sick_times")?;
        Ok(state
            .sick_times
            .values()
            .filter(|s| s.username == username)
            .filter(|s| intervals_overlap(*s, &window))
            .cloned()
            .collect())
    }

    async fn insert_sick_time(
        &self,
        username: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<SickTime, TimesbookError> {
        let mut state = self.write("insert_sick_time")?;
        let sick = SickTime {
            id: state.allocate_id(),
            username: username.to_string(),
            from,
            till,
        };
        debug!("Recording sick time {}..{} for {}", sick.from_date(), sick.till_date(), username);
        state.sick_times.insert(sick.id, sick.clone());
        Ok(sick)
    }
}

#[async_trait]
impl CorrectionRepository for InMemoryStore {
    async fn find_by_username_and_type(
        &self,
        username: &str,
        kind: &str,
    ) -> Result<Vec<Correction>, TimesbookError> {
        let state = self.read("find_corrections")?;
        Ok(state
            .corrections
            .values()
            .filter(|c| c.username == username && c.kind == kind)
            .cloned()
            .collect())
    }

    async fn insert_correction(
        &self,
        username: &str,
        kind: &str,
        value: i64,
        reason: &str,
        date: NaiveDate,
    ) -> Result<Correction, TimesbookError> {
        let mut state = self.write("insert_correction")?;
        let correction = Correction {
            id: state.allocate_id(),
            username: username.to_string(),
            kind: kind.to_string(),
            value,
            reason: reason.to_string(),
            date,
        };
        state.corrections.insert(correction.id, correction.clone());
        Ok(correction)
    }
}
