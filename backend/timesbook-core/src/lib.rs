// src/lib.rs

pub mod api;
pub mod booking;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod day_classifier;
pub mod error;
pub mod flextime;
pub mod holiday_client;
pub mod models;
pub mod overlap;
pub mod repository;
pub mod retry;
pub mod service;
pub mod vacation_ledger;
pub mod working_model;

mod vacation_ledger_tests;

pub use error::{Result, TimesbookError, ValidationError};
pub use flextime::{FlextimeBalance, FlextimeEngine};
pub use service::TimeAccountService;
pub use vacation_ledger::{VacationBalance, VacationLedger};
