// src/api.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::booking::{parse_day, BookingRequest};
use crate::error::{TimesbookError, ValidationError};
use crate::models::{VacationStatus, WorkingModel, CORRECTION_TYPE_FLEXTIME};
use crate::service::TimeAccountService;

#[derive(Clone)]
pub struct AppState {
    pub service: TimeAccountService,
}

// --- Error Mapping ---

impl TimesbookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TimesbookError::Validation(_) => StatusCode::BAD_REQUEST,
            TimesbookError::Overlap { .. } => StatusCode::CONFLICT,
            TimesbookError::NotFound { .. } => StatusCode::NOT_FOUND,
            TimesbookError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            TimesbookError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            TimesbookError::Repository { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TimesbookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        let body = Json(json!({
            "errorCode": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        TimesbookError::from(self).into_response()
    }
}

fn success(value: serde_json::Value) -> Json<serde_json::Value> {
    Json(json!({ "success": value }))
}

fn required_day(value: Option<&str>, field: &str) -> Result<chrono::NaiveDate, ValidationError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::MissingField {
            field: field.to_string(),
        })?;
    parse_day(value)
}

// --- Request Bodies ---

#[derive(Debug, Deserialize)]
pub struct RangeRequest {
    pub from: Option<String>,
    pub till: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: i64,
    #[serde(default)]
    pub reason: String,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// --- Handlers ---

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_flextime(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, TimesbookError> {
    let balance = state.service.flextime(&username).await?;
    Ok(success(json!({ "flextime": balance.balance })))
}

async fn get_remaining_vacation(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, TimesbookError> {
    let balance = state.service.remaining_vacation(&username).await?;
    let days = balance.remaining.to_f64().unwrap_or_default();
    Ok(success(json!({ "remainingVacation": days })))
}

async fn upsert_booking_entry(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<BookingRequest>,
) -> Result<impl IntoResponse, TimesbookError> {
    let entry = state.service.book_day(&username, request).await?;
    Ok(success(json!(entry)))
}

async fn get_booking_entries(
    State(state): State<AppState>,
    Path((username, from, till)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, TimesbookError> {
    let from = parse_day(&from)?;
    let till = parse_day(&till)?;
    let entries = state.service.booking_entries(&username, from, till).await?;
    Ok(success(json!(entries)))
}

async fn get_vacations(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, TimesbookError> {
    let vacations = state.service.vacations(&username).await?;
    Ok(success(json!(vacations)))
}

async fn create_vacation(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<RangeRequest>,
) -> Result<impl IntoResponse, TimesbookError> {
    let from = required_day(request.from.as_deref(), "from")?;
    let till = required_day(request.till.as_deref(), "till")?;
    let vacation = state.service.request_vacation(&username, from, till).await?;
    Ok((StatusCode::CREATED, success(json!(vacation))))
}

async fn update_vacation_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<StatusRequest>,
) -> Result<impl IntoResponse, TimesbookError> {
    let status: VacationStatus = request
        .status
        .parse()
        .map_err(|_| ValidationError::InvalidStatus {
            value: request.status.clone(),
        })?;
    let vacation = state.service.set_vacation_status(id, status).await?;
    Ok(success(json!(vacation)))
}

async fn create_sick_time(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<RangeRequest>,
) -> Result<impl IntoResponse, TimesbookError> {
    let from = required_day(request.from.as_deref(), "from")?;
    let till = required_day(request.till.as_deref(), "till")?;
    let sick_time = state.service.record_sick_time(&username, from, till).await?;
    Ok((StatusCode::CREATED, success(json!(sick_time))))
}

async fn create_correction(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<CorrectionRequest>,
) -> Result<impl IntoResponse, TimesbookError> {
    let date = match request.date.as_deref() {
        Some(value) => parse_day(value)?,
        None => state.service.today(),
    };
    let kind = request.kind.as_deref().unwrap_or(CORRECTION_TYPE_FLEXTIME);
    let correction = state
        .service
        .add_correction(&username, kind, request.value, &request.reason, date)
        .await?;
    Ok(success(json!(correction)))
}

async fn get_corrections(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CorrectionQuery>,
) -> Result<impl IntoResponse, TimesbookError> {
    let kind = query.kind.as_deref().unwrap_or(CORRECTION_TYPE_FLEXTIME);
    let corrections = state.service.corrections(&username, kind).await?;
    Ok(success(json!(corrections)))
}

async fn get_working_models(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, TimesbookError> {
    let versions = state.service.working_models(&username).await?;
    Ok(success(json!(versions)))
}

async fn append_working_model(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(model): Json<WorkingModel>,
) -> Result<impl IntoResponse, TimesbookError> {
    let versions = state.service.add_working_model(&username, model).await?;
    Ok(success(json!(versions)))
}

async fn delete_working_model(
    State(state): State<AppState>,
    Path((username, valid_from)): Path<(String, String)>,
) -> Result<impl IntoResponse, TimesbookError> {
    let valid_from = parse_day(&valid_from)?;
    let versions = state
        .service
        .remove_working_model(&username, valid_from)
        .await?;
    Ok(success(json!(versions)))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, TimesbookError> {
    state.service.remove_user(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Balances
        .route("/api/users/{username}", delete(delete_user))
        .route("/api/users/{username}/flextime", get(get_flextime))
        .route(
            "/api/users/{username}/remaining-vacation",
            get(get_remaining_vacation),
        )
        // Bookings
        .route("/api/booking-entries/{username}", patch(upsert_booking_entry))
        .route(
            "/api/booking-entries/{username}/{from}/{till}",
            get(get_booking_entries),
        )
        // Absences
        .route(
            "/api/vacations/{username}",
            get(get_vacations).post(create_vacation),
        )
        .route("/api/vacations/id/{id}", patch(update_vacation_status))
        .route("/api/sick-times/{username}", post(create_sick_time))
        .route(
            "/api/corrections/{username}",
            get(get_corrections).put(create_correction),
        )
        // Working models
        .route(
            "/api/working-models/{username}",
            get(get_working_models).patch(append_working_model),
        )
        .route(
            "/api/working-models/{username}/{valid_from}",
            delete(delete_working_model),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
