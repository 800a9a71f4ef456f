// src/holiday_client.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::calendar::{Holiday, HolidaySource};

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Section of the calendar response holding holidays valid nationwide.
pub const NATIONAL_SECTION: &str = "NATIONAL";

// --- Error Type ---

#[derive(Error, Debug)]
pub enum HolidayClientError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("Rate limit exceeded (Status 429)")]
    RateLimitExceeded,

    #[error("Holiday API error: Status={status}, Message='{message}'")]
    ApiError { status: StatusCode, message: String },

    #[error("Holiday response for {year} has no '{section}' section")]
    MissingSection { year: i32, section: String },

    #[error("Holiday '{name}' has an unparsable date '{value}'")]
    InvalidDate { name: String, value: String },
}

impl HolidayClientError {
    /// Network failures, throttling and server-side errors may clear up on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            HolidayClientError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            HolidayClientError::RateLimitExceeded => true,
            HolidayClientError::ApiError { status, .. } => status.is_server_error(),
            HolidayClientError::Json(_)
            | HolidayClientError::UrlParse(_)
            | HolidayClientError::MissingSection { .. }
            | HolidayClientError::InvalidDate { .. } => false,
        }
    }
}

// --- API Data Structures ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayApiEntry {
    pub datum: String,
    #[serde(default)]
    pub hinweis: String,
}

/// `{ "NATIONAL": { "<name>": { "datum": "YYYY-MM-DD", ... } }, "<state>": {...} }`
pub type HolidayApiResponse = HashMap<String, HashMap<String, HolidayApiEntry>>;

/// Extracts the nationwide holidays of one year from a calendar response.
pub fn national_holidays(
    year: i32,
    response: &HolidayApiResponse,
) -> Result<Vec<Holiday>, HolidayClientError> {
    let section = response
        .get(NATIONAL_SECTION)
        .ok_or_else(|| HolidayClientError::MissingSection {
            year,
            section: NATIONAL_SECTION.to_string(),
        })?;

    let mut holidays = section
        .iter()
        .map(|(name, entry)| {
            NaiveDate::parse_from_str(&entry.datum, "%Y-%m-%d")
                .map(|date| Holiday {
                    name: name.clone(),
                    date,
                })
                .map_err(|_| HolidayClientError::InvalidDate {
                    name: name.clone(),
                    value: entry.datum.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    holidays.sort_by_key(|h| h.date);
    Ok(holidays)
}

// --- Client ---

#[derive(Clone, Debug)]
pub struct HolidayClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct HolidayApiClient {
    base_url: Url,
    http_client: Client,
}

impl HolidayApiClient {
    pub fn new(config: HolidayClientConfig) -> Result<Self, HolidayClientError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn year_url(&self, year: i32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("jahr", &year.to_string());
        url
    }

    pub async fn get_year(&self, year: i32) -> Result<HolidayApiResponse, HolidayClientError> {
        let url = self.year_url(year);
        debug!("Requesting holidays for {} from {}", year, url);

        let resp = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!("Holiday request to {} failed before a response: {}", url, e);
                HolidayClientError::Request(e)
            })?;

        let status = resp.status();
        info!("Received holiday response for {}: Status={}", year, status);

        if status.is_success() {
            let bytes = resp.bytes().await?;
            return serde_json::from_slice::<HolidayApiResponse>(&bytes).map_err(|e| {
                error!("Holiday JSON for {} could not be parsed: {}", year, e);
                HolidayClientError::Json(e)
            });
        }

        let message = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Holiday API rate limit hit for {}", year);
            Err(HolidayClientError::RateLimitExceeded)
        } else {
            error!("Holiday API Error: Status={}, Body='{}'", status, message);
            Err(HolidayClientError::ApiError { status, message })
        }
    }
}

#[async_trait]
impl HolidaySource for HolidayApiClient {
    async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>, HolidayClientError> {
        let response = self.get_year(year).await?;
        national_holidays(year, &response)
    }
}
