// src/config.rs

use serde::Deserialize;
use std::time::Duration;

use crate::calendar::HolidayPolicy;
use crate::flextime::{CorrectionPolicy, EngineSettings};
use crate::holiday_client::{HolidayClientConfig, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS};
use crate::service::DEFAULT_REQUEST_TIMEOUT_SECS;

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_retry_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    // Server
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    // Holiday calendar
    pub holiday_api_url: Option<String>,
    #[serde(default)]
    pub holiday_policy: HolidayPolicy,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // Computation
    #[serde(default)]
    pub correction_policy: CorrectionPolicy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    // Storage
    pub seed_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::from_env::<AppConfig>()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            holiday_policy: self.holiday_policy,
            correction_policy: self.correction_policy,
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn holiday_client_config(&self) -> Option<HolidayClientConfig> {
        self.holiday_api_url.as_ref().map(|url| HolidayClientConfig {
            base_url: url.clone(),
            timeout_secs: self.http_timeout_secs,
        })
    }
}
