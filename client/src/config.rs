//! Configuration management for the sync client.

use std::env;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote tabular API
    pub api_base_url: String,
    /// Identifier of the spreadsheet holding every table
    pub spreadsheet_id: String,
    /// Bearer token sent with every request, if any
    pub access_token: Option<String>,
    /// SQLite URL of the offline queue slot
    pub queue_database_url: String,
    /// Name recorded as the actor in audit events
    pub actor: String,
    pub refresh_interval: Duration,
    /// Upper bound on one refresh before `is_syncing` is forced back off
    pub refresh_timeout: Duration,
    pub queue_tick_interval: Duration,
    pub request_timeout: Duration,
}

pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_QUEUE_DATABASE_URL: &str = "sqlite://tabula-queue.db";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let spreadsheet_id = lookup("TABULA_SPREADSHEET_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingSpreadsheetId)?;

        let api_base_url = lookup("TABULA_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let access_token = lookup("TABULA_ACCESS_TOKEN").filter(|v| !v.trim().is_empty());

        let queue_database_url = lookup("TABULA_QUEUE_DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_QUEUE_DATABASE_URL.to_string());

        let actor = lookup("TABULA_ACTOR").unwrap_or_else(|| "system".to_string());

        Ok(Self {
            api_base_url,
            spreadsheet_id,
            access_token,
            queue_database_url,
            actor,
            refresh_interval: seconds(&lookup, "TABULA_REFRESH_INTERVAL_SECS", 30)?,
            refresh_timeout: seconds(&lookup, "TABULA_REFRESH_TIMEOUT_SECS", 20)?,
            queue_tick_interval: seconds(&lookup, "TABULA_QUEUE_TICK_SECS", 10)?,
            request_timeout: seconds(&lookup, "TABULA_REQUEST_TIMEOUT_SECS", 15)?,
        })
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidDuration(key)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TABULA_SPREADSHEET_ID environment variable is required")]
    MissingSpreadsheetId,

    #[error("Invalid {0} value, expected a positive number of seconds")]
    InvalidDuration(&'static str),
}
