//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables while
//! handling a user action; the binary reads them once and hands the values to the parsing
//! helpers below.

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_BOOKING_WINDOW_DAYS, DEFAULT_FALLBACK_TIMES,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SETTINGS_FILE, MAX_BOOKING_WINDOW_DAYS,
};
use crate::{HmsError, HmsResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    api_base_url: String,
    api_token: Option<String>,
    request_timeout: Duration,
    booking_window_days: u32,
    fallback_times: Vec<String>,
    settings_file: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`HmsError::InvalidInput`] if:
    /// - `api_base_url` is blank or not an http(s) URL,
    /// - `booking_window_days` is zero or above the supported maximum.
    pub fn new(
        api_base_url: String,
        api_token: Option<String>,
        request_timeout: Duration,
        booking_window_days: u32,
        settings_file: PathBuf,
    ) -> HmsResult<Self> {
        let api_base_url = api_base_url.trim().trim_end_matches('/').to_string();
        if api_base_url.is_empty() {
            return Err(HmsError::InvalidInput("api_base_url cannot be empty".into()));
        }
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(HmsError::InvalidInput(format!(
                "api_base_url must start with http:// or https://: {api_base_url}"
            )));
        }
        let booking_window_days = validate_booking_window_days(booking_window_days)?;

        Ok(Self {
            api_base_url,
            api_token: api_token.filter(|t| !t.trim().is_empty()),
            request_timeout,
            booking_window_days,
            fallback_times: DEFAULT_FALLBACK_TIMES.iter().map(|t| t.to_string()).collect(),
            settings_file,
        })
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn booking_window_days(&self) -> u32 {
        self.booking_window_days
    }

    pub fn fallback_times(&self) -> &[String] {
        &self.fallback_times
    }

    pub fn settings_file(&self) -> &Path {
        &self.settings_file
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            booking_window_days: DEFAULT_BOOKING_WINDOW_DAYS,
            fallback_times: DEFAULT_FALLBACK_TIMES.iter().map(|t| t.to_string()).collect(),
            settings_file: PathBuf::from(DEFAULT_SETTINGS_FILE),
        }
    }
}

/// Check a booking window length against `1..=MAX_BOOKING_WINDOW_DAYS`.
pub fn validate_booking_window_days(days: u32) -> HmsResult<u32> {
    if days == 0 || days > MAX_BOOKING_WINDOW_DAYS {
        return Err(HmsError::InvalidInput(format!(
            "booking window must be between 1 and {MAX_BOOKING_WINDOW_DAYS} days, got {days}"
        )));
    }
    Ok(days)
}

/// Trim an optional value, treating empty/whitespace as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the API base URL from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default local backend URL.
pub fn api_base_url_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_API_BASE_URL.into())
}

/// Parse the booking window length from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of three days.
pub fn booking_window_days_from_env_value(value: Option<String>) -> HmsResult<u32> {
    match non_blank(value) {
        None => Ok(DEFAULT_BOOKING_WINDOW_DAYS),
        Some(v) => v.parse::<u32>().map_err(|_| {
            HmsError::InvalidInput(format!("booking window days must be a whole number: {v}"))
        }),
    }
}

/// Parse the request timeout (seconds) from an optional string value.
pub fn request_timeout_from_env_value(value: Option<String>) -> HmsResult<Duration> {
    match non_blank(value) {
        None => Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        Some(v) => {
            let secs = v.parse::<u64>().map_err(|_| {
                HmsError::InvalidInput(format!("request timeout must be whole seconds: {v}"))
            })?;
            if secs == 0 {
                return Err(HmsError::InvalidInput(
                    "request timeout must be at least one second".into(),
                ));
            }
            Ok(Duration::from_secs(secs))
        }
    }
}

/// Resolve the settings file location from an optional string value.
pub fn settings_file_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_fall_back_to_defaults() {
        assert_eq!(api_base_url_from_env_value(Some("  ".into())), DEFAULT_API_BASE_URL);
        assert_eq!(booking_window_days_from_env_value(None).unwrap(), 3);
        assert_eq!(
            request_timeout_from_env_value(Some(String::new())).unwrap(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(
            settings_file_from_env_value(None),
            PathBuf::from(DEFAULT_SETTINGS_FILE)
        );
    }

    #[test]
    fn rejects_non_numeric_window() {
        let err = booking_window_days_from_env_value(Some("three".into())).unwrap_err();
        assert!(matches!(err, HmsError::InvalidInput(_)));
    }

    #[test]
    fn window_length_bounds() {
        assert_eq!(validate_booking_window_days(1).unwrap(), 1);
        assert_eq!(
            validate_booking_window_days(MAX_BOOKING_WINDOW_DAYS).unwrap(),
            MAX_BOOKING_WINDOW_DAYS
        );
        assert!(validate_booking_window_days(0).is_err());
        assert!(validate_booking_window_days(MAX_BOOKING_WINDOW_DAYS + 1).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(request_timeout_from_env_value(Some("0".into())).is_err());
    }

    #[test]
    fn new_trims_trailing_slash_and_blank_token() {
        let cfg = CoreConfig::new(
            "https://hms.example.org/api/".into(),
            Some("   ".into()),
            Duration::from_secs(5),
            3,
            PathBuf::from("settings.yaml"),
        )
        .unwrap();
        assert_eq!(cfg.api_base_url(), "https://hms.example.org/api");
        assert_eq!(cfg.api_token(), None);
        assert_eq!(cfg.fallback_times().len(), DEFAULT_FALLBACK_TIMES.len());
    }

    #[test]
    fn new_rejects_bad_url_and_window() {
        let timeout = Duration::from_secs(5);
        let path = PathBuf::from("s.yaml");
        assert!(CoreConfig::new("ftp://x".into(), None, timeout, 3, path.clone()).is_err());
        assert!(CoreConfig::new("http://x".into(), None, timeout, 0, path.clone()).is_err());
        assert!(CoreConfig::new("http://x".into(), None, timeout, 90, path).is_err());
    }
}
