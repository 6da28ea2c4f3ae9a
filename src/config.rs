//! Client settings
//!
//! Read from `ASSISTANT_*` environment variables, with defaults that match a
//! locally running service.

use crate::dispatch::TransportMode;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=1.0;

/// Invalid setting value
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SettingsError {
    #[error("temperature {0} is outside 0.0..=1.0")]
    TemperatureOutOfRange(f32),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Settings for one chat client
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub mode: TransportMode,
    pub max_tokens: Option<u32>,
    pub request_timeout: Duration,
    pub health_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            mode: TransportMode::Streaming,
            max_tokens: None,
            request_timeout: Duration::from_secs(300),
            health_interval: Duration::from_secs(30),
        }
    }
}

impl Settings {
    /// # Errors
    ///
    /// Returns [`SettingsError`] if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults
    ///
    /// # Errors
    ///
    /// Same as [`Settings::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Some(url) = lookup("ASSISTANT_BASE_URL") {
            settings.base_url = url;
        }
        if let Some(model) = lookup("ASSISTANT_MODEL") {
            settings.model = model;
        }
        if let Some(raw) = lookup("ASSISTANT_TEMPERATURE") {
            settings.temperature = validate_temperature(parse("ASSISTANT_TEMPERATURE", &raw)?)?;
        }
        if let Some(raw) = lookup("ASSISTANT_STREAM") {
            settings.mode = if parse_bool("ASSISTANT_STREAM", &raw)? {
                TransportMode::Streaming
            } else {
                TransportMode::Regular
            };
        }
        if let Some(raw) = lookup("ASSISTANT_MAX_TOKENS") {
            settings.max_tokens = Some(parse("ASSISTANT_MAX_TOKENS", &raw)?);
        }
        if let Some(raw) = lookup("ASSISTANT_TIMEOUT_SECS") {
            settings.request_timeout = Duration::from_secs(parse("ASSISTANT_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("ASSISTANT_HEALTH_INTERVAL_SECS") {
            let secs: u64 = parse("ASSISTANT_HEALTH_INTERVAL_SECS", &raw)?;
            if secs == 0 {
                return Err(invalid("ASSISTANT_HEALTH_INTERVAL_SECS", &raw));
            }
            settings.health_interval = Duration::from_secs(secs);
        }

        Ok(settings)
    }
}

/// Accept a temperature only if it is a number inside [`TEMPERATURE_RANGE`]
///
/// # Errors
///
/// [`SettingsError::TemperatureOutOfRange`] for anything else, NaN included.
pub fn validate_temperature(value: f32) -> Result<f32, SettingsError> {
    if TEMPERATURE_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(SettingsError::TemperatureOutOfRange(value))
    }
}

fn invalid(key: &str, value: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, SettingsError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}
