use crate::connection::{Backoff, ReconnectPolicy};
use crate::connection::policy::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_RECONNECT_DELAY, DEFAULT_RECONNECT_DELAY,
};
use crate::transport::validate_url;
use crate::window::DEFAULT_WINDOW_CAPACITY;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_URL: &str = "ws://localhost:8000/ws/metrics";

/// Feed configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// WebSocket endpoint streaming samples
    pub url: String,
    pub reconnect: ReconnectPolicy,
    /// Number of samples kept in the window
    pub window_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }
}

impl FeedConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("METRICS_WS_URL").unwrap_or_else(|| DEFAULT_URL.to_string());

        let delay = parse_or(&lookup, "RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY.as_millis() as u64)?;
        let max_attempts = parse_or(&lookup, "MAX_RECONNECT_ATTEMPTS", DEFAULT_MAX_RECONNECT_ATTEMPTS)?;
        let window_capacity = parse_or(&lookup, "WINDOW_CAPACITY", DEFAULT_WINDOW_CAPACITY)?;
        let max_delay = parse_or(
            &lookup,
            "RECONNECT_MAX_DELAY_MS",
            DEFAULT_MAX_RECONNECT_DELAY.as_millis() as u64,
        )?;

        let backoff = match lookup("RECONNECT_BACKOFF") {
            Some(value) => parse_backoff(&value, Duration::from_millis(max_delay))?,
            None => Backoff::Fixed,
        };

        let config = Self {
            url,
            reconnect: ReconnectPolicy::new(Duration::from_millis(delay), max_attempts)
                .with_backoff(backoff),
            window_capacity,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check values that parse but can't be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

        if self.window_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "WINDOW_CAPACITY must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse `fixed` / `exponential`
pub fn parse_backoff(value: &str, max_delay: Duration) -> Result<Backoff, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "fixed" => Ok(Backoff::Fixed),
        "exponential" => Ok(Backoff::Exponential { max_delay }),
        other => Err(ConfigError::InvalidValue(format!(
            "RECONNECT_BACKOFF must be 'fixed' or 'exponential', got '{other}'"
        ))),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw:?} is not a valid number"))),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}
