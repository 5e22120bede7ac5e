use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub jwt_secret: String,
    pub auth_clock_skew: Duration,
    pub scan_interval: Duration,
    pub reminder_window: Duration,
    pub push_timeout: Duration,
    pub push_ttl_secs: u64,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("scan_interval", &self.scan_interval)
            .field("reminder_window", &self.reminder_window)
            .field("push_timeout", &self.push_timeout)
            .field("push_ttl_secs", &self.push_ttl_secs)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TICKLIST_BIND_ADDR", "127.0.0.1:8080");
        let db_path = value_or_default(&lookup, "TICKLIST_DB_PATH", "ticklist.db");
        let jwt_secret = required_trimmed(&lookup, "TICKLIST_JWT_SECRET")?;

        let auth_clock_skew_secs = parse_ranged(
            &lookup,
            "TICKLIST_AUTH_CLOCK_SKEW_SECS",
            "60",
            0..=300,
        )?;
        let scan_interval_secs = parse_ranged(
            &lookup,
            "TICKLIST_SCAN_INTERVAL_SECS",
            "60",
            5..=3_600,
        )?;
        let reminder_window_secs = parse_ranged(
            &lookup,
            "TICKLIST_REMINDER_WINDOW_SECS",
            "60",
            10..=3_600,
        )?;
        let push_timeout_secs = parse_ranged(&lookup, "TICKLIST_PUSH_TIMEOUT_SECS", "10", 1..=60)?;
        let push_ttl_secs = parse_ranged(&lookup, "TICKLIST_PUSH_TTL_SECS", "60", 0..=86_400)?;

        Ok(Self {
            bind_addr,
            db_path,
            jwt_secret,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            scan_interval: Duration::from_secs(scan_interval_secs),
            reminder_window: Duration::from_secs(reminder_window_secs),
            push_timeout: Duration::from_secs(push_timeout_secs),
            push_ttl_secs,
        })
    }
}

fn parse_ranged(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let value = value_or_default(lookup, name, default)
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::Invalid(format!(
                "{name} must be an integer in [{}, {}]",
                range.start(),
                range.end()
            ))
        })?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
