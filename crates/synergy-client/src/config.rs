//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so a client starts with zero
//! configuration. Unparseable values are logged and ignored.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;

use synergy_shared::constants::{
    DEFAULT_ALERT_DELAY_SECS, DEFAULT_DAILY_REMINDER_HOUR, DEFAULT_DEADLINE_WINDOW_HOURS,
    DEFAULT_MIN_PASSWORD_LEN,
};

use crate::cache::MergePolicy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Embedded database file.
    /// Env: `SYNERGY_DB_PATH`
    /// Default: `None` (platform data directory).
    pub db_path: Option<PathBuf>,

    /// Local hour (0-23) at which the daily reminder fires.
    /// Env: `SYNERGY_DAILY_REMINDER_HOUR`
    /// Default: `9`
    pub daily_reminder_hour: u32,

    /// Look-ahead of the upcoming-deadline check.
    /// Env: `SYNERGY_DEADLINE_WINDOW_HOURS`
    /// Default: `24`
    pub deadline_window_hours: i64,

    /// Delay before an "immediate" alert fires.
    /// Env: `SYNERGY_ALERT_DELAY_SECS`
    /// Default: `1`
    pub alert_delay_secs: i64,

    /// Env: `SYNERGY_MIN_PASSWORD_LEN`
    /// Default: `6`
    pub min_password_len: usize,

    /// Env: `SYNERGY_MERGE_POLICY` (`arrival` or `reject-stale`)
    /// Default: `arrival`
    pub merge_policy: MergePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            daily_reminder_hour: DEFAULT_DAILY_REMINDER_HOUR,
            deadline_window_hours: DEFAULT_DEADLINE_WINDOW_HOURS,
            alert_delay_secs: DEFAULT_ALERT_DELAY_SECS,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
            merge_policy: MergePolicy::ArrivalOrder,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("SYNERGY_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(hour) = parse_var::<u32>(&lookup, "SYNERGY_DAILY_REMINDER_HOUR") {
            if hour < 24 {
                config.daily_reminder_hour = hour;
            } else {
                tracing::warn!(hour, "SYNERGY_DAILY_REMINDER_HOUR out of range, using default");
            }
        }

        if let Some(hours) = parse_var::<i64>(&lookup, "SYNERGY_DEADLINE_WINDOW_HOURS") {
            config.deadline_window_hours = hours.max(1);
        }

        if let Some(secs) = parse_var::<i64>(&lookup, "SYNERGY_ALERT_DELAY_SECS") {
            config.alert_delay_secs = secs.max(0);
        }

        if let Some(len) = parse_var::<usize>(&lookup, "SYNERGY_MIN_PASSWORD_LEN") {
            config.min_password_len = len.max(1);
        }

        if let Some(policy) = lookup("SYNERGY_MERGE_POLICY") {
            match policy.as_str() {
                "arrival" => config.merge_policy = MergePolicy::ArrivalOrder,
                "reject-stale" => config.merge_policy = MergePolicy::RejectStale,
                other => {
                    tracing::warn!(value = %other, "Invalid SYNERGY_MERGE_POLICY, using default");
                }
            }
        }

        config
    }

    pub fn deadline_window(&self) -> Duration {
        Duration::hours(self.deadline_window_hours)
    }

    pub fn alert_delay(&self) -> Duration {
        Duration::seconds(self.alert_delay_secs)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
