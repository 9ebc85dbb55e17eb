//! Configuration for TickScheduler
//!
//! Configuration input is permissive: a value of the wrong type falls back to its default and
//! an out-of-range interval is clamped. Nothing in here ever fails because of a bad value; only
//! reading or writing a file can.

use crate::error::TimerError;
use crate::{DEFAULT_INTERVAL_MS, DEFAULT_PRECISION, MIN_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Configuration for the TickScheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct TimerConfig {
    /// Tick interval in milliseconds (default: 1000ms, never below 1ms)
    #[serde(rename = "interval")]
    pub interval_ms: u64,

    /// Adjust each delay for drift measured against the session reference (default: true)
    pub precision: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { interval_ms: DEFAULT_INTERVAL_MS, precision: DEFAULT_PRECISION }
    }
}

impl From<u64> for TimerConfig {
    fn from(interval_ms: u64) -> Self {
        Self { interval_ms: interval_ms.max(MIN_INTERVAL_MS), ..Default::default() }
    }
}

impl From<i64> for TimerConfig {
    fn from(interval_ms: i64) -> Self {
        Self { interval_ms: clamp_interval(interval_ms), ..Default::default() }
    }
}

impl From<Value> for TimerConfig {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl TimerConfig {
    /// Build a configuration from loosely typed input.
    ///
    /// A bare number is taken as the interval. An object may carry `interval` and `precision`
    /// keys. Anything else yields the defaults.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(_) => Self {
                interval_ms: normalize_interval(value, MIN_INTERVAL_MS, DEFAULT_INTERVAL_MS),
                ..Default::default()
            },
            Value::Object(map) => Self {
                interval_ms: normalize_interval(
                    map.get("interval").unwrap_or(&Value::Null),
                    MIN_INTERVAL_MS,
                    DEFAULT_INTERVAL_MS,
                ),
                precision: normalize_bool(
                    map.get("precision").unwrap_or(&Value::Null),
                    DEFAULT_PRECISION,
                ),
            },
            _ => Self::default(),
        }
    }

    /// Get tick interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Re-apply the clamping rules to a configuration built by hand
    pub fn normalized(self) -> Self {
        Self { interval_ms: self.interval_ms.max(MIN_INTERVAL_MS), precision: self.precision }
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(content: &str) -> Result<Self, TimerError> {
        let value: Value = serde_json::from_str(content)?;
        Ok(Self::from_value(&value))
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, TimerError> {
        let config: TimerConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TimerError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), TimerError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Coerce an interval value: non-numbers become `default`, numbers below `minimum` become
/// `minimum`, fractional values are truncated.
pub fn normalize_interval(value: &Value, minimum: u64, default: u64) -> u64 {
    let Value::Number(number) = value else {
        return default;
    };

    if let Some(v) = number.as_u64() {
        return v.max(minimum);
    }
    if number.as_i64().is_some() {
        // only negative integers reach this point
        return minimum;
    }
    match number.as_f64() {
        Some(v) if v < minimum as f64 => minimum,
        Some(v) => (v as u64).max(minimum),
        None => default,
    }
}

/// Coerce a flag value: non-booleans become `default`.
pub fn normalize_bool(value: &Value, default: bool) -> bool {
    value.as_bool().unwrap_or(default)
}

/// Clamp a typed interval to the accepted range.
pub(crate) fn clamp_interval(interval_ms: i64) -> u64 {
    u64::try_from(interval_ms).unwrap_or(0).max(MIN_INTERVAL_MS)
}
