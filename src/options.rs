//! String-keyed configuration consumed by the retry policy and transport.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::{LookupError, Result};

/// A configuration key with its short name and the long connector alias.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConfigKey {
    /// Short key name, preferred when both forms are present.
    pub name: &'static str,
    /// Fully-qualified alias used by connector table options.
    pub alias: &'static str,
}

/// Backoff family, `fixed-delay` (default) or `exponential-delay`.
pub const RETRY_STRATEGY_TYPE: ConfigKey = ConfigKey {
    name: "retry-strategy.type",
    alias: "gid.connector.http.source.lookup.retry-strategy.type",
};

/// Wait between attempts for `fixed-delay`; required by that strategy.
pub const FIXED_DELAY_DELAY: ConfigKey = ConfigKey {
    name: "retry-strategy.fixed-delay.delay",
    alias: "gid.connector.http.source.lookup.retry-strategy.fixed-delay.delay",
};

/// Wait after the first failed attempt for `exponential-delay`; required.
pub const EXPONENTIAL_DELAY_INITIAL_BACKOFF: ConfigKey = ConfigKey {
    name: "retry-strategy.exponential-delay.initial-backoff",
    alias: "gid.connector.http.source.lookup.retry-strategy.exponential-delay.initial-backoff",
};

/// Upper bound on any `exponential-delay` wait; required.
pub const EXPONENTIAL_DELAY_MAX_BACKOFF: ConfigKey = ConfigKey {
    name: "retry-strategy.exponential-delay.max-backoff",
    alias: "gid.connector.http.source.lookup.retry-strategy.exponential-delay.max-backoff",
};

/// Growth factor (>= 1) per attempt for `exponential-delay`; required.
pub const EXPONENTIAL_DELAY_MULTIPLIER: ConfigKey = ConfigKey {
    name: "retry-strategy.exponential-delay.backoff-multiplier",
    alias: "gid.connector.http.source.lookup.retry-strategy.exponential-delay.backoff-multiplier",
};

/// Total attempts per lookup, first one included (>= 1, default 3).
pub const MAX_RETRIES: ConfigKey = ConfigKey {
    name: "max-retries",
    alias: "lookup.max-retries",
};

/// Per-request timeout of the reqwest transport (default 30s).
pub const REQUEST_TIMEOUT: ConfigKey = ConfigKey {
    name: "request.timeout",
    alias: "gid.connector.http.source.lookup.request.timeout",
};

/// Ordered string-to-string option set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigOptions {
    values: BTreeMap<String, String>,
}

impl ConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a raw option value, replacing any previous one.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the trimmed raw value for `key`, trying the short name first.
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.values
            .get(key.name)
            .or_else(|| self.values.get(key.alias))
            .map(|value| value.trim())
    }

    /// Returns the raw value or a config error when absent.
    pub fn require(&self, key: ConfigKey) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| LookupError::Config(format!("missing required option '{}'", key.name)))
    }

    pub fn get_u32(&self, key: ConfigKey) -> Result<Option<u32>> {
        self.get(key)
            .map(|raw| {
                raw.parse::<u32>().map_err(|err| {
                    LookupError::Config(format!(
                        "option '{}' must be a non-negative integer, got '{raw}': {err}",
                        key.name
                    ))
                })
            })
            .transpose()
    }

    pub fn get_f64(&self, key: ConfigKey) -> Result<Option<f64>> {
        self.get(key)
            .map(|raw| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| {
                        LookupError::Config(format!(
                            "option '{}' must be a finite number, got '{raw}'",
                            key.name
                        ))
                    })
            })
            .transpose()
    }

    pub fn get_duration(&self, key: ConfigKey) -> Result<Option<Duration>> {
        self.get(key)
            .map(|raw| {
                parse_duration(raw).map_err(|reason| {
                    LookupError::Config(format!(
                        "option '{}' is not a valid duration '{raw}': {reason}",
                        key.name
                    ))
                })
            })
            .transpose()
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigOptions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Parses `<integer><unit>` durations such as `10s`, `15 ms` or `2min`.
///
/// A bare integer is read as milliseconds.
pub fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_owned());
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err("expected a leading non-negative integer".to_owned());
    }
    let amount = digits
        .parse::<u64>()
        .map_err(|err| format!("invalid number '{digits}': {err}"))?;

    let unit = unit.trim().to_ascii_lowercase();
    let duration = match unit.as_str() {
        "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => Duration::from_nanos(amount),
        "us" | "µs" | "micro" | "micros" | "microsecond" | "microseconds" => {
            Duration::from_micros(amount)
        }
        "" | "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => {
            Duration::from_millis(amount)
        }
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::from_secs(amount),
        "m" | "min" | "minute" | "minutes" => scaled_secs(amount, 60)?,
        "h" | "hour" | "hours" => scaled_secs(amount, 60 * 60)?,
        "d" | "day" | "days" => scaled_secs(amount, 24 * 60 * 60)?,
        other => return Err(format!("unknown time unit '{other}'")),
    };
    Ok(duration)
}

fn scaled_secs(amount: u64, factor: u64) -> std::result::Result<Duration, String> {
    amount
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| "duration overflow".to_owned())
}
