//! Retry policy: how many attempts a lookup gets and how long to wait between them.
//!
//! The delay before retry `n` (the wait after attempt `n` failed) is produced by an
//! [`IntervalFunction`]:
//! - fixed delay: `delay` for every attempt;
//! - exponential delay: `min(initial_backoff × multiplier^(n-1), max_backoff)`.
//!
//! Exponential delays after the first are floored to whole milliseconds. There is
//! no jitter, so identical configuration always yields the same schedule.
//!
//! ```
//! use std::time::Duration;
//! use http_lookup::RetryConfig;
//!
//! let retry = RetryConfig::exponential(
//!     6,
//!     Duration::from_millis(15),
//!     Duration::from_millis(120),
//!     2.0,
//! )
//! .unwrap();
//!
//! assert_eq!(retry.interval().apply_millis(1), 15);
//! assert_eq!(retry.interval().apply_millis(3), 60);
//! assert_eq!(retry.interval().apply_millis(6), 120);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::options::{
    ConfigOptions, EXPONENTIAL_DELAY_INITIAL_BACKOFF, EXPONENTIAL_DELAY_MAX_BACKOFF,
    EXPONENTIAL_DELAY_MULTIPLIER, FIXED_DELAY_DELAY, MAX_RETRIES, RETRY_STRATEGY_TYPE,
};
use crate::{LookupError, Result};

const FIXED_DELAY: &str = "fixed-delay";
const EXPONENTIAL_DELAY: &str = "exponential-delay";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const NANOS_PER_MILLI: f64 = 1_000_000.0;
const FLOOR_EPSILON_MS: f64 = 1e-6;

/// Backoff family selected by `retry-strategy.type`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RetryStrategy {
    /// Same delay before every retry.
    FixedDelay { delay: Duration },
    /// Delay grows by `multiplier` per attempt and is capped at `max_backoff`.
    ExponentialDelay {
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
    },
}

impl RetryStrategy {
    fn validate(&self) -> Result<()> {
        match *self {
            Self::FixedDelay { .. } => Ok(()),
            Self::ExponentialDelay {
                initial_backoff,
                max_backoff,
                multiplier,
            } => {
                if !multiplier.is_finite() || multiplier < 1.0 {
                    return Err(LookupError::Config(format!(
                        "backoff multiplier must be a finite number >= 1, got {multiplier}"
                    )));
                }
                if initial_backoff > max_backoff {
                    return Err(LookupError::Config(format!(
                        "initial backoff {initial_backoff:?} exceeds max backoff {max_backoff:?}"
                    )));
                }
                Ok(())
            }
        }
    }

    fn from_options(options: &ConfigOptions) -> Result<Self> {
        let kind = options.get(RETRY_STRATEGY_TYPE).unwrap_or(FIXED_DELAY);
        match kind.to_ascii_lowercase().as_str() {
            FIXED_DELAY => Ok(Self::FixedDelay {
                delay: required_duration(options, FIXED_DELAY_DELAY)?,
            }),
            EXPONENTIAL_DELAY => {
                let multiplier = options
                    .get_f64(EXPONENTIAL_DELAY_MULTIPLIER)?
                    .ok_or_else(|| missing(EXPONENTIAL_DELAY_MULTIPLIER.name))?;
                Ok(Self::ExponentialDelay {
                    initial_backoff: required_duration(options, EXPONENTIAL_DELAY_INITIAL_BACKOFF)?,
                    max_backoff: required_duration(options, EXPONENTIAL_DELAY_MAX_BACKOFF)?,
                    multiplier,
                })
            }
            other => Err(LookupError::Config(format!(
                "unknown retry strategy '{other}', expected '{FIXED_DELAY}' or '{EXPONENTIAL_DELAY}'"
            ))),
        }
    }
}

fn required_duration(
    options: &ConfigOptions,
    key: crate::options::ConfigKey,
) -> Result<Duration> {
    options.get_duration(key)?.ok_or_else(|| missing(key.name))
}

fn missing(name: &str) -> LookupError {
    LookupError::Config(format!("missing required option '{name}'"))
}

/// Pure mapping from attempt number to the wait before the next attempt.
///
/// Built once from a [`RetryStrategy`]; cloning shares the same function.
#[derive(Clone)]
pub struct IntervalFunction {
    delay: Arc<dyn Fn(u32) -> Duration + Send + Sync>,
    strategy: RetryStrategy,
}

impl IntervalFunction {
    fn new(strategy: RetryStrategy) -> Self {
        let delay: Arc<dyn Fn(u32) -> Duration + Send + Sync> = match strategy {
            RetryStrategy::FixedDelay { delay } => Arc::new(move |_| delay),
            RetryStrategy::ExponentialDelay {
                initial_backoff,
                max_backoff,
                multiplier,
            } => Arc::new(move |attempt| {
                exponential_delay(initial_backoff, max_backoff, multiplier, attempt)
            }),
        };
        Self { delay, strategy }
    }

    /// Delay to wait after attempt `attempt` (1-based) failed.
    ///
    /// Attempt `0` is treated as attempt `1`.
    pub fn apply(&self, attempt: u32) -> Duration {
        (self.delay)(attempt.max(1))
    }

    /// Same as [`IntervalFunction::apply`], in whole milliseconds.
    pub fn apply_millis(&self, attempt: u32) -> u64 {
        u64::try_from(self.apply(attempt).as_millis()).unwrap_or(u64::MAX)
    }

    /// Strategy this function was built from.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }
}

impl fmt::Debug for IntervalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalFunction")
            .field("strategy", &self.strategy)
            .finish()
    }
}

fn exponential_delay(initial: Duration, max: Duration, multiplier: f64, attempt: u32) -> Duration {
    if attempt <= 1 {
        return initial.min(max);
    }
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let initial_ms = initial.as_nanos() as f64 / NANOS_PER_MILLI;
    let max_ms = max.as_nanos() as f64 / NANOS_PER_MILLI;
    let scaled = initial_ms * multiplier.powi(exponent);

    if !scaled.is_finite() || scaled >= max_ms {
        return max;
    }
    // Whole milliseconds; the epsilon absorbs powi error just below an integer.
    let millis = (scaled + FLOOR_EPSILON_MS).floor() as u64;
    Duration::from_millis(millis).max(initial).min(max)
}

/// Attempt budget plus interval function, shared read-only by every lookup call.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    max_attempts: u32,
    interval: IntervalFunction,
}

impl RetryConfig {
    /// Validates the strategy and attempt bound.
    ///
    /// `max_attempts` counts every attempt including the first and must be at least 1.
    pub fn new(max_attempts: u32, strategy: RetryStrategy) -> Result<Self> {
        if max_attempts < 1 {
            return Err(LookupError::Config(format!(
                "max attempts must be at least 1, got {max_attempts}"
            )));
        }
        strategy.validate()?;
        Ok(Self {
            max_attempts,
            interval: IntervalFunction::new(strategy),
        })
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Result<Self> {
        Self::new(max_attempts, RetryStrategy::FixedDelay { delay })
    }

    pub fn exponential(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
    ) -> Result<Self> {
        Self::new(
            max_attempts,
            RetryStrategy::ExponentialDelay {
                initial_backoff,
                max_backoff,
                multiplier,
            },
        )
    }

    /// Builds the retry policy from string-keyed options.
    ///
    /// Reads `retry-strategy.type` (default `fixed-delay`), the keys of the
    /// selected strategy, and `max-retries` (default 3) as the attempt bound.
    pub fn create(options: &ConfigOptions) -> Result<Self> {
        let max_attempts = options
            .get_u32(MAX_RETRIES)?
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let strategy = RetryStrategy::from_options(options)?;
        Self::new(max_attempts, strategy)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> &IntervalFunction {
        &self.interval
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: IntervalFunction::new(RetryStrategy::FixedDelay {
                delay: Duration::from_secs(1),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{RetryConfig, RetryStrategy};
    use crate::{ConfigOptions, LookupError};

    #[test]
    fn fixed_delay_from_connector_options() {
        let options = ConfigOptions::new()
            .set(
                "gid.connector.http.source.lookup.retry-strategy.type",
                "fixed-delay",
            )
            .set(
                "gid.connector.http.source.lookup.retry-strategy.fixed-delay.delay",
                "10s",
            )
            .set("lookup.max-retries", "12");

        let retry = RetryConfig::create(&options).expect("must build");

        assert_eq!(retry.max_attempts(), 12);
        for attempt in 1..12 {
            assert_eq!(retry.interval().apply_millis(attempt), 10_000);
        }
    }

    #[test]
    fn exponential_delay_from_options() {
        let options = ConfigOptions::new()
            .set("retry-strategy.type", "exponential-delay")
            .set("retry-strategy.exponential-delay.initial-backoff", "15ms")
            .set("retry-strategy.exponential-delay.max-backoff", "120ms")
            .set("retry-strategy.exponential-delay.backoff-multiplier", "2")
            .set("max-retries", "6");

        let retry = RetryConfig::create(&options).expect("must build");
        let interval = retry.interval();

        assert_eq!(retry.max_attempts(), 6);
        assert_eq!(interval.apply_millis(1), 15);
        assert_eq!(interval.apply_millis(2), 30);
        assert_eq!(interval.apply_millis(3), 60);
        assert_eq!(interval.apply_millis(4), 120);
        assert_eq!(interval.apply_millis(5), 120);
        assert_eq!(interval.apply_millis(6), 120);
    }

    #[test]
    fn exponential_delay_is_monotonic_and_capped() {
        let retry = RetryConfig::exponential(
            50,
            Duration::from_millis(7),
            Duration::from_secs(3),
            1.5,
        )
        .expect("must build");

        let mut previous = Duration::ZERO;
        for attempt in 1..50 {
            let delay = retry.interval().apply(attempt);
            assert!(delay >= previous, "attempt {attempt} decreased");
            assert!(delay >= Duration::from_millis(7));
            assert!(delay <= Duration::from_secs(3));
            previous = delay;
        }
        assert_eq!(retry.interval().apply(49), Duration::from_secs(3));
    }

    #[test]
    fn non_power_of_two_multiplier_is_exact() {
        let short =
            RetryConfig::exponential(8, Duration::from_millis(100), Duration::from_secs(10), 1.7)
                .expect("must build");
        let expected = [100, 170, 289, 491, 835, 1419];
        for (attempt, millis) in (1..).zip(expected) {
            assert_eq!(short.interval().apply_millis(attempt), millis, "attempt {attempt}");
        }

        let long =
            RetryConfig::exponential(8, Duration::from_secs(1), Duration::from_secs(10), 1.7)
                .expect("must build");
        let expected = [1000, 1700, 2890, 4913, 8352, 10_000];
        for (attempt, millis) in (1..).zip(expected) {
            assert_eq!(long.interval().apply_millis(attempt), millis, "attempt {attempt}");
        }

        let gentle =
            RetryConfig::exponential(8, Duration::from_millis(100), Duration::from_secs(10), 1.2)
                .expect("must build");
        let expected = [100, 120, 144, 172, 207];
        for (attempt, millis) in (1..).zip(expected) {
            assert_eq!(gentle.interval().apply_millis(attempt), millis, "attempt {attempt}");
        }
    }

    #[test]
    fn sub_millisecond_initial_backoff_is_kept() {
        let retry = RetryConfig::exponential(
            4,
            Duration::from_micros(1500),
            Duration::from_secs(1),
            2.0,
        )
        .expect("must build");
        assert_eq!(retry.interval().apply(1), Duration::from_micros(1500));
        assert_eq!(retry.interval().apply_millis(2), 3);
        assert_eq!(retry.interval().apply_millis(3), 6);
    }

    #[test]
    fn huge_attempt_saturates_at_max() {
        let retry = RetryConfig::exponential(
            3,
            Duration::from_millis(100),
            Duration::from_secs(10),
            10.0,
        )
        .expect("must build");
        assert_eq!(retry.interval().apply(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn attempt_zero_uses_first_delay() {
        let retry =
            RetryConfig::exponential(3, Duration::from_millis(20), Duration::from_secs(1), 3.0)
                .expect("must build");
        assert_eq!(retry.interval().apply_millis(0), 20);
    }

    #[test]
    fn multiplier_of_one_is_constant() {
        let retry =
            RetryConfig::exponential(5, Duration::from_millis(40), Duration::from_secs(1), 1.0)
                .expect("must build");
        for attempt in 1..5 {
            assert_eq!(retry.interval().apply_millis(attempt), 40);
        }
    }

    #[test]
    fn defaults_to_fixed_delay_with_three_attempts() {
        let options = ConfigOptions::new().set("retry-strategy.fixed-delay.delay", "5ms");
        let retry = RetryConfig::create(&options).expect("must build");
        assert_eq!(retry.max_attempts(), 3);
        assert_eq!(
            retry.interval().strategy(),
            &RetryStrategy::FixedDelay {
                delay: Duration::from_millis(5)
            }
        );
    }

    #[test]
    fn rejects_unknown_strategy() {
        let options = ConfigOptions::new()
            .set("retry-strategy.type", "random-delay")
            .set("retry-strategy.fixed-delay.delay", "5ms");
        let err = RetryConfig::create(&options).expect_err("must fail");
        assert!(matches!(err, LookupError::Config(_)));
    }

    #[test]
    fn rejects_missing_strategy_keys() {
        let options = ConfigOptions::new()
            .set("retry-strategy.type", "exponential-delay")
            .set("retry-strategy.exponential-delay.initial-backoff", "15ms")
            .set("retry-strategy.exponential-delay.backoff-multiplier", "2");
        let err = RetryConfig::create(&options).expect_err("must fail");
        match err {
            LookupError::Config(message) => assert!(message.contains("max-backoff")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_values() {
        let base = ConfigOptions::new()
            .set("retry-strategy.type", "exponential-delay")
            .set("retry-strategy.exponential-delay.initial-backoff", "15ms")
            .set("retry-strategy.exponential-delay.max-backoff", "120ms");

        let low_multiplier = base
            .clone()
            .set("retry-strategy.exponential-delay.backoff-multiplier", "0.5");
        assert!(RetryConfig::create(&low_multiplier).is_err());

        let zero_attempts = base
            .clone()
            .set("retry-strategy.exponential-delay.backoff-multiplier", "2")
            .set("max-retries", "0");
        assert!(RetryConfig::create(&zero_attempts).is_err());

        let negative_delay = ConfigOptions::new().set("retry-strategy.fixed-delay.delay", "-1s");
        assert!(RetryConfig::create(&negative_delay).is_err());

        let inverted = RetryConfig::exponential(
            3,
            Duration::from_secs(2),
            Duration::from_secs(1),
            2.0,
        );
        assert!(inverted.is_err());
    }
}
