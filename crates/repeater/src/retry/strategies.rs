//! Retry delay strategies
//!
//! A strategy maps an attempt number to the time to wait before that attempt.
//! The executor asks for `next_delay(n)` right before the `n`-th retry, so
//! attempt `0` (the initial call) never waits.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound for backoff delays
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default jitter fraction for backoff delays (10%)
pub const DEFAULT_JITTER: f64 = 0.1;

/// Default growth base for exponential backoff
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Computes the wait before a retry attempt
///
/// Implementations must be immutable: one strategy is typically shared by
/// many repeaters through an `Arc<dyn Strategy>`.
///
/// Custom policies can implement this directly or wrap a closure in
/// [`FnStrategy`].
pub trait Strategy: Send + Sync {
    /// Delay to wait before the given attempt (1-indexed; 0 means "first call")
    fn next_delay(&self, attempt: u32) -> Duration;
}

impl<S: Strategy + ?Sized> Strategy for Arc<S> {
    fn next_delay(&self, attempt: u32) -> Duration {
        (**self).next_delay(attempt)
    }
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn next_delay(&self, attempt: u32) -> Duration {
        (**self).next_delay(attempt)
    }
}

/// A strategy backed by a closure
///
/// ```rust
/// use repeater::retry::{FnStrategy, Strategy};
/// use std::time::Duration;
///
/// // Triple the wait on every attempt
/// let tripling = FnStrategy::new(|attempt| {
///     if attempt == 0 {
///         Duration::ZERO
///     } else {
///         Duration::from_millis(10).saturating_mul(3u32.saturating_pow(attempt - 1))
///     }
/// });
///
/// assert_eq!(tripling.next_delay(3), Duration::from_millis(90));
/// ```
pub struct FnStrategy<F> {
    delay_fn: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    pub fn new(delay_fn: F) -> Self {
        Self { delay_fn }
    }
}

impl<F> Strategy for FnStrategy<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_delay(&self, attempt: u32) -> Duration {
        (self.delay_fn)(attempt)
    }
}

/// The same delay before every retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Strategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.delay
    }
}

/// How a backoff delay grows with the attempt number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffType {
    /// Always the initial delay
    Constant,

    /// `initial * attempt`
    Linear,

    /// `initial * multiplier^(attempt - 1)` (default)
    #[default]
    Exponential,
}

/// Growing delay with an optional cap and random jitter
///
/// # Example
///
/// ```rust
/// use repeater::retry::{Backoff, BackoffType, Strategy};
/// use std::time::Duration;
///
/// let backoff = Backoff::new(Duration::from_millis(100))
///     .with_type(BackoffType::Linear)
///     .with_max_delay(Duration::from_millis(250))
///     .with_jitter(0.0);
///
/// assert_eq!(backoff.next_delay(2), Duration::from_millis(200));
/// assert_eq!(backoff.next_delay(3), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    backoff_type: BackoffType,
    max_delay: Duration,
    jitter: f64,
    multiplier: f64,
}

impl Backoff {
    /// Exponential backoff from `initial`, capped at 30s, with 10% jitter
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            backoff_type: BackoffType::default(),
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }

    pub fn with_type(mut self, backoff_type: BackoffType) -> Self {
        self.backoff_type = backoff_type;
        self
    }

    /// Upper bound applied before jitter. `Duration::ZERO` disables the cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Jitter fraction, clamped into `[0.0, 1.0]`. NaN disables jitter.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_nan() {
            0.0
        } else {
            jitter.clamp(0.0, 1.0)
        };
        self
    }

    /// Growth base for exponential backoff. Values below 1.0 (or NaN) fall back to 1.0.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };
        self
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn backoff_type(&self) -> BackoffType {
        self.backoff_type
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Delay for `attempt` after scaling and capping, before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let scaled = match self.backoff_type {
            BackoffType::Constant => self.initial,
            BackoffType::Linear => self.initial.saturating_mul(attempt),
            BackoffType::Exponential => {
                let factor = self.multiplier.powf(f64::from(attempt - 1));
                // `as` saturates, so an overflowing factor pins at u64::MAX nanos
                let nanos = self.initial.as_nanos() as f64 * factor;
                Duration::from_nanos(nanos as u64)
            }
        };

        if self.max_delay.is_zero() {
            scaled
        } else {
            scaled.min(self.max_delay)
        }
    }
}

impl Strategy for Backoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter == 0.0 || delay.is_zero() {
            return delay;
        }

        let nanos = delay.as_nanos() as f64;
        let spread = nanos * self.jitter / 2.0;
        let offset = rand::rng().random_range(-spread..=spread);
        Duration::from_nanos((nanos + offset).max(0.0).round() as u64)
    }
}
