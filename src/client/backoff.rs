//! Exponential backoff with bounded jitter, plus the pluggable wait primitive.
//!
//! `delay(n) = base × 2^(n-1)`, then `+ delay × 0.1 × U(0,1)`, capped at the
//! max delay. Attempt numbers are 1-based: `delay(1)` is the wait before the
//! second attempt.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay in seconds.
pub const DEFAULT_BASE_DELAY_SECS: f64 = 1.0;

/// Default cap on a single delay in seconds.
pub const DEFAULT_MAX_DELAY_SECS: f64 = 30.0;

/// Smallest base delay accepted.
pub const MIN_BASE_DELAY_SECS: f64 = 0.1;

/// Largest number of retries accepted.
pub const MAX_RETRIES_CEILING: u32 = 20;

/// Largest base delay or delay cap accepted, in seconds.
pub const MAX_DELAY_CEILING_SECS: f64 = 3600.0;

/// Fraction of the computed delay added as jitter at most.
pub const JITTER_FRACTION: f64 = 0.1;

/// Computes retry delays.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffScheduler {
    max_retries: u32,
    base_delay_secs: f64,
    max_delay_secs: f64,
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_secs: DEFAULT_BASE_DELAY_SECS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
        }
    }
}

impl BackoffScheduler {
    /// Create a scheduler, sanitizing caller-supplied values.
    ///
    /// `max_retries` clamps to `0..=MAX_RETRIES_CEILING`. The base delay clamps
    /// to `MIN_BASE_DELAY_SECS..=MAX_DELAY_CEILING_SECS`; non-finite values fall
    /// back to the default.
    pub fn new(max_retries: i64, base_delay_secs: f64) -> Self {
        Self {
            max_retries: sanitize_max_retries(max_retries),
            base_delay_secs: sanitize_base_delay(base_delay_secs),
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
        }
    }

    /// Set the cap on a single delay. Never lower than the base delay nor
    /// higher than [`MAX_DELAY_CEILING_SECS`].
    pub fn with_max_delay_secs(mut self, max_delay_secs: f64) -> Self {
        self.max_delay_secs = if max_delay_secs.is_finite() {
            max_delay_secs.clamp(self.base_delay_secs, MAX_DELAY_CEILING_SECS)
        } else {
            DEFAULT_MAX_DELAY_SECS
        };
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay_secs(&self) -> f64 {
        self.base_delay_secs
    }

    pub fn max_delay_secs(&self) -> f64 {
        self.max_delay_secs
    }

    /// Total attempts a call may make (first try plus retries).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Randomized delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let unit: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.delay_with_jitter(attempt, unit)
    }

    /// Deterministic delay for a given jitter sample in `[0, 1]`.
    pub fn delay_with_jitter(&self, attempt: u32, unit: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let exponential = self.base_delay_secs * 2f64.powi(exponent);
        let jitter = exponential * JITTER_FRACTION * unit.clamp(0.0, 1.0);
        let secs = (exponential + jitter).min(self.max_delay_secs);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Upper bound on the time one call can take with a given per-attempt timeout.
    ///
    /// Every attempt may run up to `timeout`; every retry waits at most the
    /// fully-jittered delay.
    pub fn worst_case_total(&self, timeout: Duration) -> Duration {
        let attempts = timeout
            .checked_mul(self.max_attempts())
            .unwrap_or(Duration::MAX);
        (1..=self.max_retries)
            .map(|attempt| self.delay_with_jitter(attempt, 1.0))
            .fold(attempts, Duration::saturating_add)
    }
}

fn sanitize_max_retries(max_retries: i64) -> u32 {
    max_retries.clamp(0, MAX_RETRIES_CEILING as i64) as u32
}

fn sanitize_base_delay(base_delay_secs: f64) -> f64 {
    if base_delay_secs.is_finite() {
        base_delay_secs.clamp(MIN_BASE_DELAY_SECS, MAX_DELAY_CEILING_SECS)
    } else {
        DEFAULT_BASE_DELAY_SECS
    }
}

/// The wait primitive used between attempts.
///
/// The default waits on the tokio timer; hosts and tests may substitute their own.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Waits using `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
