//! Retry with exponential backoff and cancellation
//!
//! [`RetryExecutor::execute_with_retry`] runs an async operation up to
//! `max_attempts` times. Between attempts it sleeps for
//!
//! ```text
//! min(base_delay * multiplier^(attempt - 1), max_delay) + uniform(0, max_jitter)
//! ```
//!
//! and it stops early when the error says retrying is pointless: a circuit
//! breaker rejection always stops, and a non-retryable error stops when the
//! policy is `recoverable_only`. Every error seen is kept, in order, in the
//! returned [`RetryOutcome`].
//!
//! The jitter source is owned by the executor and can be seeded, so delays
//! are reproducible in tests.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use vouchergate_domain::RetrySettings;

use super::circuit_breaker::{ConfigError, ConfigResult};
use crate::error::ErrorClassification;

/// Backoff parameters for one call site
///
/// Built through [`RetryPolicy::builder`] or one of the presets; fields are
/// private so an unvalidated policy cannot exist.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    max_jitter: Duration,
    recoverable_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// 5 attempts, 2s base, doubling, 30s cap, 1s jitter, recoverable only.
    pub fn standard() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
            recoverable_only: true,
        }
    }

    /// 3 attempts, 5s base, doubling, 60s cap, 2s jitter, recoverable only.
    pub fn conservative() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            max_jitter: Duration::from_secs(2),
            recoverable_only: true,
        }
    }

    /// 7 attempts, 1s base, x1.5, 20s cap, 500ms jitter; retries every error.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 7,
            base_delay: Duration::from_secs(1),
            multiplier: 1.5,
            max_delay: Duration::from_secs(20),
            max_jitter: Duration::from_millis(500),
            recoverable_only: false,
        }
    }

    /// 8 attempts, 3s base, x1.5, 45s cap, 1s jitter, recoverable only.
    ///
    /// Tuned for waiting on the remote side to finish processing a voucher.
    pub fn authorization_polling() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_secs(3),
            multiplier: 1.5,
            max_delay: Duration::from_secs(45),
            max_jitter: Duration::from_secs(1),
            recoverable_only: true,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    pub fn recoverable_only(&self) -> bool {
        self.recoverable_only
    }

    /// Validate the policy
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        if self.base_delay.is_zero() {
            return Err(ConfigError::Invalid {
                message: "base_delay must be greater than 0".to_string(),
            });
        }

        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err(ConfigError::Invalid {
                message: format!("multiplier must be greater than 1, got {}", self.multiplier),
            });
        }

        Ok(())
    }

    /// Backoff after `attempt` (1-based) before jitter is added.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}

impl TryFrom<&RetrySettings> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(settings: &RetrySettings) -> ConfigResult<Self> {
        RetryPolicy::builder()
            .max_attempts(settings.max_attempts)
            .base_delay(Duration::from_millis(settings.base_delay_ms))
            .multiplier(settings.multiplier)
            .max_delay(Duration::from_millis(settings.max_delay_ms))
            .max_jitter(Duration::from_millis(settings.max_jitter_ms))
            .recoverable_only(settings.recoverable_only)
            .build()
    }
}

/// Builder for RetryPolicy with fluent API
///
/// Starts from [`RetryPolicy::standard`].
#[derive(Debug)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::standard() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.policy.max_jitter = jitter;
        self
    }

    pub fn no_jitter(self) -> Self {
        self.max_jitter(Duration::ZERO)
    }

    pub fn recoverable_only(mut self, recoverable_only: bool) -> Self {
        self.policy.recoverable_only = recoverable_only;
        self
    }

    pub fn build(self) -> ConfigResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

/// Why a retry loop ended without a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every attempt failed
    Exhausted,
    /// A non-retryable error under a recoverable-only policy
    NonRecoverable,
    /// A circuit breaker rejected the call
    CircuitOpen,
    /// The caller cancelled
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "retries exhausted"),
            Self::NonRecoverable => write!(f, "non-recoverable error"),
            Self::CircuitOpen => write!(f, "circuit breaker open"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq)]
enum RetryDecision {
    RetryAfter(Duration),
    Stop(StopReason),
}

/// Outcome of one `execute_with_retry` call
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// The successful value, if any attempt succeeded
    pub value: Option<T>,
    /// Attempts actually started
    pub attempts: u32,
    /// Wall time from the first attempt to the end of the loop
    pub total_duration: Duration,
    /// Time spent sleeping between attempts
    pub total_delay: Duration,
    /// Every error seen, oldest first
    pub errors: Vec<E>,
    /// Set when the loop ended without a value
    pub stop_reason: Option<StopReason>,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }

    pub fn last_error(&self) -> Option<&E> {
        self.errors.last()
    }

    pub fn into_parts(self) -> (Option<T>, Vec<E>) {
        (self.value, self.errors)
    }

    /// Take the value out, leaving the attempt statistics and error history.
    pub fn split_value(self) -> (Option<T>, RetryOutcome<(), E>) {
        let success = self.value.is_some();
        let rest = RetryOutcome {
            value: success.then_some(()),
            attempts: self.attempts,
            total_duration: self.total_duration,
            total_delay: self.total_delay,
            errors: self.errors,
            stop_reason: self.stop_reason,
        };
        (self.value, rest)
    }
}

/// The main retry executor
///
/// Holds only the jitter source; policies are passed per call so a single
/// executor can serve several call sites.
pub struct RetryExecutor {
    rng: Mutex<StdRng>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutor {
    /// Executor with jitter seeded from OS entropy
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Executor with reproducible jitter
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    /// Full delay after `attempt`: capped exponential backoff plus jitter.
    pub fn backoff_delay(&self, policy: &RetryPolicy, attempt: u32) -> Duration {
        policy.base_backoff(attempt) + self.jitter(policy.max_jitter())
    }

    fn jitter(&self, max: Duration) -> Duration {
        let max_nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        if max_nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.lock().gen_range(0..=max_nanos))
    }

    fn decide<E: ErrorClassification>(
        &self,
        policy: &RetryPolicy,
        error: &E,
        attempt: u32,
    ) -> RetryDecision {
        if error.is_circuit_open() {
            return RetryDecision::Stop(StopReason::CircuitOpen);
        }
        if policy.recoverable_only() && !error.is_retryable() {
            return RetryDecision::Stop(StopReason::NonRecoverable);
        }
        if attempt >= policy.max_attempts() {
            return RetryDecision::Stop(StopReason::Exhausted);
        }
        RetryDecision::RetryAfter(self.backoff_delay(policy, attempt))
    }

    /// Run `operation` under `policy` until it succeeds or a stop rule fires.
    ///
    /// `operation` receives the 1-based attempt number. Cancelling `cancel`
    /// aborts the attempt in flight or the backoff sleep and ends the loop
    /// with [`StopReason::Cancelled`].
    #[instrument(skip_all, fields(max_attempts = policy.max_attempts()))]
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClassification + fmt::Display,
    {
        let started = Instant::now();
        let mut outcome = RetryOutcome {
            value: None,
            attempts: 0,
            total_duration: Duration::ZERO,
            total_delay: Duration::ZERO,
            errors: Vec::new(),
            stop_reason: None,
        };

        for attempt in 1..=policy.max_attempts() {
            if cancel.is_cancelled() {
                outcome.stop_reason = Some(StopReason::Cancelled);
                break;
            }

            outcome.attempts = attempt;
            debug!(attempt, max_attempts = policy.max_attempts(), "Executing operation");

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt, "Attempt cancelled");
                    outcome.stop_reason = Some(StopReason::Cancelled);
                    break;
                }
                result = operation(attempt) => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retries");
                    }
                    outcome.value = Some(value);
                    break;
                }
                Err(error) => error,
            };

            let decision = self.decide(policy, &error, attempt);
            match decision {
                RetryDecision::Stop(reason) => {
                    warn!(attempt, %reason, error = %error, "Giving up on operation");
                    outcome.errors.push(error);
                    outcome.stop_reason = Some(reason);
                    break;
                }
                RetryDecision::RetryAfter(delay) => {
                    warn!(attempt, ?delay, error = %error, "Operation failed, retrying");
                    outcome.errors.push(error);

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!(attempt, "Backoff cancelled");
                            outcome.stop_reason = Some(StopReason::Cancelled);
                            break;
                        }
                        () = tokio::time::sleep(delay) => {
                            outcome.total_delay += delay;
                        }
                    }
                }
            }
        }

        outcome.total_duration = started.elapsed();
        outcome
    }
}
