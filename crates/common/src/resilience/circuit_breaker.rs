//! Circuit breaker for a single remote endpoint
//!
//! The breaker watches the outcome of every call it admits and stops invoking
//! a remote service that keeps failing. It moves between three states:
//!
//! - **Closed**: calls pass through. Consecutive failures are counted and the
//!   breaker opens once the count reaches the failure threshold.
//! - **Open**: calls are rejected without running the operation until the
//!   open timeout has elapsed since the breaker opened.
//! - **HalfOpen**: up to `max_test_requests` probe calls are admitted. A probe
//!   failure reopens the breaker immediately; `max_test_requests` successful
//!   probes close it.
//!
//! The Open to HalfOpen transition is lazy: it happens on the first call
//! attempted after the timeout, never on a timer.
//!
//! All state lives in one struct behind one `parking_lot::RwLock`. Admission
//! and recording take the write lock; the lock is released while the wrapped
//! operation runs, and a half-open probe slot is reserved at admission so
//! concurrent callers cannot exceed `max_test_requests`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use vouchergate_domain::BreakerSettings;

use crate::error::{ErrorClassification, ErrorSeverity};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Circuit breakers use real system time in production and controlled mock
/// time in tests, so cooldown behaviour can be tested without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Wall clock as a UTC timestamp, for snapshots and logs
    fn utc_now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.system_time())
    }

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient sharing
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed time, so a test can keep one handle and pass
/// another to the breaker.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors returned by [`CircuitBreaker::execute`]
///
/// A rejection (`CircuitOpen`) is kept apart from a failure of the wrapped
/// operation so callers can tell "the remote failed" from "we did not call
/// the remote at all".
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker is open, rejecting calls (retry in {remaining:?})")]
    CircuitOpen { remaining: Duration },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The wrapped operation's error, if the operation ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            Self::CircuitOpen { .. } => None,
        }
    }
}

impl<E> ErrorClassification for ResilienceError<E>
where
    E: std::error::Error + ErrorClassification + Send + Sync + 'static,
{
    fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitOpen { .. } => false,
            Self::OperationFailed { source } => source.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CircuitOpen { .. } => ErrorSeverity::Warning,
            Self::OperationFailed { source } => source.severity(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { remaining } => Some(*remaining),
            Self::OperationFailed { source } => source.retry_after(),
        }
    }

    fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing limited requests to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time to wait in Open before probing
    pub open_timeout: Duration,
    /// A success in Closed clears the failure count only once this much time
    /// has passed since the last failure
    pub evaluation_window: Duration,
    /// Probes admitted in HalfOpen, and successes needed to close
    pub max_test_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            evaluation_window: Duration::from_secs(60),
            max_test_requests: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Slower to open and slower to recover; for production endpoints.
    pub fn conservative() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(60),
            evaluation_window: Duration::from_secs(120),
            max_test_requests: 2,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.max_test_requests == 0 {
            return Err(ConfigError::Invalid {
                message: "max_test_requests must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl TryFrom<&BreakerSettings> for CircuitBreakerConfig {
    type Error = ConfigError;

    fn try_from(settings: &BreakerSettings) -> ConfigResult<Self> {
        CircuitBreakerConfig::builder()
            .failure_threshold(settings.failure_threshold)
            .open_timeout(Duration::from_secs(settings.open_timeout_secs))
            .evaluation_window(Duration::from_secs(settings.evaluation_window_secs))
            .max_test_requests(settings.max_test_requests)
            .build()
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn evaluation_window(mut self, window: Duration) -> Self {
        self.config.evaluation_window = window;
        self
    }

    pub fn max_test_requests(mut self, max: u32) -> Self {
        self.config.max_test_requests = max;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Point-in-time view of a breaker, suitable for logs and status endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub successful_probes: u32,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub blocked_calls: u64,
    pub times_opened: u64,
    pub time_in_state: Duration,
    pub last_state_change: DateTime<Utc>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_opened: Option<DateTime<Utc>>,
    pub last_closed: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    /// Bumped on every transition; results from an older generation only
    /// update counters.
    generation: u64,
    consecutive_failures: u32,
    successful_probes: u32,
    probes_in_flight: u32,
    last_state_change: Instant,
    last_failure: Option<Instant>,
    last_state_change_at: DateTime<Utc>,
    last_failure_at: Option<DateTime<Utc>>,
    last_opened_at: Option<DateTime<Utc>>,
    last_closed_at: Option<DateTime<Utc>>,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
    blocked_calls: u64,
    times_opened: u64,
}

impl BreakerCore {
    fn new(now: Instant, now_utc: DateTime<Utc>) -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            consecutive_failures: 0,
            successful_probes: 0,
            probes_in_flight: 0,
            last_state_change: now,
            last_failure: None,
            last_state_change_at: now_utc,
            last_failure_at: None,
            last_opened_at: None,
            last_closed_at: None,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            blocked_calls: 0,
            times_opened: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant, now_utc: DateTime<Utc>) {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.last_state_change = now;
        self.last_state_change_at = now_utc;
        self.successful_probes = 0;
        self.probes_in_flight = 0;

        match to {
            CircuitState::Open => {
                self.times_opened += 1;
                self.last_opened_at = Some(now_utc);
                warn!(
                    from = %from,
                    consecutive_failures = self.consecutive_failures,
                    times_opened = self.times_opened,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                info!(from = %from, "Circuit breaker half-open, probing");
            }
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.last_closed_at = Some(now_utc);
                info!(from = %from, "Circuit breaker closed");
            }
        }
    }
}

/// Admission ticket for one call.
///
/// Dropping a probe ticket without recording an outcome (the caller's future
/// was cancelled) gives the half-open slot back.
struct Permit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl<C: Clock> Permit<'_, C> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.generation, self.probe);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.generation, self.probe);
    }
}

impl<C: Clock> Drop for Permit<'_, C> {
    fn drop(&mut self) {
        if self.settled || !self.probe {
            return;
        }
        let mut core = self.breaker.core.write();
        if core.generation == self.generation {
            core.probes_in_flight = core.probes_in_flight.saturating_sub(1);
        }
    }
}

/// Circuit breaker guarding one remote endpoint
///
/// Meant to be created once and shared (`Arc<CircuitBreaker>`) by every
/// caller that talks to that endpoint.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    core: RwLock<BreakerCore>,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &core.state)
            .field("consecutive_failures", &core.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let core = BreakerCore::new(clock.now(), clock.utc_now());
        Ok(Self { config, core: RwLock::new(core), clock })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` if the breaker admits it and record the outcome.
    ///
    /// A rejection returns [`ResilienceError::CircuitOpen`] without calling
    /// `operation` and without touching the failure count.
    #[instrument(skip(self, operation), fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let permit = match self.admit() {
            Ok(permit) => permit,
            Err(remaining) => {
                debug!(?remaining, "Circuit breaker rejecting call");
                return Err(ResilienceError::CircuitOpen { remaining });
            }
        };

        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(error) => {
                debug!(error = %error, "Circuit breaker recorded failure");
                permit.fail();
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    fn admit(&self) -> Result<Permit<'_, C>, Duration> {
        let mut core = self.core.write();
        let now = self.clock.now();

        if core.state == CircuitState::Open {
            let elapsed = now.saturating_duration_since(core.last_state_change);
            if elapsed < self.config.open_timeout {
                core.blocked_calls += 1;
                return Err(self.config.open_timeout - elapsed);
            }
            core.transition(CircuitState::HalfOpen, now, self.clock.utc_now());
        }

        let probe = match core.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen => {
                if core.successful_probes + core.probes_in_flight >= self.config.max_test_requests {
                    core.blocked_calls += 1;
                    return Err(Duration::ZERO);
                }
                core.probes_in_flight += 1;
                true
            }
            CircuitState::Open => {
                core.blocked_calls += 1;
                return Err(Duration::ZERO);
            }
        };

        core.total_calls += 1;
        Ok(Permit { breaker: self, generation: core.generation, probe, settled: false })
    }

    fn record_success(&self, generation: u64, probe: bool) {
        let mut core = self.core.write();
        core.successful_calls += 1;
        if core.generation != generation {
            return;
        }

        let now = self.clock.now();
        match core.state {
            CircuitState::Closed => {
                let window_elapsed = core.last_failure.map_or(true, |last| {
                    now.saturating_duration_since(last) >= self.config.evaluation_window
                });
                if window_elapsed {
                    core.consecutive_failures = 0;
                }
            }
            CircuitState::HalfOpen if probe => {
                core.probes_in_flight = core.probes_in_flight.saturating_sub(1);
                core.successful_probes += 1;
                debug!(successful_probes = core.successful_probes, "Probe succeeded");
                if core.successful_probes >= self.config.max_test_requests {
                    core.transition(CircuitState::Closed, now, self.clock.utc_now());
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn record_failure(&self, generation: u64, probe: bool) {
        let mut core = self.core.write();
        let now = self.clock.now();
        let now_utc = self.clock.utc_now();

        core.failed_calls += 1;
        core.last_failure = Some(now);
        core.last_failure_at = Some(now_utc);
        if core.generation != generation {
            return;
        }

        match core.state {
            CircuitState::Closed => {
                core.consecutive_failures += 1;
                if core.consecutive_failures >= self.config.failure_threshold {
                    core.transition(CircuitState::Open, now, now_utc);
                }
            }
            CircuitState::HalfOpen if probe => {
                warn!("Probe failed, reopening circuit breaker");
                core.transition(CircuitState::Open, now, now_utc);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// Current state, as last recorded.
    ///
    /// An Open breaker whose timeout has elapsed still reports Open until the
    /// next call attempt moves it to HalfOpen.
    pub fn state(&self) -> CircuitState {
        self.core.read().state
    }

    /// Snapshot of state and counters
    pub fn stats(&self) -> CircuitBreakerStats {
        let core = self.core.read();
        CircuitBreakerStats {
            state: core.state,
            consecutive_failures: core.consecutive_failures,
            successful_probes: core.successful_probes,
            total_calls: core.total_calls,
            successful_calls: core.successful_calls,
            failed_calls: core.failed_calls,
            blocked_calls: core.blocked_calls,
            times_opened: core.times_opened,
            time_in_state: self.clock.now().saturating_duration_since(core.last_state_change),
            last_state_change: core.last_state_change_at,
            last_failure: core.last_failure_at,
            last_opened: core.last_opened_at,
            last_closed: core.last_closed_at,
        }
    }

    /// Cooldown left before an Open breaker admits a probe; `None` unless Open.
    pub fn remaining_open_time(&self) -> Option<Duration> {
        let core = self.core.read();
        if core.state != CircuitState::Open {
            return None;
        }
        let elapsed = self.clock.now().saturating_duration_since(core.last_state_change);
        Some(self.config.open_timeout.saturating_sub(elapsed))
    }

    /// Whether the next call would be let through (ignoring probe saturation).
    pub fn is_operational(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => self.remaining_open_time() == Some(Duration::ZERO),
        }
    }

    /// Force the breaker Closed and zero every counter
    pub fn reset(&self) {
        let mut core = self.core.write();
        let generation = core.generation + 1;
        *core = BreakerCore::new(self.clock.now(), self.clock.utc_now());
        core.generation = generation;
        info!("Circuit breaker manually reset to closed state");
    }
}
