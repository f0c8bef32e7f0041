//! Resilience patterns for calling an unreliable remote service
//!
//! - **Circuit Breaker**: stops invoking an endpoint that keeps failing and
//!   probes it cautiously once a cooldown has passed
//! - **Retry**: bounded attempts with capped exponential backoff, uniform
//!   jitter and cooperative cancellation
//!
//! Both are generic over the operation's error type. The retry executor asks
//! errors to classify themselves through
//! [`ErrorClassification`](crate::error::ErrorClassification); the breaker
//! counts every failure regardless of class.
//!
//! The two compose: wrap the breaker call inside the retry operation so each
//! attempt passes through the breaker, and a breaker rejection
//! ([`ResilienceError::CircuitOpen`]) ends the retry loop at once.

pub mod circuit_breaker;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerStats,
    CircuitState, Clock, ConfigError, ConfigResult, MockClock, ResilienceError, ResilienceResult,
    SystemClock,
};
// Re-export retry types
pub use retry::{
    RetryExecutor, RetryOutcome, RetryPolicy, RetryPolicyBuilder, StopReason,
};
