//! Configuration management

use serde::{Deserialize, Serialize};

use crate::access_key::Environment;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub soap: SoapSettings,
    #[serde(default = "RetrySettings::submission")]
    pub submission_retry: RetrySettings,
    #[serde(default = "RetrySettings::authorization")]
    pub authorization_retry: RetrySettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            soap: SoapSettings::default(),
            submission_retry: RetrySettings::submission(),
            authorization_retry: RetrySettings::authorization(),
            breaker: BreakerSettings::default(),
        }
    }
}

/// Wait between a successful submission and the first authorization query,
/// shared by the orchestrator and the SOAP client's own helper.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5_000;

/// SOAP transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoapSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Overrides the environment's reception endpoint when set.
    pub reception_url: Option<String>,
    /// Overrides the environment's authorization endpoint when set.
    pub authorization_url: Option<String>,
    /// Pause between a successful submission and the first authorization query.
    pub settle_delay_ms: u64,
    /// Authorization queries made by the client's own submit-and-poll helper.
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for SoapSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("vouchergate/", env!("CARGO_PKG_VERSION")).to_string(),
            reception_url: None,
            authorization_url: None,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            poll_attempts: 5,
            poll_interval_ms: 3_000,
        }
    }
}

/// Backoff parameters for one call site
///
/// Fields left out of a config file fall back to the submission preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
    pub recoverable_only: bool,
}

impl RetrySettings {
    /// Quick retries for transient submission failures.
    pub fn submission() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            max_jitter_ms: 1_000,
            recoverable_only: true,
        }
    }

    /// Patient polling while the authority processes a voucher.
    pub fn authorization() -> Self {
        Self {
            max_attempts: 8,
            base_delay_ms: 3_000,
            multiplier: 1.5,
            max_delay_ms: 45_000,
            max_jitter_ms: 1_000,
            recoverable_only: true,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::submission()
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout_secs: u64,
    pub evaluation_window_secs: u64,
    pub max_test_requests: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_secs: 30,
            evaluation_window_secs: 60,
            max_test_requests: 3,
        }
    }
}
