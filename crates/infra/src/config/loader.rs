//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. A `.env` file in the working directory, if any, is merged into the
//!    process environment
//! 2. Environment variables are tried first
//! 3. If `VOUCHERGATE_ENVIRONMENT` is missing, falls back to a config file
//! 4. Probes multiple paths for config files (JSON or TOML)
//! 5. Retry and breaker numbers are validated before the config is returned
//!
//! ## Environment Variables
//! - `VOUCHERGATE_ENVIRONMENT`: `test`/`production` (or `1`/`2`), required
//! - `VOUCHERGATE_TIMEOUT_SECS`: HTTP timeout per SOAP call
//! - `VOUCHERGATE_USER_AGENT`: User-Agent header
//! - `VOUCHERGATE_RECEPTION_URL`: reception endpoint override
//! - `VOUCHERGATE_AUTHORIZATION_URL`: authorization endpoint override
//! - `VOUCHERGATE_SETTLE_DELAY_MS`: pause between submission and first query
//! - `VOUCHERGATE_POLL_ATTEMPTS`, `VOUCHERGATE_POLL_INTERVAL_MS`: plain
//!   client polling
//! - `VOUCHERGATE_SUBMISSION_MAX_ATTEMPTS`,
//!   `VOUCHERGATE_AUTHORIZATION_MAX_ATTEMPTS`: retry budgets
//! - `VOUCHERGATE_RETRY_RECOVERABLE_ONLY`: applies to both stages
//! - `VOUCHERGATE_BREAKER_FAILURE_THRESHOLD`,
//!   `VOUCHERGATE_BREAKER_OPEN_TIMEOUT_SECS`: circuit breaker
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following names, in order, in the current working
//! directory, its two parents, and next to the executable:
//! `vouchergate.toml`, `vouchergate.json`, `config.toml`, `config.json`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use vouchergate_common::{CircuitBreakerConfig, RetryPolicy};
use vouchergate_domain::{Config, Environment, Result, VoucherGateError};

use crate::errors::InfraError;

const CONFIG_FILE_NAMES: [&str; 4] =
    ["vouchergate.toml", "vouchergate.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `VoucherGateError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Retry or breaker settings are out of range
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `VOUCHERGATE_ENVIRONMENT` is required; see the module documentation
/// for the optional overrides.
///
/// # Errors
/// Returns `VoucherGateError::Config` if the environment variable is missing
/// or any variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let environment = parse_environment(&env_var("VOUCHERGATE_ENVIRONMENT")?)?;
    let mut config = Config { environment, ..Config::default() };

    let soap = &mut config.soap;
    if let Some(timeout) = env_parse("VOUCHERGATE_TIMEOUT_SECS")? {
        soap.timeout_secs = timeout;
    }
    if let Some(agent) = env_opt("VOUCHERGATE_USER_AGENT") {
        soap.user_agent = agent;
    }
    soap.reception_url = env_opt("VOUCHERGATE_RECEPTION_URL").or(soap.reception_url.take());
    soap.authorization_url =
        env_opt("VOUCHERGATE_AUTHORIZATION_URL").or(soap.authorization_url.take());
    if let Some(delay) = env_parse("VOUCHERGATE_SETTLE_DELAY_MS")? {
        soap.settle_delay_ms = delay;
    }
    if let Some(attempts) = env_parse("VOUCHERGATE_POLL_ATTEMPTS")? {
        soap.poll_attempts = attempts;
    }
    if let Some(interval) = env_parse("VOUCHERGATE_POLL_INTERVAL_MS")? {
        soap.poll_interval_ms = interval;
    }

    if let Some(attempts) = env_parse("VOUCHERGATE_SUBMISSION_MAX_ATTEMPTS")? {
        config.submission_retry.max_attempts = attempts;
    }
    if let Some(attempts) = env_parse("VOUCHERGATE_AUTHORIZATION_MAX_ATTEMPTS")? {
        config.authorization_retry.max_attempts = attempts;
    }
    if std::env::var("VOUCHERGATE_RETRY_RECOVERABLE_ONLY").is_ok() {
        let recoverable_only = env_bool("VOUCHERGATE_RETRY_RECOVERABLE_ONLY", true);
        config.submission_retry.recoverable_only = recoverable_only;
        config.authorization_retry.recoverable_only = recoverable_only;
    }

    if let Some(threshold) = env_parse("VOUCHERGATE_BREAKER_FAILURE_THRESHOLD")? {
        config.breaker.failure_threshold = threshold;
    }
    if let Some(timeout) = env_parse("VOUCHERGATE_BREAKER_OPEN_TIMEOUT_SECS")? {
        config.breaker.open_timeout_secs = timeout;
    }

    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `VoucherGateError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Retry or breaker settings are out of range
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(VoucherGateError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            VoucherGateError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;
    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); anything else
/// is rejected.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents).map_err(|e| InfraError::from(e).into()),
        _ => Err(VoucherGateError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Reject retry and breaker settings the resilience layer would refuse.
fn validate(config: &Config) -> Result<()> {
    RetryPolicy::try_from(&config.submission_retry).map_err(InfraError::from)?;
    RetryPolicy::try_from(&config.authorization_retry).map_err(InfraError::from)?;
    CircuitBreakerConfig::try_from(&config.breaker).map_err(InfraError::from)?;
    Ok(())
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn parse_environment(raw: &str) -> Result<Environment> {
    raw.parse::<Environment>().map_err(VoucherGateError::Config)
}

/// Get required environment variable
///
/// # Errors
/// Returns `VoucherGateError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        VoucherGateError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Non-blank value of an optional environment variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| VoucherGateError::Config(format!("Invalid value for {}: {}", key, e)))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
