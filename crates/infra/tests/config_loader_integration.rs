//! Integration tests for configuration loading
//!
//! Loads real files from a temporary directory and turns them into a working
//! SOAP client.

use std::fs;

use tempfile::TempDir;
use vouchergate_domain::{Environment, VoucherGateError};
use vouchergate_infra::{config, SoapClient};

#[test]
fn test_load_toml_file_into_client() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("vouchergate.toml");
    fs::write(
        &path,
        r#"
environment = "production"

[soap]
timeout_secs = 20
reception_url = "http://localhost:8088/recepcion"

[submission_retry]
max_attempts = 3
base_delay_ms = 500
multiplier = 1.5

[breaker]
failure_threshold = 4
"#,
    )
    .expect("write config");

    let config = config::load_from_file(Some(path)).expect("config");

    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.submission_retry.max_attempts, 3);
    assert_eq!(config.breaker.failure_threshold, 4);
    assert_eq!(config.breaker.open_timeout_secs, 30);

    let client = SoapClient::from_config(&config).expect("client");
    assert_eq!(client.endpoints().reception, "http://localhost:8088/recepcion");
    assert!(client.endpoints().authorization.starts_with("https://cel.sri.gob.ec/"));
}

#[test]
fn test_load_json_file_with_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"environment": "test"}"#).expect("write config");

    let config = config::load_from_file(Some(path)).expect("config");

    assert_eq!(config, vouchergate_domain::Config::default());
}

#[test]
fn test_invalid_breaker_settings_are_rejected_at_load() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("vouchergate.json");
    fs::write(&path, r#"{"breaker": {"max_test_requests": 0}}"#).expect("write config");

    let err = config::load_from_file(Some(path)).unwrap_err();

    assert!(
        matches!(err, VoucherGateError::Config(ref msg) if msg.contains("max_test_requests")),
        "unexpected error: {err}"
    );
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("vouchergate.toml");
    fs::write(&path, "environment = ").expect("write config");

    let err = config::load_from_file(Some(path)).unwrap_err();

    assert!(matches!(err, VoucherGateError::Config(ref msg) if msg.starts_with("Invalid TOML")));
}
