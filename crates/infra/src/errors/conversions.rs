//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use vouchergate_common::ConfigError;
use vouchergate_domain::VoucherGateError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub VoucherGateError);

impl From<InfraError> for VoucherGateError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<VoucherGateError> for InfraError {
    fn from(value: VoucherGateError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoVoucherGateError {
    fn into_voucher_gate(self) -> VoucherGateError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → VoucherGateError */
/* -------------------------------------------------------------------------- */

impl IntoVoucherGateError for HttpError {
    fn into_voucher_gate(self) -> VoucherGateError {
        if self.is_builder() {
            return VoucherGateError::Config(format!("invalid HTTP client settings: {self}"));
        }
        if self.is_timeout() {
            return VoucherGateError::Network(format!("http timeout: {self}"));
        }
        if self.is_decode() || self.is_body() {
            return VoucherGateError::Protocol(format!("http body error: {self}"));
        }
        VoucherGateError::Network(format!("http error: {self}"))
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        InfraError(err.into_voucher_gate())
    }
}

/* -------------------------------------------------------------------------- */
/* Configuration sources → VoucherGateError */
/* -------------------------------------------------------------------------- */

impl IntoVoucherGateError for std::io::Error {
    fn into_voucher_gate(self) -> VoucherGateError {
        VoucherGateError::Config(format!("Failed to read config file: {self}"))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        InfraError(err.into_voucher_gate())
    }
}

impl IntoVoucherGateError for toml::de::Error {
    fn into_voucher_gate(self) -> VoucherGateError {
        VoucherGateError::Config(format!("Invalid TOML format: {self}"))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(err: toml::de::Error) -> Self {
        InfraError(err.into_voucher_gate())
    }
}

impl IntoVoucherGateError for serde_json::Error {
    fn into_voucher_gate(self) -> VoucherGateError {
        VoucherGateError::Config(format!("Invalid JSON format: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        InfraError(err.into_voucher_gate())
    }
}

impl IntoVoucherGateError for ConfigError {
    fn into_voucher_gate(self) -> VoucherGateError {
        VoucherGateError::Config(self.to_string())
    }
}

impl From<ConfigError> for InfraError {
    fn from(err: ConfigError) -> Self {
        InfraError(err.into_voucher_gate())
    }
}
