//! Error types used at the outer boundary of the client

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access_key::AccessKeyError;

/// Main error type for VoucherGate
///
/// Component errors (classified remote failures, breaker rejections, retry
/// outcomes) stay typed inside their layers; this enum is what configuration
/// loading, client construction and other setup paths report.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum VoucherGateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Access key error: {0}")]
    AccessKey(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AccessKeyError> for VoucherGateError {
    fn from(err: AccessKeyError) -> Self {
        Self::AccessKey(err.to_string())
    }
}

/// Result type alias for VoucherGate operations
pub type Result<T> = std::result::Result<T, VoucherGateError>;
