//! Classified remote failures

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vouchergate_common::error::{ErrorClassification, ErrorSeverity};

/// Failure taxonomy for the tax authority's web services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Connection,
    Timeout,
    System,
    Authentication,
    Validation,
    Data,
    Certificate,
    Signature,
    AccessKey,
    Format,
}

impl ErrorKind {
    /// Whether failures of this kind are worth retrying when nothing more
    /// specific is known.
    pub const fn default_recoverable(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout | Self::System)
    }

    /// Stable label used in logs and in `Display`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Connection => "CONNECTION",
            Self::Timeout => "TIMEOUT",
            Self::System => "SYSTEM",
            Self::Authentication => "AUTHENTICATION",
            Self::Validation => "VALIDATION",
            Self::Data => "DATA",
            Self::Certificate => "CERTIFICATE",
            Self::Signature => "SIGNATURE",
            Self::AccessKey => "ACCESS_KEY",
            Self::Format => "FORMAT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure observed while talking to the tax authority, tagged with its
/// kind and whether retrying can help.
///
/// Created once when the failure is observed and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{kind}] {code}: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    code: String,
    message: String,
    detail: String,
    recoverable: bool,
    suggestion: String,
    http_status: Option<u16>,
}

impl ClassifiedError {
    /// Error of `kind` with the kind's default recoverability and no detail.
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            detail: String::new(),
            recoverable: kind.default_recoverable(),
            suggestion: String::new(),
            http_status: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// The remote could not be reached.
    pub fn connection_failure(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, "CONNECTION_FAILED", "Could not reach the tax authority")
            .with_detail(detail)
            .with_suggestion("Check network connectivity and the service status page, then retry.")
    }

    /// The remote did not answer within the client timeout.
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, "REQUEST_TIMEOUT", "Request to the tax authority timed out")
            .with_detail(detail)
            .with_suggestion("Retry later or raise the client timeout.")
    }

    /// A local field failed validation before or after a call.
    pub fn validation(field: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Validation,
            format!("VALIDATION_{}", field.to_uppercase()),
            format!("Validation failed for field: {field}"),
        )
        .with_detail(detail)
        .with_suggestion(format!("Correct the value of {field} and resubmit."))
    }

    /// The signing certificate was rejected or is unusable.
    pub fn certificate(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Certificate, "CERTIFICATE_ERROR", "Digital certificate problem")
            .with_detail(detail)
            .with_suggestion("Check the certificate's validity and configuration.")
    }

    /// A response could not be decoded.
    pub fn format(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, "MALFORMED_RESPONSE", "Unexpected response format")
            .with_detail(detail)
            .with_suggestion("Inspect the raw response; the service contract may have changed.")
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Operator-facing hint; not meant for programmatic branching.
    pub fn suggestion(&self) -> &str {
        &self.suggestion
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }
}

impl ErrorClassification for ClassifiedError {
    fn is_retryable(&self) -> bool {
        self.recoverable
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::System => ErrorSeverity::Warning,
            ErrorKind::Certificate | ErrorKind::Signature | ErrorKind::Authentication => {
                ErrorSeverity::Critical
            }
            ErrorKind::Validation | ErrorKind::Data | ErrorKind::AccessKey | ErrorKind::Format => {
                ErrorSeverity::Error
            }
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
