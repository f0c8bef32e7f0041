//! Error classification shared by the resilience primitives
//!
//! The circuit breaker and the retry executor are generic over the error type
//! of the operation they wrap. They never inspect concrete error variants;
//! instead they ask the error to classify itself through
//! [`ErrorClassification`]. Protocol layers implement the trait for their own
//! error types.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use vouchergate_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Unavailable,
//!     Rejected,
//! }
//!
//! impl ErrorClassification for FetchError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, Self::Unavailable)
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         match self {
//!             Self::Unavailable => ErrorSeverity::Warning,
//!             Self::Rejected => ErrorSeverity::Error,
//!         }
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         None
//!     }
//! }
//!
//! assert!(FetchError::Unavailable.is_retryable());
//! assert!(!FetchError::Rejected.is_critical());
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Standard interface for classifying errors by their characteristics
///
/// Only `is_retryable` and `severity` are required; the remaining methods have
/// defaults derived from them.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient conditions that may succeed if attempted
    /// again, such as timeouts, dropped connections or a remote service that
    /// reports itself temporarily unavailable.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging decisions and operator output.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Whether this error is a circuit breaker rejection rather than a failure
    /// of the wrapped operation.
    ///
    /// Retrying a breaker rejection does not reach the remote side at all, so
    /// the retry executor stops as soon as it sees one.
    fn is_circuit_open(&self) -> bool {
        false
    }
}

impl<T: ErrorClassification + ?Sized> ErrorClassification for Box<T> {
    fn is_retryable(&self) -> bool {
        (**self).is_retryable()
    }

    fn severity(&self) -> ErrorSeverity {
        (**self).severity()
    }

    fn is_critical(&self) -> bool {
        (**self).is_critical()
    }

    fn retry_after(&self) -> Option<Duration> {
        (**self).retry_after()
    }

    fn is_circuit_open(&self) -> bool {
        (**self).is_circuit_open()
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
