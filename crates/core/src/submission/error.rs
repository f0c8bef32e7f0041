use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use vouchergate_common::error::{ErrorClassification, ErrorSeverity};
use vouchergate_common::ResilienceError;
use vouchergate_domain::Message;

use crate::classification::ClassifiedError;

/// Why one attempt of a submission stage did not produce a usable result
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubmissionError {
    /// The remote call failed
    #[error(transparent)]
    Remote(ClassifiedError),

    /// The shared circuit breaker rejected the call without contacting the remote
    #[error("circuit breaker open (retry in {remaining:?})")]
    CircuitOpen { remaining: Duration },

    /// The remote answered but did not accept the voucher
    #[error("voucher not received: {status}")]
    NotReceived { status: String, messages: Vec<Message> },

    /// The voucher has no terminal authorization yet
    #[error("authorization pending: {status}")]
    Pending { status: String },
}

impl SubmissionError {
    /// The classified remote failure, if the remote was reached and failed.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ClassifiedError> for SubmissionError {
    fn from(err: ClassifiedError) -> Self {
        Self::Remote(err)
    }
}

impl From<ResilienceError<ClassifiedError>> for SubmissionError {
    fn from(err: ResilienceError<ClassifiedError>) -> Self {
        match err {
            ResilienceError::CircuitOpen { remaining } => Self::CircuitOpen { remaining },
            ResilienceError::OperationFailed { source } => Self::Remote(source),
        }
    }
}

impl ErrorClassification for SubmissionError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(err) => err.is_retryable(),
            Self::CircuitOpen { .. } | Self::NotReceived { .. } => false,
            Self::Pending { .. } => true,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Remote(err) => err.severity(),
            Self::CircuitOpen { .. } => ErrorSeverity::Warning,
            Self::NotReceived { .. } => ErrorSeverity::Error,
            Self::Pending { .. } => ErrorSeverity::Info,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { remaining } => Some(*remaining),
            _ => None,
        }
    }

    fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}
