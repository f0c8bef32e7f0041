//! # VoucherGate Core
//!
//! Protocol knowledge without I/O.
//!
//! This crate contains:
//! - The error taxonomy for tax authority failures and its classifier
//! - The `VoucherGateway` port implemented by transport adapters
//! - The submit-then-authorize orchestration
//!
//! ## Architecture Principles
//! - Only depends on `vouchergate-common` and `vouchergate-domain`
//! - No HTTP or XML code
//! - All remote access via the gateway trait

pub mod classification;
pub mod submission;

pub use classification::{
    is_recoverable, suggestion, ClassifiedError, ErrorClassifier, ErrorKind, RegistryEntry,
};
pub use submission::{
    ProcessingOutcome, ProcessingReport, Stage, SubmissionError, SubmissionOrchestrator,
    VoucherGateway, DEFAULT_SETTLE_DELAY,
};
