//! # VoucherGate Infrastructure
//!
//! Implementations of the core ports that talk to the outside world.
//!
//! This crate contains:
//! - The HTTP client used for SOAP exchanges
//! - SOAP envelopes, response parsing and the reception/authorization gateway
//! - Configuration loading from the environment and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements `VoucherGateway` from `vouchergate-core`
//! - Depends on `vouchergate-common`, `vouchergate-domain` and `vouchergate-core`
//! - Contains all "impure" code (network, files, environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod soap;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::*;
pub use observability::{init_tracing, LogFormat};
pub use soap::{build_orchestrator, Endpoints, ProcessError, SoapClient};
