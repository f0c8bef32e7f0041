//! SOAP access to the tax authority's offline web services
//!
//! - [`endpoints`]: reception and authorization URLs per environment
//! - [`envelope`]: request envelopes
//! - [`parser`]: response decoding into domain records
//! - [`client`]: the gateway that ties them to the HTTP client

pub mod client;
pub mod endpoints;
pub mod envelope;
pub mod parser;

use std::sync::Arc;
use std::time::Duration;

pub use client::{ProcessError, SoapClient};
pub use endpoints::Endpoints;
use vouchergate_common::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use vouchergate_core::SubmissionOrchestrator;
use vouchergate_domain::{Config, VoucherGateError};

use crate::errors::InfraError;

/// Wire a [`SoapClient`], one shared circuit breaker and both retry policies
/// from `config` into a ready orchestrator.
///
/// Invalid retry or breaker numbers are reported as configuration errors.
pub fn build_orchestrator(config: &Config) -> Result<SubmissionOrchestrator, VoucherGateError> {
    let submission = RetryPolicy::try_from(&config.submission_retry).map_err(InfraError::from)?;
    let authorization =
        RetryPolicy::try_from(&config.authorization_retry).map_err(InfraError::from)?;
    let breaker_config =
        CircuitBreakerConfig::try_from(&config.breaker).map_err(InfraError::from)?;
    let breaker = CircuitBreaker::new(breaker_config).map_err(InfraError::from)?;

    let client = SoapClient::from_config(config)?;
    tracing::debug!(
        reception = %client.endpoints().reception,
        authorization = %client.endpoints().authorization,
        "orchestrator configured"
    );

    Ok(SubmissionOrchestrator::new(Arc::new(client), Arc::new(breaker))
        .with_policies(submission, authorization)
        .with_settle_delay(Duration::from_millis(config.soap.settle_delay_ms)))
}
