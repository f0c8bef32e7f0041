//! SOAP client for the reception and authorization web services

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use vouchergate_common::error::ErrorClassification;
use vouchergate_core::{ClassifiedError, VoucherGateway, DEFAULT_SETTLE_DELAY};
use vouchergate_domain::{
    AccessKey, Authorization, AuthorizationResponse, Config, Environment, Message,
    SubmissionResponse, VoucherGateError,
};

use super::endpoints::Endpoints;
use super::envelope::{authorization_envelope, reception_envelope};
use super::parser::{parse_authorization_response, parse_submission_response};
use crate::http::HttpClient;

const DEFAULT_POLL_ATTEMPTS: u32 = 5;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Why [`SoapClient::process_full`] did not return an authorization
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("voucher not received: {status}")]
    NotReceived { status: String, messages: Vec<Message> },

    /// The authority's final answer was negative
    #[error("voucher not authorized: {}", .authorization.status)]
    NotAuthorized { authorization: Box<Authorization> },

    #[error("no final authorization after {attempts} queries")]
    PollingExhausted { attempts: u32 },

    #[error(transparent)]
    Remote(#[from] ClassifiedError),

    #[error("processing cancelled")]
    Cancelled,
}

/// Client for the tax authority's offline reception and authorization services.
///
/// Each call is one round trip. [`SoapClient::process_full`] is a plain
/// submit-and-poll helper; resilient processing goes through the core
/// orchestrator, which uses this client as its gateway.
#[derive(Clone)]
pub struct SoapClient {
    http: HttpClient,
    endpoints: Endpoints,
    settle_delay: Duration,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl SoapClient {
    /// Client for the official endpoints of `environment`.
    pub fn new(environment: Environment) -> Result<Self, VoucherGateError> {
        Ok(Self::with_http(HttpClient::new()?, Endpoints::for_environment(environment)))
    }

    pub fn with_http(http: HttpClient, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints,
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Client built from the SOAP section of `config`.
    pub fn from_config(config: &Config) -> Result<Self, VoucherGateError> {
        let soap = &config.soap;
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(soap.timeout_secs))
            .user_agent(soap.user_agent.clone())
            .build()?;
        Ok(Self::with_http(http, Endpoints::from_settings(config.environment, soap))
            .with_settle_delay(Duration::from_millis(soap.settle_delay_ms))
            .with_polling(soap.poll_attempts, Duration::from_millis(soap.poll_interval_ms)))
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Authorization queries made by `process_full`, and the pause between them.
    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Send a signed voucher to the reception service.
    #[instrument(skip_all, fields(url = %self.endpoints.reception))]
    pub async fn submit_voucher(&self, signed_xml: &str) -> Result<SubmissionResponse, ClassifiedError> {
        if signed_xml.trim().is_empty() {
            return Err(ClassifiedError::validation("xml", "signed voucher is empty"));
        }
        let body = self
            .http
            .post_soap(&self.endpoints.reception, reception_envelope(signed_xml.as_bytes()))
            .await?;
        let response = parse_submission_response(&body)?;
        debug!(status = %response.status, receipts = response.receipts.len(), "reception answered");
        Ok(response)
    }

    /// Ask the authorization service about one access key.
    #[instrument(skip_all, fields(access_key = %access_key))]
    pub async fn authorization_status(
        &self,
        access_key: &AccessKey,
    ) -> Result<AuthorizationResponse, ClassifiedError> {
        let body = self
            .http
            .post_soap(&self.endpoints.authorization, authorization_envelope(access_key.as_str()))
            .await?;
        let response = parse_authorization_response(&body)?;
        debug!(
            count = response.voucher_count,
            authorizations = response.authorizations.len(),
            "authorization answered"
        );
        Ok(response)
    }

    /// Submit, wait for the remote to settle, then poll a fixed number of
    /// times for a final authorization.
    ///
    /// Recoverable query failures are retried within the poll budget; a
    /// non-recoverable one ends the loop at once.
    #[instrument(skip_all, fields(access_key = %access_key))]
    pub async fn process_full(
        &self,
        signed_xml: &str,
        access_key: &AccessKey,
        cancel: &CancellationToken,
    ) -> Result<Authorization, ProcessError> {
        let reception = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProcessError::Cancelled),
            result = self.submit_voucher(signed_xml) => result?,
        };
        if !reception.is_received() {
            warn!(status = %reception.status, "voucher not received");
            return Err(ProcessError::NotReceived {
                messages: reception.messages(),
                status: reception.status,
            });
        }
        info!("voucher received, waiting for authorization");

        sleep_or_cancel(self.settle_delay, cancel).await?;

        for attempt in 1..=self.poll_attempts {
            debug!(attempt, max = self.poll_attempts, "querying authorization");
            let queried = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ProcessError::Cancelled),
                result = self.authorization_status(access_key) => result,
            };

            match queried {
                Ok(response) => match response.terminal() {
                    Some(authorization) if authorization.is_authorized() => {
                        info!(attempt, "voucher authorized");
                        return Ok(authorization.clone());
                    }
                    Some(authorization) => {
                        warn!(status = %authorization.status, "voucher not authorized");
                        return Err(ProcessError::NotAuthorized {
                            authorization: Box::new(authorization.clone()),
                        });
                    }
                    None => debug!(attempt, "authorization still pending"),
                },
                Err(err) if !err.is_retryable() || attempt == self.poll_attempts => {
                    return Err(err.into());
                }
                Err(err) => warn!(attempt, error = %err, "authorization query failed"),
            }

            if attempt < self.poll_attempts {
                sleep_or_cancel(self.poll_interval, cancel).await?;
            }
        }

        Err(ProcessError::PollingExhausted { attempts: self.poll_attempts })
    }
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), ProcessError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ProcessError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[async_trait]
impl VoucherGateway for SoapClient {
    async fn submit(&self, signed_xml: &str) -> Result<SubmissionResponse, ClassifiedError> {
        self.submit_voucher(signed_xml).await
    }

    async fn query_authorization(
        &self,
        access_key: &AccessKey,
    ) -> Result<AuthorizationResponse, ClassifiedError> {
        self.authorization_status(access_key).await
    }
}

#[cfg(test)]
mod tests {
    use vouchergate_core::ErrorKind;
    use vouchergate_domain::SoapSettings;

    use super::*;

    #[tokio::test]
    async fn empty_voucher_is_rejected_before_any_request() {
        let client = SoapClient::with_http(
            HttpClient::new().expect("http client"),
            Endpoints::with_base("http://127.0.0.1:9"),
        );

        let err = client.submit_voucher("   ").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), "VALIDATION_XML");
    }

    #[test]
    fn from_config_applies_overrides() {
        let mut config = Config::default();
        config.environment = Environment::Production;
        config.soap.authorization_url = Some("http://localhost:1/auth".into());
        config.soap.poll_attempts = 0;

        let client = SoapClient::from_config(&config).expect("client");

        assert!(client.endpoints().reception.starts_with("https://cel.sri.gob.ec/"));
        assert_eq!(client.endpoints().authorization, "http://localhost:1/auth");
        assert_eq!(client.poll_attempts, 1);
        assert_eq!(client.settle_delay, Duration::from_millis(5_000));
    }

    #[test]
    fn settle_delay_default_matches_config_default() {
        let configured = Duration::from_millis(SoapSettings::default().settle_delay_ms);
        let client = SoapClient::with_http(
            HttpClient::new().expect("http client"),
            Endpoints::for_environment(Environment::Test),
        );

        assert_eq!(client.settle_delay, configured);
        assert_eq!(DEFAULT_SETTLE_DELAY, configured);
    }

    #[test]
    fn process_errors_render_for_operators() {
        let err = ProcessError::NotAuthorized {
            authorization: Box::new(Authorization {
                status: "NO AUTORIZADO".into(),
                ..Authorization::default()
            }),
        };
        assert_eq!(err.to_string(), "voucher not authorized: NO AUTORIZADO");
        assert_eq!(
            ProcessError::PollingExhausted { attempts: 5 }.to_string(),
            "no final authorization after 5 queries"
        );
    }
}
