//! Submit-then-authorize workflow
//!
//! Both stages go through one [`RetryExecutor`] and one long-lived
//! [`CircuitBreaker`] shared by every call to [`SubmissionOrchestrator::process`],
//! so a remote that is down fails fast instead of draining each retry budget.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vouchergate_common::resilience::{
    CircuitBreaker, Clock, RetryExecutor, RetryOutcome, RetryPolicy, StopReason, SystemClock,
};
use vouchergate_domain::{AccessKey, Authorization, SubmissionResponse, DEFAULT_SETTLE_DELAY_MS};

use super::error::SubmissionError;
use super::ports::VoucherGateway;

/// Default wait between reception and the first authorization query
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(DEFAULT_SETTLE_DELAY_MS);

/// Workflow stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submission,
    Authorization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submission => f.write_str("submission"),
            Self::Authorization => f.write_str("authorization"),
        }
    }
}

/// How a voucher's processing ended
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// The authority authorized the voucher
    Authorized(Authorization),
    /// The authority reached a final decision against the voucher
    NotAuthorized(Authorization),
    /// A stage stopped without a usable result
    Failed {
        stage: Stage,
        reason: StopReason,
        /// Last error seen; `None` when cancelled before any attempt failed
        error: Option<SubmissionError>,
    },
}

/// Everything known about one `process` call
#[derive(Debug)]
pub struct ProcessingReport {
    pub id: Uuid,
    pub access_key: AccessKey,
    pub outcome: ProcessingOutcome,
    /// Reception response, when the submission stage succeeded
    pub submission_response: Option<SubmissionResponse>,
    pub submission: RetryOutcome<(), SubmissionError>,
    /// Absent when the workflow stopped before polling
    pub authorization: Option<RetryOutcome<(), SubmissionError>>,
}

impl ProcessingReport {
    pub fn is_authorized(&self) -> bool {
        matches!(self.outcome, ProcessingOutcome::Authorized(_))
    }

    /// The terminal authorization record, authorized or not.
    pub fn authorization_record(&self) -> Option<&Authorization> {
        match &self.outcome {
            ProcessingOutcome::Authorized(a) | ProcessingOutcome::NotAuthorized(a) => Some(a),
            ProcessingOutcome::Failed { .. } => None,
        }
    }

    /// Errors from both stages, oldest first.
    pub fn errors(&self) -> impl Iterator<Item = &SubmissionError> {
        self.submission
            .errors
            .iter()
            .chain(self.authorization.iter().flat_map(|outcome| outcome.errors.iter()))
    }
}

/// Composes the gateway with retries and a shared circuit breaker.
pub struct SubmissionOrchestrator<C: Clock = SystemClock> {
    gateway: Arc<dyn VoucherGateway>,
    breaker: Arc<CircuitBreaker<C>>,
    executor: RetryExecutor,
    submission_policy: RetryPolicy,
    authorization_policy: RetryPolicy,
    settle_delay: Duration,
}

impl<C: Clock> fmt::Debug for SubmissionOrchestrator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionOrchestrator")
            .field("breaker", &self.breaker)
            .field("submission_policy", &self.submission_policy)
            .field("authorization_policy", &self.authorization_policy)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> SubmissionOrchestrator<C> {
    /// Orchestrator with the standard submission policy, the authorization
    /// polling policy and the default settle delay.
    pub fn new(gateway: Arc<dyn VoucherGateway>, breaker: Arc<CircuitBreaker<C>>) -> Self {
        Self {
            gateway,
            breaker,
            executor: RetryExecutor::new(),
            submission_policy: RetryPolicy::standard(),
            authorization_policy: RetryPolicy::authorization_polling(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_policies(mut self, submission: RetryPolicy, authorization: RetryPolicy) -> Self {
        self.submission_policy = submission;
        self.authorization_policy = authorization;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Replace the executor, e.g. with a seeded one for reproducible jitter.
    pub fn with_executor(mut self, executor: RetryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<C>> {
        &self.breaker
    }

    /// Submit `signed_xml`, wait for the remote to settle, then poll until the
    /// voucher has a terminal authorization.
    #[instrument(skip_all, fields(access_key = %access_key))]
    pub async fn process(
        &self,
        signed_xml: &str,
        access_key: &AccessKey,
        cancel: &CancellationToken,
    ) -> ProcessingReport {
        let id = Uuid::now_v7();
        info!(%id, "Processing voucher");

        let (response, submission) = self.submit(signed_xml, cancel).await.split_value();
        let Some(response) = response else {
            warn!(%id, attempts = submission.attempts, "Submission stage failed");
            return ProcessingReport {
                id,
                access_key: access_key.clone(),
                outcome: failure(Stage::Submission, &submission),
                submission_response: None,
                submission,
                authorization: None,
            };
        };
        debug!(%id, attempts = submission.attempts, "Voucher received");

        let settled = tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(self.settle_delay) => true,
        };
        if !settled {
            info!(%id, "Cancelled while waiting for the remote to settle");
            return ProcessingReport {
                id,
                access_key: access_key.clone(),
                outcome: ProcessingOutcome::Failed {
                    stage: Stage::Authorization,
                    reason: StopReason::Cancelled,
                    error: None,
                },
                submission_response: Some(response),
                submission,
                authorization: None,
            };
        }

        let (authorization, polling) =
            self.poll_authorization(access_key, cancel).await.split_value();
        let outcome = match authorization {
            Some(record) if record.is_authorized() => {
                info!(%id, number = ?record.authorization_number, "Voucher authorized");
                ProcessingOutcome::Authorized(record)
            }
            Some(record) => {
                warn!(%id, status = %record.status, "Voucher not authorized");
                ProcessingOutcome::NotAuthorized(record)
            }
            None => {
                warn!(%id, attempts = polling.attempts, "Authorization stage failed");
                failure(Stage::Authorization, &polling)
            }
        };

        ProcessingReport {
            id,
            access_key: access_key.clone(),
            outcome,
            submission_response: Some(response),
            submission,
            authorization: Some(polling),
        }
    }

    async fn submit(
        &self,
        signed_xml: &str,
        cancel: &CancellationToken,
    ) -> RetryOutcome<SubmissionResponse, SubmissionError> {
        let gateway = self.gateway.as_ref();
        let breaker = self.breaker.as_ref();

        self.executor
            .execute_with_retry(&self.submission_policy, cancel, move |_attempt| async move {
                // A returned voucher is a business answer, so the breaker sees a success.
                match breaker.execute(|| gateway.submit(signed_xml)).await {
                    Ok(response) if response.is_received() => Ok(response),
                    Ok(response) => Err(SubmissionError::NotReceived {
                        messages: response.messages(),
                        status: response.status,
                    }),
                    Err(err) => Err(SubmissionError::from(err)),
                }
            })
            .await
    }

    async fn poll_authorization(
        &self,
        access_key: &AccessKey,
        cancel: &CancellationToken,
    ) -> RetryOutcome<Authorization, SubmissionError> {
        let gateway = self.gateway.as_ref();
        let breaker = self.breaker.as_ref();

        self.executor
            .execute_with_retry(&self.authorization_policy, cancel, move |_attempt| async move {
                let response = match breaker.execute(|| gateway.query_authorization(access_key)).await
                {
                    Ok(response) => response,
                    Err(err) => return Err(SubmissionError::from(err)),
                };
                match response.terminal() {
                    Some(record) => Ok(record.clone()),
                    None => Err(SubmissionError::Pending {
                        status: response
                            .authorizations
                            .first()
                            .map(|a| a.status.clone())
                            .unwrap_or_else(|| "NO AUTHORIZATIONS".to_string()),
                    }),
                }
            })
            .await
    }
}

fn failure(stage: Stage, outcome: &RetryOutcome<(), SubmissionError>) -> ProcessingOutcome {
    ProcessingOutcome::Failed {
        stage,
        reason: outcome.stop_reason.unwrap_or(StopReason::Exhausted),
        error: outcome.last_error().cloned(),
    }
}
