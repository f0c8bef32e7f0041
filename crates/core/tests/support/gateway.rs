//! Scripted in-memory `VoucherGateway`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use vouchergate_core::{ClassifiedError, VoucherGateway};
use vouchergate_domain::{AccessKey, Authorization, AuthorizationResponse, SubmissionResponse};

pub const ACCESS_KEY: &str = "2306202401179214673900110010010000000011234567816";

/// Replays queued replies in order; once a queue is empty every call fails
/// with a recoverable connection error.
#[derive(Default)]
pub struct ScriptedGateway {
    submissions: Mutex<VecDeque<Result<SubmissionResponse, ClassifiedError>>>,
    authorizations: Mutex<VecDeque<Result<AuthorizationResponse, ClassifiedError>>>,
    submit_calls: AtomicU32,
    query_calls: AtomicU32,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_submit(self, reply: Result<SubmissionResponse, ClassifiedError>) -> Self {
        self.submissions.lock().push_back(reply);
        self
    }

    pub fn on_query(self, reply: Result<AuthorizationResponse, ClassifiedError>) -> Self {
        self.authorizations.lock().push_back(reply);
        self
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> u32 {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoucherGateway for ScriptedGateway {
    async fn submit(&self, _signed_xml: &str) -> Result<SubmissionResponse, ClassifiedError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submissions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifiedError::connection_failure("script exhausted")))
    }

    async fn query_authorization(
        &self,
        _access_key: &AccessKey,
    ) -> Result<AuthorizationResponse, ClassifiedError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.authorizations
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifiedError::connection_failure("script exhausted")))
    }
}

pub fn received() -> Result<SubmissionResponse, ClassifiedError> {
    Ok(SubmissionResponse { status: "RECIBIDA".to_string(), receipts: vec![] })
}

pub fn authorized() -> Result<AuthorizationResponse, ClassifiedError> {
    Ok(AuthorizationResponse {
        access_key: ACCESS_KEY.to_string(),
        voucher_count: 1,
        authorizations: vec![Authorization {
            status: "AUTORIZADO".to_string(),
            authorization_number: Some(ACCESS_KEY.to_string()),
            ..Authorization::default()
        }],
    })
}

pub fn access_key() -> AccessKey {
    ACCESS_KEY.parse().expect("valid access key")
}
