//! Gateway port for the tax authority's reception and authorization services

use async_trait::async_trait;
use vouchergate_domain::{AccessKey, AuthorizationResponse, SubmissionResponse};

use crate::classification::ClassifiedError;

/// One remote round trip per call; no retries or breaker logic.
///
/// Implementations classify every failure before returning it.
#[async_trait]
pub trait VoucherGateway: Send + Sync {
    /// Submit a signed voucher document for reception
    async fn submit(&self, signed_xml: &str) -> Result<SubmissionResponse, ClassifiedError>;

    /// Query the authorization state of a previously received voucher
    async fn query_authorization(
        &self,
        access_key: &AccessKey,
    ) -> Result<AuthorizationResponse, ClassifiedError>;
}
