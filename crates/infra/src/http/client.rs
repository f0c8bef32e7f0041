use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::debug;
use vouchergate_core::{ClassifiedError, ErrorClassifier};
use vouchergate_domain::VoucherGateError;

use crate::errors::InfraError;

/// `Content-Type` the tax authority expects on SOAP 1.1 requests.
pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// HTTP client for SOAP exchanges.
///
/// Makes exactly one round trip per call; retries and circuit breaking are
/// layered on top by the caller. Every failure comes back classified.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    classifier: ErrorClassifier,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, VoucherGateError> {
        Self::builder().build()
    }

    /// POST a SOAP envelope and return the response body.
    ///
    /// Any status other than 200 is classified from the body text and the
    /// status code.
    pub async fn post_soap(&self, url: &str, envelope: String) -> Result<String, ClassifiedError> {
        debug!(%url, bytes = envelope.len(), "sending SOAP request");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header("SOAPAction", HeaderValue::from_static(""))
            .body(envelope)
            .send()
            .await
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| self.transport_error(&err))?;
        debug!(%url, %status, bytes = body.len(), "received SOAP response");

        if status != StatusCode::OK {
            return Err(self.classifier.classify(&body, Some(status.as_u16())));
        }
        Ok(body)
    }

    fn transport_error(&self, err: &reqwest::Error) -> ClassifiedError {
        classify_transport_error(&self.classifier, err)
    }
}

/// Map a reqwest failure onto the classified taxonomy.
pub fn classify_transport_error(
    classifier: &ErrorClassifier,
    err: &reqwest::Error,
) -> ClassifiedError {
    if err.is_timeout() {
        return ClassifiedError::timeout(err.to_string());
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return ClassifiedError::connection_failure(err.to_string());
        }
    }
    if err.is_request() {
        return ClassifiedError::connection_failure(err.to_string());
    }
    classifier.classify(&err.to_string(), err.status().map(|s| s.as_u16()))
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, VoucherGateError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            VoucherGateError::from(infra)
        })?;

        Ok(HttpClient { client, classifier: ErrorClassifier::new() })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use vouchergate_core::ErrorKind;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client() -> HttpClient {
        HttpClient::builder()
            .timeout(Duration::from_millis(500))
            .user_agent("vouchergate-tests")
            .build()
            .expect("http client")
    }

    #[tokio::test]
    async fn returns_body_on_success_with_soap_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", SOAP_CONTENT_TYPE))
            .and(header("user-agent", "vouchergate-tests"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ok/>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = client().post_soap(&server.uri(), "<env/>".into()).await.expect("body");

        assert_eq!(body, "<ok/>");
        let requests = server.received_requests().await.unwrap();
        let action = requests[0].headers.get("soapaction").map(|v| v.as_bytes().to_vec());
        assert_eq!(action, Some(Vec::new()));
    }

    #[tokio::test]
    async fn classifies_server_errors_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client().post_soap(&server.uri(), "<env/>".into()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::System);
        assert_eq!(err.http_status(), Some(503));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn registry_code_in_error_body_wins_over_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string("<faultstring>CLAVE-01</faultstring>"),
            )
            .mount(&server)
            .await;

        let err = client().post_soap(&server.uri(), "<env/>".into()).await.unwrap_err();

        assert_eq!(err.code(), "CLAVE-01");
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn slow_responses_are_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = client().post_soap(&server.uri(), "<env/>".into()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn refused_connections_are_recoverable_connection_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let err = client().post_soap(&format!("http://{addr}"), "<env/>".into()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.is_recoverable());
    }
}
