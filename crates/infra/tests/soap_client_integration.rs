//! Integration tests for the SOAP client
//!
//! Runs `SoapClient` against wiremock doubles of the reception and
//! authorization services.

mod support;

use std::time::Duration;

use support::{
    access_key, authorization_body, calls_to, endpoints, on_authorization, on_reception,
    reception_body, returned_message, soap_ok, ACCESS_KEY,
};
use tokio_util::sync::CancellationToken;
use vouchergate_core::{ErrorKind, VoucherGateway};
use vouchergate_infra::{HttpClient, ProcessError, SoapClient};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> SoapClient {
    let http = HttpClient::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .expect("http client");
    SoapClient::with_http(http, endpoints(server))
        .with_settle_delay(Duration::from_millis(10))
        .with_polling(3, Duration::from_millis(10))
}

#[tokio::test]
async fn test_submit_sends_base64_voucher_and_parses_receipt() {
    let server = MockServer::start().await;
    // base64 of "<factura/>"
    Mock::given(method("POST"))
        .and(body_string_contains("<xml>PGZhY3R1cmEvPg==</xml>"))
        .respond_with(soap_ok(reception_body("RECIBIDA", "")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server).submit_voucher("<factura/>").await.expect("reception");

    assert!(response.is_received());
    assert_eq!(response.receipts.len(), 1);
    assert_eq!(response.receipts[0].access_key, ACCESS_KEY);
}

#[tokio::test]
async fn test_query_sends_access_key_and_parses_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains(format!(
            "<claveAccesoComprobante>{ACCESS_KEY}</claveAccesoComprobante>"
        )))
        .respond_with(soap_ok(authorization_body(Some("AUTORIZADO"))))
        .expect(1)
        .mount(&server)
        .await;

    let gateway: &dyn VoucherGateway = &client(&server);
    let response = gateway.query_authorization(&access_key()).await.expect("authorization");

    assert_eq!(response.access_key, ACCESS_KEY);
    assert_eq!(response.voucher_count, 1);
    let authorization = response.terminal().expect("terminal authorization");
    assert!(authorization.is_authorized());
    assert_eq!(authorization.voucher.as_deref(), Some(r#"<factura id="comprobante"/>"#));
}

#[tokio::test]
async fn test_fault_in_success_response_is_classified() {
    let server = MockServer::start().await;
    let fault = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
      <soap:Body><soap:Fault>
        <faultcode>soap:Server</faultcode>
        <faultstring>ESTRUCTURA-01</faultstring>
      </soap:Fault></soap:Body></soap:Envelope>"#;
    on_reception(&server, soap_ok(fault.to_string()), 1).await;

    let err = client(&server).submit_voucher("<factura/>").await.unwrap_err();

    assert_eq!(err.code(), "ESTRUCTURA-01");
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(!err.is_recoverable());
}

/// Validates the plain submit-and-poll helper end to end.
///
/// # Test Steps
/// 1. Reception answers RECIBIDA
/// 2. The first authorization query has no authorization yet
/// 3. The second query returns AUTORIZADO
#[tokio::test]
async fn test_process_full_polls_until_authorized() {
    let server = MockServer::start().await;
    on_reception(&server, soap_ok(reception_body("RECIBIDA", "")), 1).await;
    on_authorization(&server, soap_ok(authorization_body(None)), 1).await;
    on_authorization(&server, soap_ok(authorization_body(Some("AUTORIZADO"))), 1).await;
    let client = client(&server);

    let authorization = client
        .process_full("<factura/>", &access_key(), &CancellationToken::new())
        .await
        .expect("authorized");

    assert!(authorization.is_authorized());
    assert_eq!(authorization.authorization_number.as_deref(), Some(ACCESS_KEY));
    assert_eq!(calls_to(&server, &client.endpoints().authorization).await, 2);
}

#[tokio::test]
async fn test_process_full_reports_returned_voucher() {
    let server = MockServer::start().await;
    on_reception(&server, soap_ok(reception_body("DEVUELTA", returned_message())), 1).await;
    let client = client(&server);

    let err = client
        .process_full("<factura/>", &access_key(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ProcessError::NotReceived { status, messages } => {
            assert_eq!(status, "DEVUELTA");
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].identifier, "43");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(calls_to(&server, &client.endpoints().authorization).await, 0);
}

#[tokio::test]
async fn test_process_full_reports_rejection() {
    let server = MockServer::start().await;
    on_reception(&server, soap_ok(reception_body("RECIBIDA", "")), 1).await;
    on_authorization(&server, soap_ok(authorization_body(Some("NO AUTORIZADO"))), 1).await;

    let err = client(&server)
        .process_full("<factura/>", &access_key(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, ProcessError::NotAuthorized { ref authorization } if authorization.status == "NO AUTORIZADO")
    );
}

#[tokio::test]
async fn test_process_full_retries_transient_query_failures() {
    let server = MockServer::start().await;
    on_reception(&server, soap_ok(reception_body("RECIBIDA", "")), 1).await;
    on_authorization(&server, ResponseTemplate::new(503), 1).await;
    on_authorization(&server, soap_ok(authorization_body(Some("AUTORIZADO"))), 1).await;

    let authorization = client(&server)
        .process_full("<factura/>", &access_key(), &CancellationToken::new())
        .await
        .expect("authorized after a transient failure");

    assert!(authorization.is_authorized());
}

#[tokio::test]
async fn test_process_full_exhausts_polling() {
    let server = MockServer::start().await;
    on_reception(&server, soap_ok(reception_body("RECIBIDA", "")), 1).await;
    on_authorization(&server, soap_ok(authorization_body(None)), 10).await;
    let client = client(&server);

    let err = client
        .process_full("<factura/>", &access_key(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::PollingExhausted { attempts: 3 }));
    assert_eq!(calls_to(&server, &client.endpoints().authorization).await, 3);
}

#[tokio::test]
async fn test_process_full_stops_when_cancelled() {
    let server = MockServer::start().await;
    on_reception(&server, soap_ok(reception_body("RECIBIDA", "")), 1).await;
    let client = client(&server).with_settle_delay(Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let err = client.process_full("<factura/>", &access_key(), &cancel).await.unwrap_err();
    canceller.await.expect("canceller task");

    assert!(matches!(err, ProcessError::Cancelled));
    assert_eq!(calls_to(&server, &client.endpoints().authorization).await, 0);
}
