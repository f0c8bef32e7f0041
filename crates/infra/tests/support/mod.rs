//! Shared SOAP doubles for infra integration tests

#![allow(dead_code)]

use vouchergate_domain::AccessKey;
use vouchergate_infra::Endpoints;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCESS_KEY: &str = "2306202401179214673900110010010000000011234567816";

pub fn access_key() -> AccessKey {
    ACCESS_KEY.parse().expect("valid access key")
}

pub fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints::with_base(&server.uri())
}

fn reception_path(server: &MockServer) -> String {
    path_of(&endpoints(server).reception, server)
}

fn authorization_path(server: &MockServer) -> String {
    path_of(&endpoints(server).authorization, server)
}

fn path_of(url: &str, server: &MockServer) -> String {
    url.trim_start_matches(&server.uri()).to_string()
}

pub fn reception_body(status: &str, messages: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion">
      <RespuestaRecepcionComprobante>
        <estado>{status}</estado>
        <comprobantes>
          <comprobante>
            <claveAcceso>{ACCESS_KEY}</claveAcceso>
            <mensajes>{messages}</mensajes>
          </comprobante>
        </comprobantes>
      </RespuestaRecepcionComprobante>
    </ns2:validarComprobanteResponse>
  </soap:Body>
</soap:Envelope>"#
    )
}

pub fn authorization_body(status: Option<&str>) -> String {
    let (count, authorizations) = match status {
        Some(status) => (
            1,
            format!(
                r#"<autorizacion>
            <estado>{status}</estado>
            <numeroAutorizacion>{ACCESS_KEY}</numeroAutorizacion>
            <fechaAutorizacion>2024-06-23T10:15:00-05:00</fechaAutorizacion>
            <ambiente>PRUEBAS</ambiente>
            <comprobante><![CDATA[<factura id="comprobante"/>]]></comprobante>
            <mensajes/>
          </autorizacion>"#
            ),
        ),
        None => (0, String::new()),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:autorizacionComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.autorizacion">
      <RespuestaAutorizacionComprobante>
        <claveAccesoConsultada>{ACCESS_KEY}</claveAccesoConsultada>
        <numeroComprobantes>{count}</numeroComprobantes>
        <autorizaciones>{authorizations}</autorizaciones>
      </RespuestaAutorizacionComprobante>
    </ns2:autorizacionComprobanteResponse>
  </soap:Body>
</soap:Envelope>"#
    )
}

pub fn returned_message() -> &'static str {
    r#"<mensaje>
              <identificador>43</identificador>
              <mensaje>CLAVE ACCESO REGISTRADA</mensaje>
              <tipo>ERROR</tipo>
            </mensaje>"#
}

/// Answer the next `times` reception calls with `response`.
pub async fn on_reception(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path(reception_path(server)))
        .respond_with(response)
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// Answer the next `times` authorization calls with `response`.
pub async fn on_authorization(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path(authorization_path(server)))
        .respond_with(response)
        .up_to_n_times(times)
        .mount(server)
        .await;
}

pub fn soap_ok(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body)
}

pub async fn calls_to(server: &MockServer, url: &str) -> usize {
    let wanted = path_of(url, server);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == wanted)
        .count()
}
