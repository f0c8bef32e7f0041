//! SOAP 1.1 request envelopes

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::escape::escape;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const RECEPTION_NS: &str = "http://ec.gob.sri.ws.recepcion";
pub const AUTHORIZATION_NS: &str = "http://ec.gob.sri.ws.autorizacion";

/// `validarComprobante` request carrying the signed document as base64.
pub fn reception_envelope(signed_xml: &[u8]) -> String {
    let payload = STANDARD.encode(signed_xml);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="{SOAP_ENVELOPE_NS}" xmlns:sri="{RECEPTION_NS}">
  <soap:Body>
    <sri:validarComprobante>
      <xml>{payload}</xml>
    </sri:validarComprobante>
  </soap:Body>
</soap:Envelope>"#
    )
}

/// `autorizacionComprobante` request for one access key.
pub fn authorization_envelope(access_key: &str) -> String {
    let key = escape(access_key);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="{SOAP_ENVELOPE_NS}" xmlns:sri="{AUTHORIZATION_NS}">
  <soap:Body>
    <sri:autorizacionComprobante>
      <claveAccesoComprobante>{key}</claveAccesoComprobante>
    </sri:autorizacionComprobante>
  </soap:Body>
</soap:Envelope>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reception_envelope_base64_encodes_the_document() {
        let envelope = reception_envelope(b"<factura id=\"comprobante\"/>");

        assert!(envelope.contains(r#"xmlns:sri="http://ec.gob.sri.ws.recepcion""#));
        assert!(envelope.contains("<sri:validarComprobante>"));
        let start = envelope.find("<xml>").unwrap() + "<xml>".len();
        let end = envelope.find("</xml>").unwrap();
        let decoded = STANDARD.decode(&envelope[start..end]).unwrap();
        assert_eq!(decoded, b"<factura id=\"comprobante\"/>");
    }

    #[test]
    fn authorization_envelope_carries_the_key() {
        let key = "2306202401179214673900110010010000000011234567816";
        let envelope = authorization_envelope(key);

        assert!(envelope.contains(r#"xmlns:sri="http://ec.gob.sri.ws.autorizacion""#));
        assert!(envelope
            .contains(&format!("<claveAccesoComprobante>{key}</claveAccesoComprobante>")));
    }

    #[test]
    fn authorization_envelope_escapes_markup() {
        let envelope = authorization_envelope("<x>");
        assert!(envelope.contains("&lt;x&gt;"));
    }
}
