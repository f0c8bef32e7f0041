//! Structural decoding of SOAP responses
//!
//! The response is read into a small element tree keyed by local name, so
//! any namespace prefix the remote picks is accepted. Text and CDATA content
//! are merged, which is how the authorized voucher travels inside
//! `autorizacion/comprobante`.
//!
//! Decoding depends on these element names: `respuestaSolicitud` or
//! `RespuestaRecepcionComprobante` and `respuestaComprobante` or
//! `RespuestaAutorizacionComprobante` as roots; `estado`,
//! `comprobantes/comprobante/claveAcceso`, `mensajes/mensaje` (with
//! `identificador`, `mensaje`, `informacionAdicional` and `tipo`),
//! `claveAccesoConsultada`, `numeroComprobantes` and
//! `autorizaciones/autorizacion` (with `estado`, `numeroAutorizacion`,
//! `fechaAutorizacion`, `ambiente` and `comprobante`); and `Fault/faultstring`.

use quick_xml::events::Event;
use quick_xml::Reader;
use vouchergate_core::{ClassifiedError, ErrorClassifier};
use vouchergate_domain::{
    Authorization, AuthorizationResponse, Message, SubmissionResponse, VoucherReceipt,
};

/// Names each response element is known under, preferred first.
const RECEPTION_ROOTS: [&str; 2] = ["respuestaSolicitud", "RespuestaRecepcionComprobante"];
const AUTHORIZATION_ROOTS: [&str; 2] =
    ["respuestaComprobante", "RespuestaAutorizacionComprobante"];

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    /// Child text, with empty text treated as absent.
    fn optional_text(&self, name: &str) -> Option<String> {
        self.child_text(name).filter(|t| !t.is_empty()).map(str::to_string)
    }

    /// Elements named `item` under the child `list`, e.g. `mensajes/mensaje`.
    fn list<'a>(&'a self, list: &str, item: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.child(list)
            .into_iter()
            .flat_map(move |l| l.children.iter().filter(move |c| c.name == item))
    }

    /// Depth-first search for the first element named `name`, self included.
    fn find(&self, name: &str) -> Option<&Node> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

fn format_error(detail: impl Into<String>) -> ClassifiedError {
    ClassifiedError::format(detail)
}

fn parse_tree(body: &str) -> Result<Node, ClassifiedError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            format_error(format!("malformed XML at {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Node { name, ..Node::default() });
            }
            Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                attach(&mut stack, &mut root, Node { name, ..Node::default() });
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| format_error("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| format_error(format!("bad text: {e}")))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| format_error(format!("CDATA is not UTF-8: {e}")))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format_error("document ended inside an open element"));
    }
    root.ok_or_else(|| format_error("response contains no XML element"))
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

/// A SOAP fault in a 200 response is still a remote failure.
fn check_fault(root: &Node) -> Result<(), ClassifiedError> {
    match root.find("Fault") {
        Some(fault) => {
            let reason = fault.child_text("faultstring").unwrap_or_default();
            Err(ErrorClassifier::new().classify(reason, None))
        }
        None => Ok(()),
    }
}

fn messages(node: &Node) -> Vec<Message> {
    node.list("mensajes", "mensaje")
        .map(|m| Message {
            identifier: m.child_text("identificador").unwrap_or_default().to_string(),
            message: m.child_text("mensaje").unwrap_or_default().to_string(),
            additional_info: m.optional_text("informacionAdicional"),
            kind: m.child_text("tipo").unwrap_or_default().to_string(),
        })
        .collect()
}

/// Decode a `validarComprobante` response.
pub fn parse_submission_response(body: &str) -> Result<SubmissionResponse, ClassifiedError> {
    let root = parse_tree(body)?;
    check_fault(&root)?;

    let response = RECEPTION_ROOTS
        .iter()
        .find_map(|name| root.find(name))
        .ok_or_else(|| format_error("respuestaSolicitud element not found"))?;
    let status = response
        .child_text("estado")
        .ok_or_else(|| format_error("reception response has no estado"))?
        .to_string();

    let receipts = response
        .list("comprobantes", "comprobante")
        .map(|c| VoucherReceipt {
            access_key: c.child_text("claveAcceso").unwrap_or_default().to_string(),
            messages: messages(c),
        })
        .collect();

    Ok(SubmissionResponse { status, receipts })
}

/// Decode an `autorizacionComprobante` response.
pub fn parse_authorization_response(body: &str) -> Result<AuthorizationResponse, ClassifiedError> {
    let root = parse_tree(body)?;
    check_fault(&root)?;

    let response = AUTHORIZATION_ROOTS
        .iter()
        .find_map(|name| root.find(name))
        .ok_or_else(|| format_error("respuestaComprobante element not found"))?;

    let voucher_count = match response.child_text("numeroComprobantes") {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| format_error(format!("numeroComprobantes is not a count: {raw}")))?,
    };

    let authorizations = response
        .list("autorizaciones", "autorizacion")
        .map(|a| Authorization {
            status: a.child_text("estado").unwrap_or_default().to_string(),
            authorization_number: a.optional_text("numeroAutorizacion"),
            authorization_date: a.optional_text("fechaAutorizacion"),
            environment: a.optional_text("ambiente"),
            voucher: a.optional_text("comprobante"),
            messages: messages(a),
        })
        .collect();

    Ok(AuthorizationResponse {
        access_key: response.child_text("claveAccesoConsultada").unwrap_or_default().to_string(),
        voucher_count,
        authorizations,
    })
}
