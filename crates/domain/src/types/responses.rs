//! Records decoded from the tax authority's SOAP responses
//!
//! These are transient values built per call by the SOAP parser and handed to
//! callers. Status fields keep the raw remote spelling; the typed views
//! ([`ReceptionStatus`], [`AuthorizationStatus`]) are derived on demand.

use serde::{Deserialize, Serialize};

/// Reception status for a voucher that was accepted for processing.
pub const STATUS_RECEIVED: &str = "RECIBIDA";
/// Reception status for a voucher rejected at submission time.
pub const STATUS_RETURNED: &str = "DEVUELTA";
pub const STATUS_AUTHORIZED: &str = "AUTORIZADO";
pub const STATUS_NOT_AUTHORIZED: &str = "NO AUTORIZADO";
pub const STATUS_IN_PROCESS: &str = "EN PROCESO";

/// Outcome of the reception (submission) operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceptionStatus {
    Received,
    Returned,
    Other(String),
}

impl ReceptionStatus {
    pub fn from_remote(raw: &str) -> Self {
        match normalize_status(raw).as_str() {
            STATUS_RECEIVED => Self::Received,
            STATUS_RETURNED => Self::Returned,
            _ => Self::Other(raw.trim().to_string()),
        }
    }
}

/// Processing state of a single authorization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Authorized,
    NotAuthorized,
    InProcess,
    Other(String),
}

impl AuthorizationStatus {
    /// Both `NO AUTORIZADO` and `NO_AUTORIZADO` are seen on the wire.
    pub fn from_remote(raw: &str) -> Self {
        match normalize_status(raw).as_str() {
            STATUS_AUTHORIZED => Self::Authorized,
            STATUS_NOT_AUTHORIZED => Self::NotAuthorized,
            STATUS_IN_PROCESS => Self::InProcess,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Authorized and not-authorized end processing; anything else may still change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authorized | Self::NotAuthorized)
    }
}

fn normalize_status(raw: &str) -> String {
    raw.trim().replace('_', " ").to_uppercase()
}

/// A remote diagnostic attached to a receipt or authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub identifier: String,
    pub message: String,
    pub additional_info: Option<String>,
    /// `ERROR`, `ADVERTENCIA` or `INFORMATIVO`
    pub kind: String,
}

impl Message {
    pub fn is_error(&self) -> bool {
        self.kind.trim().eq_ignore_ascii_case("ERROR")
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.identifier, self.message)?;
        if let Some(info) = self.additional_info.as_deref().filter(|s| !s.is_empty()) {
            write!(f, " ({info})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherReceipt {
    pub access_key: String,
    pub messages: Vec<Message>,
}

/// Response to `validarComprobante`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub status: String,
    pub receipts: Vec<VoucherReceipt>,
}

impl SubmissionResponse {
    pub fn reception_status(&self) -> ReceptionStatus {
        ReceptionStatus::from_remote(&self.status)
    }

    pub fn is_received(&self) -> bool {
        self.reception_status() == ReceptionStatus::Received
    }

    /// All messages across every receipt, in document order.
    pub fn messages(&self) -> Vec<Message> {
        self.receipts.iter().flat_map(|r| r.messages.iter().cloned()).collect()
    }
}

/// One authorization record from `autorizacionComprobante`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub status: String,
    pub authorization_number: Option<String>,
    pub authorization_date: Option<String>,
    pub environment: Option<String>,
    /// The signed voucher as returned by the authority (text or CDATA).
    pub voucher: Option<String>,
    pub messages: Vec<Message>,
}

impl Authorization {
    pub fn status_kind(&self) -> AuthorizationStatus {
        AuthorizationStatus::from_remote(&self.status)
    }

    pub fn is_authorized(&self) -> bool {
        self.status_kind() == AuthorizationStatus::Authorized
    }

    pub fn is_terminal(&self) -> bool {
        self.status_kind().is_terminal()
    }
}

/// Response to `autorizacionComprobante`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub access_key: String,
    pub voucher_count: u32,
    pub authorizations: Vec<Authorization>,
}

impl AuthorizationResponse {
    /// First authorization carrying a terminal status, if any.
    pub fn terminal(&self) -> Option<&Authorization> {
        self.authorizations.iter().find(|a| a.is_terminal())
    }
}
