//! Maps raw remote failures to [`ClassifiedError`]s.
//!
//! Resolution order: known error codes and phrases from the registry, then
//! the HTTP status of the transport response, then keyword heuristics, and
//! finally an unclassified recoverable system error. Unknown failures are
//! never classified as permanent.

use std::error::Error as StdError;

use super::error::{ClassifiedError, ErrorKind};

/// One known failure the tax authority reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub code: &'static str,
    pub kind: ErrorKind,
    /// Wording the remote uses; matched case-insensitively.
    pub remote_phrase: &'static str,
    pub message: &'static str,
    pub recoverable: bool,
    pub suggestion: &'static str,
}

const fn entry(
    code: &'static str,
    kind: ErrorKind,
    remote_phrase: &'static str,
    message: &'static str,
    recoverable: bool,
    suggestion: &'static str,
) -> RegistryEntry {
    RegistryEntry { code, kind, remote_phrase, message, recoverable, suggestion }
}

// Order matters: the first match wins.
static REGISTRY: &[RegistryEntry] = &[
    entry(
        "CONEXION_TIMEOUT",
        ErrorKind::Timeout,
        "timeout conectando con sri",
        "Timed out connecting to the tax authority",
        true,
        "Retry in a few minutes; the service may be under heavy load.",
    ),
    entry(
        "SERVIDOR_NO_DISPONIBLE",
        ErrorKind::Connection,
        "servidor sri no disponible",
        "Tax authority server unavailable",
        true,
        "The service is temporarily down; retry later.",
    ),
    entry(
        "CLAVE-01",
        ErrorKind::AccessKey,
        "clave de acceso registrada",
        "Access key already registered",
        false,
        "Generate a new access key with a different sequential number.",
    ),
    entry(
        "CLAVE-02",
        ErrorKind::AccessKey,
        "clave de acceso mal formada",
        "Malformed access key",
        false,
        "Check the access key's structure and check digit.",
    ),
    entry(
        "CLAVE-03",
        ErrorKind::AccessKey,
        "fecha de emisión incorrecta",
        "Issue date in the access key is invalid",
        false,
        "Make sure the issue date is not in the future and is within the allowed range.",
    ),
    entry(
        "ESTRUCTURA-01",
        ErrorKind::Format,
        "estructura xml incorrecta",
        "Voucher XML structure is invalid",
        false,
        "Validate the XML against the published XSD schema.",
    ),
    entry(
        "ESTRUCTURA-02",
        ErrorKind::Format,
        "codificación incorrecta",
        "Invalid document encoding",
        false,
        "Encode the document as UTF-8.",
    ),
    entry(
        "RUC-01",
        ErrorKind::Data,
        "ruc no válido",
        "Invalid taxpayer identifier (RUC)",
        false,
        "Check the RUC's format and check digit.",
    ),
    entry(
        "CEDULA-01",
        ErrorKind::Data,
        "cédula no válida",
        "Invalid national identity number",
        false,
        "Check the identity number's format and check digit.",
    ),
    entry(
        "CERT-01",
        ErrorKind::Certificate,
        "certificado expirado",
        "Signing certificate has expired",
        false,
        "Renew the digital certificate with the certification authority.",
    ),
    entry(
        "CERT-02",
        ErrorKind::Certificate,
        "certificado revocado",
        "Signing certificate has been revoked",
        false,
        "Obtain a new digital certificate.",
    ),
    entry(
        "CERT-03",
        ErrorKind::Certificate,
        "cadena de certificación inválida",
        "Invalid certificate chain",
        false,
        "Check the intermediate and root certificates.",
    ),
    entry(
        "FIRMA-01",
        ErrorKind::Signature,
        "firma digital inválida",
        "Invalid digital signature",
        false,
        "Re-sign the document with a valid certificate.",
    ),
    entry(
        "FIRMA-02",
        ErrorKind::Signature,
        "algoritmo de firma no soportado",
        "Unsupported signature algorithm",
        false,
        "Sign with a supported algorithm such as RSA-SHA1.",
    ),
    entry(
        "SRI-01",
        ErrorKind::System,
        "sistema en mantenimiento",
        "Tax authority system under maintenance",
        true,
        "Retry after the maintenance window ends.",
    ),
    entry(
        "SRI-02",
        ErrorKind::System,
        "sobrecarga del sistema",
        "Tax authority system overloaded",
        true,
        "Retry in a few minutes.",
    ),
];

struct StatusRule {
    statuses: &'static [u16],
    code: &'static str,
    kind: ErrorKind,
    message: &'static str,
    suggestion: &'static str,
}

static STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        statuses: &[408, 504],
        code: "HTTP_TIMEOUT",
        kind: ErrorKind::Timeout,
        message: "HTTP request timed out",
        suggestion: "Retry later.",
    },
    StatusRule {
        statuses: &[500, 502, 503],
        code: "HTTP_SERVER_ERROR",
        kind: ErrorKind::System,
        message: "Tax authority server error",
        suggestion: "The remote is having problems; retry later.",
    },
    StatusRule {
        statuses: &[401, 403],
        code: "HTTP_AUTH_ERROR",
        kind: ErrorKind::Authentication,
        message: "Authentication rejected by the tax authority",
        suggestion: "Check credentials and permissions.",
    },
    StatusRule {
        statuses: &[400],
        code: "HTTP_BAD_REQUEST",
        kind: ErrorKind::Validation,
        message: "Malformed request",
        suggestion: "Check the request's structure.",
    },
];

struct KeywordRule {
    keywords: &'static [&'static str],
    code: &'static str,
    kind: ErrorKind,
    message: &'static str,
    suggestion: &'static str,
}

static KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["timeout", "timed out", "connection", "conexion", "conexión"],
        code: "CONNECTION_GENERAL",
        kind: ErrorKind::Connection,
        message: "Connection problem",
        suggestion: "Check network connectivity and retry.",
    },
    KeywordRule {
        keywords: &["xml", "schema", "esquema", "format", "formato"],
        code: "FORMAT_GENERAL",
        kind: ErrorKind::Format,
        message: "Document format problem",
        suggestion: "Check the document's XML format.",
    },
    KeywordRule {
        keywords: &["certificate", "certificado", "signature", "firma"],
        code: "CERTIFICATE_GENERAL",
        kind: ErrorKind::Certificate,
        message: "Certificate or signature problem",
        suggestion: "Check the digital certificate and signature.",
    },
];

/// Classifies raw failure text from the tax authority.
///
/// Stateless; the registry is static and shared by every instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub const fn new() -> Self {
        Self
    }

    /// Known failures, in match order.
    pub fn registry(&self) -> &'static [RegistryEntry] {
        REGISTRY
    }

    /// Look up a registry entry by its exact code.
    pub fn lookup(&self, code: &str) -> Option<&'static RegistryEntry> {
        REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
    }

    /// Classify `raw` (a remote message, fault string or transport error
    /// text), optionally with the HTTP status of the response.
    ///
    /// Total and deterministic: the same input always yields the same result.
    pub fn classify(&self, raw: &str, http_status: Option<u16>) -> ClassifiedError {
        let lowered = raw.to_lowercase();
        let with_status = |err: ClassifiedError| match http_status {
            Some(status) => err.with_http_status(status),
            None => err,
        };

        if let Some(known) = REGISTRY.iter().find(|e| registry_matches(e, &lowered)) {
            return with_status(
                ClassifiedError::new(known.kind, known.code, known.message)
                    .with_detail(raw)
                    .with_recoverable(known.recoverable)
                    .with_suggestion(known.suggestion),
            );
        }

        if let Some(status) = http_status {
            if let Some(rule) = STATUS_RULES.iter().find(|r| r.statuses.contains(&status)) {
                return ClassifiedError::new(rule.kind, rule.code, rule.message)
                    .with_detail(raw)
                    .with_suggestion(rule.suggestion)
                    .with_http_status(status);
            }
        }

        if let Some(rule) = KEYWORD_RULES
            .iter()
            .find(|r| r.keywords.iter().any(|k| contains_word_start(&lowered, k)))
        {
            return with_status(
                ClassifiedError::new(rule.kind, rule.code, rule.message)
                    .with_detail(raw)
                    .with_suggestion(rule.suggestion),
            );
        }

        with_status(
            ClassifiedError::new(ErrorKind::System, "UNCLASSIFIED", "Unclassified remote error")
                .with_detail(raw)
                .with_recoverable(true)
                .with_suggestion("Contact technical support if the problem persists."),
        )
    }
}

fn registry_matches(entry: &RegistryEntry, lowered: &str) -> bool {
    lowered.contains(&entry.code.to_lowercase())
        || lowered.contains(entry.remote_phrase)
        || lowered.contains(&entry.message.to_lowercase())
}

/// Whether `keyword` occurs in `text` at the start of a word, so "format"
/// matches "formato" but not "information".
fn contains_word_start(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(at, _)| {
        text[..at].chars().next_back().map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Walk `err` and its sources looking for an already-classified failure.
fn find_classified<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a ClassifiedError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(classified) = e.downcast_ref::<ClassifiedError>() {
            return Some(classified);
        }
        current = e.source();
    }
    None
}

/// Whether retrying after `err` can help.
///
/// Uses the classification carried in the error chain when there is one;
/// anything else is classified from its rendered message, so an unknown
/// error is treated as recoverable.
pub fn is_recoverable(err: &(dyn StdError + 'static)) -> bool {
    match find_classified(err) {
        Some(classified) => classified.is_recoverable(),
        None => ErrorClassifier::new().classify(&err.to_string(), None).is_recoverable(),
    }
}

/// Operator-facing suggestion for `err`.
pub fn suggestion(err: &(dyn StdError + 'static)) -> String {
    match find_classified(err) {
        Some(classified) => classified.suggestion().to_string(),
        None => ErrorClassifier::new().classify(&err.to_string(), None).suggestion().to_string(),
    }
}
