//! Web service locations per environment

use vouchergate_domain::{Environment, SoapSettings};

const TEST_HOST: &str = "https://celcer.sri.gob.ec";
const PRODUCTION_HOST: &str = "https://cel.sri.gob.ec";
const RECEPTION_PATH: &str = "/comprobantes-electronicos-ws/RecepcionComprobantesOffline";
const AUTHORIZATION_PATH: &str = "/comprobantes-electronicos-ws/AutorizacionComprobantesOffline";

/// Reception and authorization URLs for one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub reception: String,
    pub authorization: String,
}

impl Endpoints {
    /// Official endpoints for `environment`.
    pub fn for_environment(environment: Environment) -> Self {
        let host = match environment {
            Environment::Test => TEST_HOST,
            Environment::Production => PRODUCTION_HOST,
        };
        Self::with_base(host)
    }

    /// Both services under `base`, using the official paths.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            reception: format!("{base}{RECEPTION_PATH}"),
            authorization: format!("{base}{AUTHORIZATION_PATH}"),
        }
    }

    /// Official endpoints for `environment`, with any URL the settings override.
    pub fn from_settings(environment: Environment, settings: &SoapSettings) -> Self {
        let mut endpoints = Self::for_environment(environment);
        if let Some(url) = settings.reception_url.as_deref().filter(|u| !u.trim().is_empty()) {
            endpoints.reception = url.trim().to_string();
        }
        if let Some(url) = settings.authorization_url.as_deref().filter(|u| !u.trim().is_empty()) {
            endpoints.authorization = url.trim().to_string();
        }
        endpoints
    }
}
