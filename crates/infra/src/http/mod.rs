//! HTTP transport for SOAP exchanges

pub mod client;

pub use client::{classify_transport_error, HttpClient, HttpClientBuilder, SOAP_CONTENT_TYPE};
