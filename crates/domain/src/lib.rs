//! # VoucherGate Domain
//!
//! Plain data for the electronic voucher client.
//!
//! This crate contains:
//! - The 49-digit access key codec and its field enums
//! - Records decoded from reception and authorization responses
//! - Configuration structures
//! - The boundary error type and Result alias
//!
//! ## Architecture
//! - No dependencies on other VoucherGate crates
//! - No I/O

pub mod access_key;
pub mod config;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use access_key::{
    AccessKey, AccessKeyCodec, AccessKeyConfig, AccessKeyError, EmissionType, Environment,
    SequenceAllocator, VoucherType, ACCESS_KEY_LEN,
};
pub use config::*;
pub use errors::*;
pub use types::*;
