//! Voucher exchange records

pub mod responses;

pub use responses::*;
