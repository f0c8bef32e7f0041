//! Shared test helpers for `vouchergate-core` integration tests.
//!
//! Provides a scripted in-memory gateway so orchestration tests can focus on
//! behaviour instead of transport details.

pub mod gateway;
