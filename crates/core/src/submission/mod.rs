//! Voucher submission: the gateway port and the orchestration around it

mod error;
mod orchestrator;
pub mod ports;

pub use error::SubmissionError;
pub use orchestrator::{
    ProcessingOutcome, ProcessingReport, Stage, SubmissionOrchestrator, DEFAULT_SETTLE_DELAY,
};
pub use ports::VoucherGateway;
