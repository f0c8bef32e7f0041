//! Error classification for tax authority failures

mod classifier;
mod error;

pub use classifier::{is_recoverable, suggestion, ErrorClassifier, RegistryEntry};
pub use error::{ClassifiedError, ErrorKind};
