//! Error types shared across SensorHub crates.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SensorHub error kinds.
///
/// Every failure in the core is per-message or per-call; none of these
/// variants is fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound payload could not be decoded or is missing required fields.
    /// Recovered in the ingest path: the message is dropped with a warning.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Command parameters failed validation; nothing was published.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The bus publish failed (broker unreachable, channel closed).
    /// Surfaced to the caller without internal retry.
    #[error("transport error: {0}")]
    Transport(String),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A bounded publish or store call exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Resource lookup failed.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Malformed(e.to_string())
    }
}
