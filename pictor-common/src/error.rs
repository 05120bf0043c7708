//! Shared error and result types for the Pictor service crates

use thiserror::Error;

/// Result alias used throughout the Pictor crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared across Pictor services
///
/// Service-local failures (LLM transport, HTTP responses) have their own
/// enums; this one covers the concerns every crate touches.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem or socket I/O failed (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded, parsed, or validated
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-supplied value rejected before any work was done
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persisted state failed to encode for storage or decode back into
    /// its typed form (queue item status, prediction payloads, stored ids)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected failure with no more specific classification
    #[error("Internal error: {0}")]
    Internal(String),
}
