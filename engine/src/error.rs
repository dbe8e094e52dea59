//! Error types for the Tabula engine.

use thiserror::Error;

/// All possible errors from the Tabula engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Addressing errors
    #[error("invalid range expression: {0}")]
    InvalidRange(String),

    #[error("invalid column: {0}")]
    InvalidColumn(String),

    #[error("invalid row number: {0} (rows are 1-based)")]
    InvalidRow(u32),

    // Payload errors
    #[error("invalid payload for {entity}: {reason}")]
    InvalidPayload { entity: String, reason: String },

    #[error("empty key for {0}")]
    EmptyKey(String),

    #[error("unknown entity kind: {0}")]
    UnknownEntity(String),

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
