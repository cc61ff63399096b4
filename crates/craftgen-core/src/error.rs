//! Error types for craftgen.
//!
//! The generation variants mirror the product's failure policy: retrieval,
//! structured generation and asset transcoding hard-fail, while image
//! generation failures are absorbed by the image strategy and never reach
//! pipeline callers.

use thiserror::Error;

/// Result type alias using craftgen's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for craftgen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Similarity search failed. "No results" is not an error.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Model output could not be mapped onto the requested structure.
    #[error("Structured generation failed: {0}")]
    StructuredGeneration(String),

    /// Image provider call failed.
    #[error("Image generation failed: {0}")]
    ImageGeneration(String),

    /// Remote asset could not be copied into durable storage.
    #[error("Asset transcode failed: {0}")]
    AssetTranscode(String),

    /// A pipeline stage was called without its required inputs.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Chat session does not exist
    #[error("Chat session not found: {0}")]
    SessionNotFound(i64),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Object storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// State transition already happened
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Caller identity missing or invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not the owner)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
