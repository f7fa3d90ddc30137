//! Error types for storage, delivery and export.
//!
//! None of these escape the capture or flush paths of [`crate::EventLogger`];
//! they exist so the storage and transport seams can report what went wrong
//! before the logger swallows it.

use thiserror::Error;

/// Failures of the key-value storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend refuses reads and writes (disabled, quota exhausted)
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures of a batch transmission. Every variant re-queues the batch.
#[derive(Error, Debug)]
pub enum TransmitError {
    /// Request never produced a response
    #[error("network error: {0}")]
    Network(String),

    /// Endpoint answered with a non-2xx status
    #[error("endpoint returned status {0}")]
    Status(u16),

    /// Response body was not the expected JSON
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Endpoint answered `success: false`
    #[error("endpoint rejected the batch")]
    Rejected,

    /// Payload could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while exporting the durable log.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
