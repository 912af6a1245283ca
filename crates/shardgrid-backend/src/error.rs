//! Error types for the backend gateways.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors returned by the storage and scaling gateways.
///
/// Propagated unchanged to callers; no retry or backoff happens at this
/// layer.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("index not found: {index} on table {table}")]
    IndexNotFound { table: String, index: String },

    #[error("item not found: {key} in table {table}")]
    ItemNotFound { table: String, key: String },

    #[error("scalable target not registered: {0}")]
    TargetNotRegistered(String),

    #[error("scaling policy not found: {0}")]
    PolicyNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
