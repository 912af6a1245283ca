//! Registry error types.

use thiserror::Error;

use shardgrid_backend::BackendError;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("shard not found: {0}")]
    ShardNotFound(String),

    #[error("shard already exists: {0}")]
    ShardExists(String),

    #[error("malformed registry row: {0}")]
    MalformedRow(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}
