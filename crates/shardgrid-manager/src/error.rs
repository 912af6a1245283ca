//! Manager error type and caller-facing error codes.

use thiserror::Error;

use shardgrid_alloc::AllocError;
use shardgrid_backend::BackendError;
use shardgrid_cache::{CacheError, ShardListCacheError};
use shardgrid_provision::{ProvisionError, ProvisionStep};
use shardgrid_registry::RegistryError;

/// Result type alias for shard management operations.
pub type ShardResult<T> = Result<T, ShardError>;

/// Errors surfaced by the shard management operations.
#[derive(Debug, Error)]
pub enum ShardError {
    /// Caller supplied an unrecognized shard-type filter.
    #[error("invalid shard type filter: {value:?}")]
    InvalidShardType { value: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    ShardList(#[from] ShardListCacheError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ShardError {
    /// Stable caller-facing error code, for API mapping and log
    /// correlation.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidShardType { .. } => "invalid_shard_type",
            Self::Config(_) => "invalid_config",
            Self::Registry(e) => registry_code(e),
            Self::ShardList(e) => cache_code(e),
            Self::Alloc(e) => alloc_code(e),
            Self::Provision(e) => provision_code(e),
            Self::Backend(_) => "backend_failure",
        }
    }
}

fn registry_code(e: &RegistryError) -> &'static str {
    match e {
        RegistryError::ShardNotFound(_) => "shard_not_found",
        RegistryError::ShardExists(_) => "shard_already_exists",
        RegistryError::MalformedRow(_) => "malformed_row",
        RegistryError::Backend(_) => "backend_failure",
    }
}

fn cache_code(e: &ShardListCacheError) -> &'static str {
    match e {
        CacheError::InvalidCacheIds => "invalid_cache_ids",
        CacheError::Codec(_) => "cache_codec_failure",
        CacheError::Source(inner) => registry_code(inner),
    }
}

fn alloc_code(e: &AllocError) -> &'static str {
    match e {
        AllocError::NoShardsAvailable { .. } => "no_shards_available",
        AllocError::Registry(inner) => registry_code(inner),
        AllocError::ShardList(inner) => cache_code(inner),
    }
}

fn provision_code(e: &ProvisionError) -> &'static str {
    match e.failed_step() {
        ProvisionStep::CreateTable => "create_table_failed",
        // Steps after table creation leave durable side effects behind.
        ProvisionStep::Register | ProvisionStep::ConfigureScaling | ProvisionStep::Enable => {
            "partial_provisioning_failure"
        }
    }
}
