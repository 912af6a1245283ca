//! Provisioning error types.
//!
//! One variant per workflow step, each carrying the shard name and
//! entity type so a partial failure is operator-actionable. No variant
//! implies automatic rollback; the durable side effects of completed
//! steps remain.

use thiserror::Error;

use shardgrid_backend::BackendError;
use shardgrid_registry::RegistryError;

use crate::orchestrator::ProvisionStep;

/// Result type alias for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors that can occur during shard provisioning.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Table creation failed; nothing was persisted in the registry.
    #[error("create table failed for shard {shard_name}: {source}")]
    CreateTable {
        shard_name: String,
        source: BackendError,
    },

    /// The table was created but registration failed, leaving an
    /// orphaned physical table for operators to reconcile.
    #[error(
        "shard {shard_name} (entity type {entity_type}) created but not registered, \
         table is orphaned: {source}"
    )]
    Register {
        shard_name: String,
        entity_type: String,
        source: RegistryError,
    },

    /// Auto-scaling configuration failed. The shard stays registered
    /// and disabled, so it is never an allocation candidate.
    #[error(
        "auto-scaling configuration failed for shard {shard_name} (entity type \
         {entity_type}), shard left disabled: {source}"
    )]
    ConfigureScaling {
        shard_name: String,
        entity_type: String,
        source: BackendError,
    },

    /// The final enable flip failed; scaling is configured but the
    /// shard stays disabled.
    #[error(
        "enable failed for shard {shard_name} (entity type {entity_type}), \
         shard left disabled: {source}"
    )]
    Enable {
        shard_name: String,
        entity_type: String,
        source: RegistryError,
    },
}

impl ProvisionError {
    /// The workflow step that failed, for resumption via
    /// [`ProvisioningOrchestrator::provision_from`].
    ///
    /// [`ProvisioningOrchestrator::provision_from`]:
    /// crate::orchestrator::ProvisioningOrchestrator::provision_from
    pub fn failed_step(&self) -> ProvisionStep {
        match self {
            Self::CreateTable { .. } => ProvisionStep::CreateTable,
            Self::Register { .. } => ProvisionStep::Register,
            Self::ConfigureScaling { .. } => ProvisionStep::ConfigureScaling,
            Self::Enable { .. } => ProvisionStep::Enable,
        }
    }

    pub fn shard_name(&self) -> &str {
        match self {
            Self::CreateTable { shard_name, .. }
            | Self::Register { shard_name, .. }
            | Self::ConfigureScaling { shard_name, .. }
            | Self::Enable { shard_name, .. } => shard_name,
        }
    }
}
