//! Provisioning orchestrator — the create → register → scale → enable
//! workflow.
//!
//! Completion of each step corresponds to a shard state: table created,
//! registered (disabled), scaling configured, enabled. The workflow is
//! not idempotent from the start: re-running after a step-2+ failure
//! hits `CreateTable` on the existing table. Resume at the failed step
//! with [`ProvisioningOrchestrator::provision_from`] instead.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use shardgrid_backend::{
    BackendResult, ScalableTarget, ScalingDimension, ScalingGateway, ScalingPolicy,
    StorageGateway, TableSpec, index_resource_id, table_resource_id,
};
use shardgrid_registry::{AllocationState, AvailableShardRegistry};

use crate::error::{ProvisionError, ProvisionResult};

/// Auto-scaling parameters applied to a newly provisioned shard.
///
/// The same bounds and policy apply to the table and each of its
/// secondary indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardScalingConfig {
    pub min_read_capacity: u64,
    pub max_read_capacity: u64,
    pub min_write_capacity: u64,
    pub max_write_capacity: u64,
    /// Utilization percentage target tracking steers toward.
    pub target_utilization: f64,
    pub scale_in_cooldown_secs: u64,
    pub scale_out_cooldown_secs: u64,
}

impl Default for ShardScalingConfig {
    fn default() -> Self {
        Self {
            min_read_capacity: 1,
            max_read_capacity: 15,
            min_write_capacity: 1,
            max_write_capacity: 15,
            target_utilization: 70.0,
            scale_in_cooldown_secs: 60,
            scale_out_cooldown_secs: 60,
        }
    }
}

/// A request to bring one new shard online.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Schema of the physical table; its name is the shard name.
    pub schema: TableSpec,
    pub entity_type: String,
    pub scaling: ShardScalingConfig,
}

/// The provisioning workflow steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    CreateTable,
    Register,
    ConfigureScaling,
    Enable,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateTable => "create_table",
            Self::Register => "register",
            Self::ConfigureScaling => "configure_scaling",
            Self::Enable => "enable",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub shard_name: String,
    pub entity_type: String,
    /// Steps executed by this run, in order. A resumed run lists only
    /// the steps it re-entered at and after.
    pub steps_run: Vec<ProvisionStep>,
}

/// Drives the multi-step shard provisioning workflow.
pub struct ProvisioningOrchestrator<S, A> {
    storage: Arc<S>,
    scaling: Arc<A>,
    registry: AvailableShardRegistry<S>,
}

impl<S: StorageGateway, A: ScalingGateway> ProvisioningOrchestrator<S, A> {
    pub fn new(storage: Arc<S>, scaling: Arc<A>, registry: AvailableShardRegistry<S>) -> Self {
        Self {
            storage,
            scaling,
            registry,
        }
    }

    /// Run the full workflow from the beginning.
    pub async fn provision(&self, req: &ProvisionRequest) -> ProvisionResult<ProvisionReport> {
        self.provision_from(req, ProvisionStep::CreateTable).await
    }

    /// Re-enter the workflow at `from`, skipping earlier steps.
    ///
    /// Intended for resuming after a partial failure
    /// ([`ProvisionError::failed_step`] names the step to pass); the
    /// caller is responsible for the skipped steps having completed.
    pub async fn provision_from(
        &self,
        req: &ProvisionRequest,
        from: ProvisionStep,
    ) -> ProvisionResult<ProvisionReport> {
        let shard_name = req.schema.name.clone();
        let mut steps_run = Vec::new();

        if from <= ProvisionStep::CreateTable {
            self.storage
                .create_table(req.schema.clone())
                .await
                .map_err(|source| ProvisionError::CreateTable {
                    shard_name: shard_name.clone(),
                    source,
                })?;
            steps_run.push(ProvisionStep::CreateTable);
            info!(%shard_name, entity_type = %req.entity_type, "shard table created");
        }

        if from <= ProvisionStep::Register {
            self.registry
                .add_shard(&shard_name, &req.entity_type)
                .await
                .map_err(|source| {
                    warn!(%shard_name, "registration failed, table is orphaned");
                    ProvisionError::Register {
                        shard_name: shard_name.clone(),
                        entity_type: req.entity_type.clone(),
                        source,
                    }
                })?;
            steps_run.push(ProvisionStep::Register);
        }

        if from <= ProvisionStep::ConfigureScaling {
            self.configure_auto_scaling(req)
                .await
                .map_err(|source| ProvisionError::ConfigureScaling {
                    shard_name: shard_name.clone(),
                    entity_type: req.entity_type.clone(),
                    source,
                })?;
            steps_run.push(ProvisionStep::ConfigureScaling);
            info!(%shard_name, "auto-scaling configured");
        }

        self.registry
            .configure_shard(&shard_name, AllocationState::Enabled)
            .await
            .map_err(|source| ProvisionError::Enable {
                shard_name: shard_name.clone(),
                entity_type: req.entity_type.clone(),
                source,
            })?;
        steps_run.push(ProvisionStep::Enable);
        info!(%shard_name, entity_type = %req.entity_type, "shard enabled");

        Ok(ProvisionReport {
            shard_name,
            entity_type: req.entity_type.clone(),
            steps_run,
        })
    }

    /// Register scalable targets and attach target-tracking policies
    /// for the table and each secondary index. Per-resource setup runs
    /// concurrently.
    async fn configure_auto_scaling(&self, req: &ProvisionRequest) -> BackendResult<()> {
        let table = &req.schema.name;
        let mut resources = vec![table_resource_id(table)];
        resources.extend(
            req.schema
                .indexes
                .iter()
                .map(|ix| index_resource_id(table, &ix.name)),
        );

        try_join_all(
            resources
                .iter()
                .map(|resource| self.configure_resource(resource, &req.scaling)),
        )
        .await?;
        Ok(())
    }

    async fn configure_resource(
        &self,
        resource_id: &str,
        cfg: &ShardScalingConfig,
    ) -> BackendResult<()> {
        for dimension in [ScalingDimension::ReadCapacity, ScalingDimension::WriteCapacity] {
            let (min, max, label) = match dimension {
                ScalingDimension::ReadCapacity => {
                    (cfg.min_read_capacity, cfg.max_read_capacity, "read")
                }
                ScalingDimension::WriteCapacity => {
                    (cfg.min_write_capacity, cfg.max_write_capacity, "write")
                }
            };
            self.scaling
                .register_scalable_target(ScalableTarget {
                    resource_id: resource_id.to_string(),
                    dimension,
                    min_capacity: min,
                    max_capacity: max,
                })
                .await?;
            self.scaling
                .put_scaling_policy(ScalingPolicy {
                    policy_name: format!("{resource_id}-{label}-scaling-policy"),
                    resource_id: resource_id.to_string(),
                    dimension,
                    target_utilization: cfg.target_utilization,
                    scale_in_cooldown_secs: cfg.scale_in_cooldown_secs,
                    scale_out_cooldown_secs: cfg.scale_out_cooldown_secs,
                })
                .await?;
        }
        Ok(())
    }
}
