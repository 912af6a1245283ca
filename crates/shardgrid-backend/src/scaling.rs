//! Scaling gateway capability trait and the in-memory control plane.
//!
//! Resource ids follow the control-plane convention `table/{name}` and
//! `table/{name}/index/{index}`. Policies are target-tracking: the
//! control plane adjusts provisioned throughput to hold utilization at
//! the target percentage, subject to the registered target's min/max
//! capacity and the policy's cooldown windows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, BackendResult};

/// Throughput dimension a target or policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingDimension {
    ReadCapacity,
    WriteCapacity,
}

/// A resource registered for auto-scaling, bounded by min/max capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalableTarget {
    pub resource_id: String,
    pub dimension: ScalingDimension,
    pub min_capacity: u64,
    pub max_capacity: u64,
}

/// A target-tracking scaling policy attached to a registered target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub policy_name: String,
    pub resource_id: String,
    pub dimension: ScalingDimension,
    /// Utilization percentage the control plane steers toward.
    pub target_utilization: f64,
    pub scale_in_cooldown_secs: u64,
    pub scale_out_cooldown_secs: u64,
}

/// Resource id for a table.
pub fn table_resource_id(table: &str) -> String {
    format!("table/{table}")
}

/// Resource id for a secondary index of a table.
pub fn index_resource_id(table: &str, index: &str) -> String {
    format!("table/{table}/index/{index}")
}

/// Operations against the auto-scaling control plane.
pub trait ScalingGateway: Send + Sync {
    /// Register (or re-register) a scalable target. Upserts.
    async fn register_scalable_target(&self, target: ScalableTarget) -> BackendResult<()>;

    /// Remove a scalable target and any policies attached to it.
    async fn deregister_scalable_target(
        &self,
        resource_id: &str,
        dimension: ScalingDimension,
    ) -> BackendResult<()>;

    /// Attach a target-tracking policy. The target must be registered.
    async fn put_scaling_policy(&self, policy: ScalingPolicy) -> BackendResult<()>;

    async fn delete_scaling_policy(
        &self,
        policy_name: &str,
        resource_id: &str,
        dimension: ScalingDimension,
    ) -> BackendResult<()>;
}

#[derive(Default)]
struct PlaneState {
    targets: HashMap<(String, ScalingDimension), ScalableTarget>,
    policies: HashMap<(String, ScalingDimension), ScalingPolicy>,
}

/// In-memory scaling control plane.
///
/// Records targets and policies and enforces the register-before-policy
/// ordering; it performs no actual capacity adjustment.
#[derive(Clone, Default)]
pub struct LocalScalingPlane {
    state: Arc<Mutex<PlaneState>>,
}

impl LocalScalingPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// All currently registered targets, for inspection.
    pub fn registered_targets(&self) -> Vec<ScalableTarget> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.targets.values().cloned().collect()
    }

    /// Policy attached to a resource/dimension pair, if any.
    pub fn policy_for(
        &self,
        resource_id: &str,
        dimension: ScalingDimension,
    ) -> Option<ScalingPolicy> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .policies
            .get(&(resource_id.to_string(), dimension))
            .cloned()
    }

    pub fn policy_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.policies.len()
    }
}

impl ScalingGateway for LocalScalingPlane {
    async fn register_scalable_target(&self, target: ScalableTarget) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!(
            resource = %target.resource_id,
            dimension = ?target.dimension,
            min = target.min_capacity,
            max = target.max_capacity,
            "scalable target registered"
        );
        state
            .targets
            .insert((target.resource_id.clone(), target.dimension), target);
        Ok(())
    }

    async fn deregister_scalable_target(
        &self,
        resource_id: &str,
        dimension: ScalingDimension,
    ) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let key = (resource_id.to_string(), dimension);
        if state.targets.remove(&key).is_none() {
            return Err(BackendError::TargetNotRegistered(resource_id.to_string()));
        }
        state.policies.remove(&key);
        debug!(resource = resource_id, dimension = ?dimension, "scalable target deregistered");
        Ok(())
    }

    async fn put_scaling_policy(&self, policy: ScalingPolicy) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let key = (policy.resource_id.clone(), policy.dimension);
        if !state.targets.contains_key(&key) {
            return Err(BackendError::TargetNotRegistered(policy.resource_id));
        }
        debug!(
            resource = %policy.resource_id,
            policy = %policy.policy_name,
            target = policy.target_utilization,
            "scaling policy attached"
        );
        state.policies.insert(key, policy);
        Ok(())
    }

    async fn delete_scaling_policy(
        &self,
        policy_name: &str,
        resource_id: &str,
        dimension: ScalingDimension,
    ) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let key = (resource_id.to_string(), dimension);
        match state.policies.get(&key) {
            Some(policy) if policy.policy_name == policy_name => {
                state.policies.remove(&key);
                Ok(())
            }
            _ => Err(BackendError::PolicyNotFound(policy_name.to_string())),
        }
    }
}
