//! Shardgrid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use shardgrid_provision::ShardScalingConfig;
use shardgrid_registry::RegistryTables;

/// Configuration for a [`ShardManager`](crate::ShardManager).
///
/// Parseable from TOML; every field has a default, so an empty document
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardGridConfig {
    /// Registry table and index names.
    pub tables: RegistryTables,
    /// Shard-list cache time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Scaling parameters applied when a provisioning request does not
    /// carry its own.
    pub scaling: ShardScalingConfig,
}

impl Default for ShardGridConfig {
    fn default() -> Self {
        Self {
            tables: RegistryTables::default(),
            cache_ttl_secs: 86_400,
            scaling: ShardScalingConfig::default(),
        }
    }
}

impl ShardGridConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_defaults() {
        let config = ShardGridConfig::from_toml_str("").unwrap();
        assert_eq!(config, ShardGridConfig::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ShardGridConfig::from_toml_str(
            r#"
            cache_ttl_secs = 600

            [tables]
            available_table = "shards_catalog"
            managed_table = "shard_pins"
            entity_allocation_index = "by_entity_allocation"

            [scaling]
            min_read_capacity = 2
            max_read_capacity = 40
            min_write_capacity = 2
            max_write_capacity = 40
            target_utilization = 55.0
            scale_in_cooldown_secs = 120
            scale_out_cooldown_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.tables.available_table, "shards_catalog");
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.scaling.max_read_capacity, 40);
        assert_eq!(config.scaling.target_utilization, 55.0);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(ShardGridConfig::from_toml_str("cache_ttl_secs = \"soon\"").is_err());
    }
}
