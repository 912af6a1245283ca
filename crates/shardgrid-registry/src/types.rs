//! Domain types for the shard registries.
//!
//! Registry rows are plain backend items; [`ShardEntry`] and
//! [`ShardAssignment`] are immutable value types constructed once from
//! the raw row and serializable back into one.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::json;

use shardgrid_backend::{
    BackendError, BackendResult, Item, KeySchema, SecondaryIndex, StorageGateway, TableSpec,
    item::{attr_str, attr_u64},
};

use crate::error::{RegistryError, RegistryResult};

/// Registry column names.
pub mod columns {
    pub const SHARD_NAME: &str = "shard_name";
    pub const ENTITY_TYPE: &str = "entity_type";
    pub const ALLOCATION_TYPE: &str = "allocation_type";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const IDENTIFIER: &str = "identifier";
}

/// Whether new identifiers may be pinned to a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    Enabled,
    Disabled,
}

impl AllocationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Allocation-state filter for shard-list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardFilter {
    All,
    Enabled,
    Disabled,
}

impl ShardFilter {
    /// Parse a caller-supplied filter string. Unrecognized values are
    /// `None`; callers decide how to surface that.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    /// The allocation state this filter matches, or `None` for `All`.
    pub fn allocation(self) -> Option<AllocationState> {
        match self {
            Self::All => None,
            Self::Enabled => Some(AllocationState::Enabled),
            Self::Disabled => Some(AllocationState::Disabled),
        }
    }
}

/// One shard-list query: an entity type plus an allocation-state filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardListRequest {
    pub entity_type: String,
    pub filter: ShardFilter,
}

impl ShardListRequest {
    pub fn new(entity_type: impl Into<String>, filter: ShardFilter) -> Self {
        Self {
            entity_type: entity_type.into(),
            filter,
        }
    }
}

/// One row of the available-shard registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    pub shard_name: String,
    pub entity_type: String,
    pub allocation: AllocationState,
    /// Epoch milliseconds.
    pub created_at: u64,
    /// Epoch milliseconds.
    pub updated_at: u64,
}

impl ShardEntry {
    /// Build an entry from a raw backend row.
    pub fn from_item(item: &Item) -> RegistryResult<Self> {
        let shard_name = require_str(item, columns::SHARD_NAME)?;
        let allocation_raw = require_str(item, columns::ALLOCATION_TYPE)?;
        let allocation = AllocationState::parse(allocation_raw).ok_or_else(|| {
            RegistryError::MalformedRow(format!(
                "shard {shard_name} has unknown allocation_type {allocation_raw:?}"
            ))
        })?;
        Ok(Self {
            shard_name: shard_name.to_string(),
            entity_type: require_str(item, columns::ENTITY_TYPE)?.to_string(),
            allocation,
            created_at: require_u64(item, columns::CREATED_AT)?,
            updated_at: require_u64(item, columns::UPDATED_AT)?,
        })
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(columns::SHARD_NAME.to_string(), json!(self.shard_name));
        item.insert(columns::ENTITY_TYPE.to_string(), json!(self.entity_type));
        item.insert(
            columns::ALLOCATION_TYPE.to_string(),
            json!(self.allocation.as_str()),
        );
        item.insert(columns::CREATED_AT.to_string(), json!(self.created_at));
        item.insert(columns::UPDATED_AT.to_string(), json!(self.updated_at));
        item
    }
}

/// One row of the managed-shard registry: an identifier pinned to a
/// shard. Once written, a pin is never re-computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardAssignment {
    pub entity_type: String,
    pub identifier: String,
    pub shard_name: String,
}

impl ShardAssignment {
    pub fn from_item(item: &Item) -> RegistryResult<Self> {
        Ok(Self {
            entity_type: require_str(item, columns::ENTITY_TYPE)?.to_string(),
            identifier: require_str(item, columns::IDENTIFIER)?.to_string(),
            shard_name: require_str(item, columns::SHARD_NAME)?.to_string(),
        })
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(columns::ENTITY_TYPE.to_string(), json!(self.entity_type));
        item.insert(columns::IDENTIFIER.to_string(), json!(self.identifier));
        item.insert(columns::SHARD_NAME.to_string(), json!(self.shard_name));
        item
    }
}

fn require_str<'a>(item: &'a Item, attr: &str) -> RegistryResult<&'a str> {
    attr_str(item, attr)
        .ok_or_else(|| RegistryError::MalformedRow(format!("missing string attribute {attr}")))
}

fn require_u64(item: &Item, attr: &str) -> RegistryResult<u64> {
    attr_u64(item, attr)
        .ok_or_else(|| RegistryError::MalformedRow(format!("missing numeric attribute {attr}")))
}

/// Table and index names the registries operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryTables {
    pub available_table: String,
    pub managed_table: String,
    pub entity_allocation_index: String,
}

impl Default for RegistryTables {
    fn default() -> Self {
        Self {
            available_table: "available_shards".to_string(),
            managed_table: "managed_shards".to_string(),
            entity_allocation_index: "entity_allocation_index".to_string(),
        }
    }
}

impl RegistryTables {
    /// Spec of the available-shard table: keyed by shard name, with a
    /// secondary index over `(entity_type, allocation_type)`.
    pub fn available_spec(&self) -> TableSpec {
        TableSpec::new(
            &self.available_table,
            KeySchema::partition_only(columns::SHARD_NAME),
        )
        .with_index(SecondaryIndex {
            name: self.entity_allocation_index.clone(),
            key: KeySchema::composite(columns::ENTITY_TYPE, columns::ALLOCATION_TYPE),
        })
    }

    /// Spec of the managed-shard table: composite key
    /// `(entity_type, identifier)`.
    pub fn managed_spec(&self) -> TableSpec {
        TableSpec::new(
            &self.managed_table,
            KeySchema::composite(columns::ENTITY_TYPE, columns::IDENTIFIER),
        )
    }

    /// Create both registry tables if they do not exist yet.
    pub async fn ensure<S: StorageGateway>(&self, store: &S) -> BackendResult<()> {
        for spec in [self.available_spec(), self.managed_spec()] {
            match store.create_table(spec).await {
                Ok(_) | Err(BackendError::TableExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Current time in epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
