//! Item and table data model for the storage gateway.
//!
//! Items are JSON object maps; tables are described by a [`TableSpec`]
//! carrying the key schema, secondary indexes, and provisioned
//! throughput. Composite storage keys follow the pattern
//! `{partition}` or `{partition}:{sort}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackendError, BackendResult};

/// A backend row: attribute name to JSON value.
pub type Item = serde_json::Map<String, Value>;

/// Primary key of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub partition: String,
    pub sort: Option<String>,
}

impl ItemKey {
    /// Key with only a partition component.
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// Composite key with partition and sort components.
    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }

    /// Flat storage key: `{partition}` or `{partition}:{sort}`.
    pub fn storage_key(&self) -> String {
        match &self.sort {
            Some(sort) => format!("{}:{}", self.partition, sort),
            None => self.partition.clone(),
        }
    }
}

/// Attribute names forming a table or index key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    /// Partition key attribute name.
    pub partition: String,
    /// Sort key attribute name, if the key is composite.
    pub sort: Option<String>,
}

impl KeySchema {
    pub fn partition_only(attr: impl Into<String>) -> Self {
        Self {
            partition: attr.into(),
            sort: None,
        }
    }

    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }

    /// Extract this key from an item's attributes.
    ///
    /// Key attributes must be present and scalar (string or number).
    pub fn key_of(&self, table: &str, item: &Item) -> BackendResult<ItemKey> {
        let partition = key_component(table, item, &self.partition)?;
        let sort = match &self.sort {
            Some(attr) => Some(key_component(table, item, attr)?),
            None => None,
        };
        Ok(ItemKey { partition, sort })
    }
}

fn key_component(table: &str, item: &Item, attr: &str) -> BackendResult<String> {
    match item.get(attr) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(BackendError::InvalidRequest(format!(
            "key attribute {attr} of table {table} must be scalar, got {other}"
        ))),
        None => Err(BackendError::InvalidRequest(format!(
            "item for table {table} is missing key attribute {attr}"
        ))),
    }
}

/// A secondary index over a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    pub name: String,
    pub key: KeySchema,
}

/// Provisioned read/write throughput for a table or index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedThroughput {
    pub read_units: u64,
    pub write_units: u64,
}

impl Default for ProvisionedThroughput {
    fn default() -> Self {
        Self {
            read_units: 5,
            write_units: 5,
        }
    }
}

/// Caller-supplied schema for a new table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub key: KeySchema,
    #[serde(default)]
    pub indexes: Vec<SecondaryIndex>,
    #[serde(default)]
    pub throughput: ProvisionedThroughput,
}

impl TableSpec {
    /// Minimal spec: partition-keyed table with no indexes.
    pub fn new(name: impl Into<String>, key: KeySchema) -> Self {
        Self {
            name: name.into(),
            key,
            indexes: Vec::new(),
            throughput: ProvisionedThroughput::default(),
        }
    }

    pub fn with_index(mut self, index: SecondaryIndex) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Lifecycle status of a backend table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Creating,
    Active,
    Deleting,
}

/// Description of an existing table, as returned by `describe_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    pub spec: TableSpec,
    pub status: TableStatus,
    pub item_count: u64,
}

/// Read a string attribute from an item.
pub fn attr_str<'a>(item: &'a Item, attr: &str) -> Option<&'a str> {
    item.get(attr).and_then(Value::as_str)
}

/// Read an unsigned integer attribute from an item.
pub fn attr_u64(item: &Item, attr: &str) -> Option<u64> {
    item.get(attr).and_then(Value::as_u64)
}
