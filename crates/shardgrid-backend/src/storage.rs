//! Storage gateway capability trait.
//!
//! The contract covers the primitive operations the sharding core needs:
//! single-item put/get/update, key-ordered queries against the primary
//! key or a secondary index, batched gets, and table lifecycle. Strong
//! read consistency is requestable per operation; implementations that
//! are always consistent may ignore the flag.

use serde_json::Value;

use crate::error::BackendResult;
use crate::item::{Item, ItemKey, TableDescription, TableSpec};

/// Insert or overwrite a single item.
#[derive(Debug, Clone)]
pub struct PutItemRequest {
    pub table: String,
    pub item: Item,
}

/// Point lookup of a single item.
#[derive(Debug, Clone)]
pub struct GetItemRequest {
    pub table: String,
    pub key: ItemKey,
    /// Request strongly-consistent read semantics.
    pub consistent: bool,
}

/// Update attributes of an existing item; fails if the item is absent.
#[derive(Debug, Clone)]
pub struct UpdateItemRequest {
    pub table: String,
    pub key: ItemKey,
    /// Attributes to set, applied in order.
    pub set: Vec<(String, Value)>,
}

/// Query rows by partition-key equality, optionally through a secondary
/// index and optionally filtered by one more attribute-equality
/// predicate.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub table: String,
    /// Secondary index to query; `None` queries the primary key.
    pub index: Option<String>,
    /// `(attribute, value)` equality on the partition key of the
    /// queried key schema.
    pub partition: (String, Value),
    /// Optional additional `(attribute, value)` equality predicate.
    pub filter: Option<(String, Value)>,
    pub consistent: bool,
}

/// Batched point lookup. Keys with no matching item are simply absent
/// from the response; a partial response is not an error.
#[derive(Debug, Clone)]
pub struct BatchGetRequest {
    pub table: String,
    pub keys: Vec<ItemKey>,
    pub consistent: bool,
}

/// Primitive operations against the managed key-value backend.
///
/// Every call is a suspension point; cancellation and timeouts are owned
/// by the implementation's transport, not by callers of this trait.
pub trait StorageGateway: Send + Sync {
    async fn put_item(&self, req: PutItemRequest) -> BackendResult<()>;

    async fn get_item(&self, req: GetItemRequest) -> BackendResult<Option<Item>>;

    /// Returns the full updated item.
    async fn update_item(&self, req: UpdateItemRequest) -> BackendResult<Item>;

    /// Returns matching rows in key order. Zero rows is a valid,
    /// successful result.
    async fn query(&self, req: QueryRequest) -> BackendResult<Vec<Item>>;

    async fn batch_get_item(&self, req: BatchGetRequest) -> BackendResult<Vec<Item>>;

    async fn create_table(&self, spec: TableSpec) -> BackendResult<TableDescription>;

    async fn describe_table(&self, table: &str) -> BackendResult<TableDescription>;

    async fn delete_table(&self, table: &str) -> BackendResult<()>;
}
