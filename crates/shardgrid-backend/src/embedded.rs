//! EmbeddedStore — redb-backed implementation of the storage gateway.
//!
//! Items are JSON-serialized into redb's `&[u8]` value columns, keyed by
//! the flat storage key of their primary key. A reserved catalog table
//! holds the `TableSpec` of every created table; queries against a
//! secondary index are served by a scan over the primary table filtered
//! on the index's partition attribute. Reads are always strongly
//! consistent, so the per-request consistency flag is accepted and
//! ignored. Supports both on-disk and in-memory backends (the latter
//! for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::{BackendError, BackendResult};
use crate::item::{Item, KeySchema, TableDescription, TableSpec, TableStatus};
use crate::storage::{
    BatchGetRequest, GetItemRequest, PutItemRequest, QueryRequest, StorageGateway,
    UpdateItemRequest,
};

/// Convert any `Display` error into a `BackendError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| BackendError::$variant(e.to_string())
    };
}

/// Table specs keyed by table name. The leading underscores keep the
/// name out of the caller-visible namespace.
const CATALOG: TableDefinition<&str, &[u8]> = TableDefinition::new("__catalog");

/// Embedded storage gateway backed by redb.
#[derive(Clone)]
pub struct EmbeddedStore {
    db: Arc<Database>,
}

impl EmbeddedStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> BackendResult<Self> {
        let db = Database::create(path).map_err(map_err!(Storage))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_catalog()?;
        debug!(?path, "embedded store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> BackendResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Storage))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_catalog()?;
        debug!("in-memory embedded store opened");
        Ok(store)
    }

    fn ensure_catalog(&self) -> BackendResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CATALOG).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    /// Load a table's spec from the catalog, or fail with `TableNotFound`.
    fn load_spec(&self, table: &str) -> BackendResult<TableSpec> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let catalog = txn.open_table(CATALOG).map_err(map_err!(Storage))?;
        match catalog.get(table).map_err(map_err!(Storage))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize)),
            None => Err(BackendError::TableNotFound(table.to_string())),
        }
    }

    /// Resolve the key schema a query runs against: the primary key, or
    /// a secondary index's key.
    fn query_schema(spec: &TableSpec, index: Option<&str>) -> BackendResult<KeySchema> {
        match index {
            None => Ok(spec.key.clone()),
            Some(name) => spec
                .indexes
                .iter()
                .find(|ix| ix.name == name)
                .map(|ix| ix.key.clone())
                .ok_or_else(|| BackendError::IndexNotFound {
                    table: spec.name.clone(),
                    index: name.to_string(),
                }),
        }
    }
}

impl StorageGateway for EmbeddedStore {
    async fn put_item(&self, req: PutItemRequest) -> BackendResult<()> {
        let spec = self.load_spec(&req.table)?;
        let key = spec.key.key_of(&req.table, &req.item)?;
        let bytes = serde_json::to_vec(&req.item).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let def = TableDefinition::<&str, &[u8]>::new(&req.table);
            let mut table = txn.open_table(def).map_err(map_err!(Storage))?;
            table
                .insert(key.storage_key().as_str(), bytes.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    async fn get_item(&self, req: GetItemRequest) -> BackendResult<Option<Item>> {
        self.load_spec(&req.table)?;
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let def = TableDefinition::<&str, &[u8]>::new(&req.table);
        let table = txn.open_table(def).map_err(map_err!(Storage))?;
        match table
            .get(req.key.storage_key().as_str())
            .map_err(map_err!(Storage))?
        {
            Some(guard) => {
                let item: Item =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn update_item(&self, req: UpdateItemRequest) -> BackendResult<Item> {
        self.load_spec(&req.table)?;
        let storage_key = req.key.storage_key();

        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let updated = {
            let def = TableDefinition::<&str, &[u8]>::new(&req.table);
            let mut table = txn.open_table(def).map_err(map_err!(Storage))?;
            let existing = {
                match table.get(storage_key.as_str()).map_err(map_err!(Storage))? {
                    Some(guard) => guard.value().to_vec(),
                    None => {
                        return Err(BackendError::ItemNotFound {
                            table: req.table,
                            key: storage_key,
                        });
                    }
                }
            };
            let mut item: Item =
                serde_json::from_slice(&existing).map_err(map_err!(Deserialize))?;
            for (attr, value) in req.set {
                item.insert(attr, value);
            }
            let bytes = serde_json::to_vec(&item).map_err(map_err!(Serialize))?;
            table
                .insert(storage_key.as_str(), bytes.as_slice())
                .map_err(map_err!(Storage))?;
            item
        };
        txn.commit().map_err(map_err!(Storage))?;
        Ok(updated)
    }

    async fn query(&self, req: QueryRequest) -> BackendResult<Vec<Item>> {
        let spec = self.load_spec(&req.table)?;
        let schema = Self::query_schema(&spec, req.index.as_deref())?;

        let (partition_attr, partition_value) = &req.partition;
        if *partition_attr != schema.partition {
            return Err(BackendError::InvalidRequest(format!(
                "query on table {} expects partition attribute {}, got {partition_attr}",
                req.table, schema.partition
            )));
        }

        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let def = TableDefinition::<&str, &[u8]>::new(&req.table);
        let table = txn.open_table(def).map_err(map_err!(Storage))?;

        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (_, value) = entry.map_err(map_err!(Storage))?;
            let item: Item =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if item.get(partition_attr) != Some(partition_value) {
                continue;
            }
            if let Some((filter_attr, filter_value)) = &req.filter
                && item.get(filter_attr) != Some(filter_value)
            {
                continue;
            }
            results.push(item);
        }
        Ok(results)
    }

    async fn batch_get_item(&self, req: BatchGetRequest) -> BackendResult<Vec<Item>> {
        self.load_spec(&req.table)?;
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let def = TableDefinition::<&str, &[u8]>::new(&req.table);
        let table = txn.open_table(def).map_err(map_err!(Storage))?;

        let mut results = Vec::new();
        for key in &req.keys {
            if let Some(guard) = table
                .get(key.storage_key().as_str())
                .map_err(map_err!(Storage))?
            {
                let item: Item =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                results.push(item);
            }
        }
        Ok(results)
    }

    async fn create_table(&self, spec: TableSpec) -> BackendResult<TableDescription> {
        if spec.name.is_empty() || spec.name.starts_with("__") {
            return Err(BackendError::InvalidRequest(format!(
                "invalid table name: {:?}",
                spec.name
            )));
        }
        let bytes = serde_json::to_vec(&spec).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut catalog = txn.open_table(CATALOG).map_err(map_err!(Storage))?;
            let exists = catalog
                .get(spec.name.as_str())
                .map_err(map_err!(Storage))?
                .is_some();
            if exists {
                return Err(BackendError::TableExists(spec.name));
            }
            catalog
                .insert(spec.name.as_str(), bytes.as_slice())
                .map_err(map_err!(Storage))?;
            // Open the data table so it exists for later read transactions.
            let def = TableDefinition::<&str, &[u8]>::new(&spec.name);
            txn.open_table(def).map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(table = %spec.name, "table created");

        Ok(TableDescription {
            spec,
            status: TableStatus::Active,
            item_count: 0,
        })
    }

    async fn describe_table(&self, table: &str) -> BackendResult<TableDescription> {
        let spec = self.load_spec(table)?;
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let def = TableDefinition::<&str, &[u8]>::new(table);
        let data = txn.open_table(def).map_err(map_err!(Storage))?;
        let item_count = data.iter().map_err(map_err!(Storage))?.count() as u64;
        Ok(TableDescription {
            spec,
            status: TableStatus::Active,
            item_count,
        })
    }

    async fn delete_table(&self, table: &str) -> BackendResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut catalog = txn.open_table(CATALOG).map_err(map_err!(Storage))?;
            if catalog.remove(table).map_err(map_err!(Storage))?.is_none() {
                return Err(BackendError::TableNotFound(table.to_string()));
            }
        }
        let def = TableDefinition::<&str, &[u8]>::new(table);
        txn.delete_table(def).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        debug!(table, "table deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemKey, SecondaryIndex};
    use serde_json::json;

    fn shard_table_spec(name: &str) -> TableSpec {
        TableSpec::new(name, KeySchema::partition_only("shard_name")).with_index(SecondaryIndex {
            name: "entity_allocation_index".to_string(),
            key: KeySchema::composite("entity_type", "allocation_type"),
        })
    }

    fn shard_item(shard: &str, entity: &str, allocation: &str) -> Item {
        let mut item = Item::new();
        item.insert("shard_name".to_string(), json!(shard));
        item.insert("entity_type".to_string(), json!(entity));
        item.insert("allocation_type".to_string(), json!(allocation));
        item.insert("created_at".to_string(), json!(1700000000000u64));
        item.insert("updated_at".to_string(), json!(1700000000000u64));
        item
    }

    async fn store_with_table(name: &str) -> EmbeddedStore {
        let store = EmbeddedStore::open_in_memory().unwrap();
        store.create_table(shard_table_spec(name)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_describe_delete() {
        let store = store_with_table("available_shards").await;

        let desc = store.describe_table("available_shards").await.unwrap();
        assert_eq!(desc.status, TableStatus::Active);
        assert_eq!(desc.item_count, 0);
        assert_eq!(desc.spec.indexes.len(), 1);

        store.delete_table("available_shards").await.unwrap();
        let err = store.describe_table("available_shards").await.unwrap_err();
        assert!(matches!(err, BackendError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_create_fails() {
        let store = store_with_table("available_shards").await;
        let err = store
            .create_table(shard_table_spec("available_shards"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::TableExists(_)));
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = store_with_table("available_shards").await;
        store
            .put_item(PutItemRequest {
                table: "available_shards".to_string(),
                item: shard_item("shard_0", "user", "disabled"),
            })
            .await
            .unwrap();

        let found = store
            .get_item(GetItemRequest {
                table: "available_shards".to_string(),
                key: ItemKey::partition("shard_0"),
                consistent: true,
            })
            .await
            .unwrap();
        assert_eq!(
            found.as_ref().and_then(|i| i.get("entity_type")),
            Some(&json!("user"))
        );

        let missing = store
            .get_item(GetItemRequest {
                table: "available_shards".to_string(),
                key: ItemKey::partition("shard_9"),
                consistent: true,
            })
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn update_returns_full_row_and_fails_on_absent() {
        let store = store_with_table("available_shards").await;
        store
            .put_item(PutItemRequest {
                table: "available_shards".to_string(),
                item: shard_item("shard_0", "user", "disabled"),
            })
            .await
            .unwrap();

        let updated = store
            .update_item(UpdateItemRequest {
                table: "available_shards".to_string(),
                key: ItemKey::partition("shard_0"),
                set: vec![
                    ("allocation_type".to_string(), json!("enabled")),
                    ("updated_at".to_string(), json!(1700000001000u64)),
                ],
            })
            .await
            .unwrap();
        assert_eq!(updated.get("allocation_type"), Some(&json!("enabled")));
        assert_eq!(updated.get("entity_type"), Some(&json!("user")));

        let err = store
            .update_item(UpdateItemRequest {
                table: "available_shards".to_string(),
                key: ItemKey::partition("shard_9"),
                set: vec![("allocation_type".to_string(), json!("enabled"))],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ItemNotFound { .. }));
    }

    #[tokio::test]
    async fn query_by_index_with_filter() {
        let store = store_with_table("available_shards").await;
        for (shard, entity, alloc) in [
            ("shard_0", "user", "enabled"),
            ("shard_1", "user", "disabled"),
            ("shard_2", "user", "enabled"),
            ("shard_3", "token", "enabled"),
        ] {
            store
                .put_item(PutItemRequest {
                    table: "available_shards".to_string(),
                    item: shard_item(shard, entity, alloc),
                })
                .await
                .unwrap();
        }

        let all_user = store
            .query(QueryRequest {
                table: "available_shards".to_string(),
                index: Some("entity_allocation_index".to_string()),
                partition: ("entity_type".to_string(), json!("user")),
                filter: None,
                consistent: false,
            })
            .await
            .unwrap();
        assert_eq!(all_user.len(), 3);

        let enabled_user = store
            .query(QueryRequest {
                table: "available_shards".to_string(),
                index: Some("entity_allocation_index".to_string()),
                partition: ("entity_type".to_string(), json!("user")),
                filter: Some(("allocation_type".to_string(), json!("enabled"))),
                consistent: false,
            })
            .await
            .unwrap();
        // Key order: shard_0 before shard_2.
        let names: Vec<_> = enabled_user
            .iter()
            .map(|i| i.get("shard_name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["shard_0", "shard_2"]);

        let none = store
            .query(QueryRequest {
                table: "available_shards".to_string(),
                index: Some("entity_allocation_index".to_string()),
                partition: ("entity_type".to_string(), json!("session")),
                filter: None,
                consistent: false,
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn query_unknown_index_fails() {
        let store = store_with_table("available_shards").await;
        let err = store
            .query(QueryRequest {
                table: "available_shards".to_string(),
                index: Some("no_such_index".to_string()),
                partition: ("entity_type".to_string(), json!("user")),
                filter: None,
                consistent: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::IndexNotFound { .. }));
    }

    #[tokio::test]
    async fn batch_get_tolerates_missing_keys() {
        let store = store_with_table("available_shards").await;
        store
            .put_item(PutItemRequest {
                table: "available_shards".to_string(),
                item: shard_item("shard_0", "user", "enabled"),
            })
            .await
            .unwrap();

        let found = store
            .batch_get_item(BatchGetRequest {
                table: "available_shards".to_string(),
                keys: vec![ItemKey::partition("shard_0"), ItemKey::partition("shard_7")],
                consistent: true,
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("shard_name"), Some(&json!("shard_0")));
    }

    #[tokio::test]
    async fn operations_on_unknown_table_fail() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        let err = store
            .get_item(GetItemRequest {
                table: "nowhere".to_string(),
                key: ItemKey::partition("x"),
                consistent: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::TableNotFound(_)));

        let err = store.delete_table("nowhere").await.unwrap_err();
        assert!(matches!(err, BackendError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = EmbeddedStore::open(&db_path).unwrap();
            store
                .create_table(shard_table_spec("available_shards"))
                .await
                .unwrap();
            store
                .put_item(PutItemRequest {
                    table: "available_shards".to_string(),
                    item: shard_item("shard_0", "user", "disabled"),
                })
                .await
                .unwrap();
        }

        // Reopen the same database file.
        let store = EmbeddedStore::open(&db_path).unwrap();
        let desc = store.describe_table("available_shards").await.unwrap();
        assert_eq!(desc.item_count, 1);
    }

    #[tokio::test]
    async fn reserved_table_names_rejected() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        let err = store
            .create_table(shard_table_spec("__catalog"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidRequest(_)));
    }
}
