//! shardgrid-backend — gateway contracts for the sharding core.
//!
//! Defines the two capability traits the rest of the workspace is built
//! against: [`StorageGateway`] (primitive item/table operations against a
//! managed key-value backend) and [`ScalingGateway`] (throughput
//! auto-scaling control plane). Neither trait specifies transport
//! behavior; retry, backoff, and timeouts belong to the implementations.
//!
//! The crate also ships embedded implementations of both contracts:
//! [`EmbeddedStore`] persists items as JSON bytes in redb tables (on-disk
//! or in-memory), and [`LocalScalingPlane`] records scalable targets and
//! policies in process memory. These make the system runnable and
//! testable without a remote backend.

#![allow(async_fn_in_trait)]

pub mod embedded;
pub mod error;
pub mod item;
pub mod scaling;
pub mod storage;

pub use embedded::EmbeddedStore;
pub use error::{BackendError, BackendResult};
pub use item::{
    Item, ItemKey, KeySchema, ProvisionedThroughput, SecondaryIndex, TableDescription, TableSpec,
    TableStatus,
};
pub use scaling::{
    LocalScalingPlane, ScalableTarget, ScalingDimension, ScalingGateway, ScalingPolicy,
    index_resource_id, table_resource_id,
};
pub use storage::{
    BatchGetRequest, GetItemRequest, PutItemRequest, QueryRequest, StorageGateway,
    UpdateItemRequest,
};
