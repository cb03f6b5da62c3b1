//! # Storage Traits
//!
//! The record store abstraction used by the domain layer.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::path::StorePath;
use crate::error::StoreError;

/// Key-path addressed access to a hierarchical JSON store
///
/// Every call may fail with a [`StoreError`]; callers never retry on their own.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the whole subtree at `path`; `None` when nothing is stored there
    async fn read_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Replace whatever is stored at `path` with `value`
    async fn write_record(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Merge top-level keys into the object at `path`; `null` values remove keys
    async fn update_fields(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError>;

    /// Remove the subtree at `path`; removing an absent path succeeds
    async fn delete_record(&self, path: &StorePath) -> Result<(), StoreError>;
}
