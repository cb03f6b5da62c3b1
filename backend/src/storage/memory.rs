use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::path::StorePath;
use super::traits::RecordStore;
use super::tree;
use crate::error::StoreError;

/// Record store kept entirely in memory
#[derive(Clone)]
pub struct MemoryStore {
    root: Arc<RwLock<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_data(Value::Object(Map::new()))
    }

    /// Seed the store with an existing tree; non-object seeds start empty
    pub fn with_data(data: Value) -> Self {
        let root = if data.is_object() { data } else { Value::Object(Map::new()) };
        Self {
            root: Arc::new(RwLock::new(root)),
        }
    }

    /// Copy of the whole tree
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        debug!("memory read {}", path);
        Ok(tree::read(&*self.root.read().await, path))
    }

    async fn write_record(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        debug!("memory write {}", path);
        tree::write(&mut *self.root.write().await, path, value);
        Ok(())
    }

    async fn update_fields(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError> {
        debug!("memory update {} ({} fields)", path, partial.len());
        tree::update(&mut *self.root.write().await, path, partial)
    }

    async fn delete_record(&self, path: &StorePath) -> Result<(), StoreError> {
        debug!("memory delete {}", path);
        tree::remove(&mut *self.root.write().await, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_crud_round_trip() {
        let store = MemoryStore::new();
        let path = StorePath::parse("Riwayat/1").unwrap();

        assert_eq!(store.read_subtree(&path).await.unwrap(), None);

        store.write_record(&path, json!({ "nama": "Budi", "umur": "6" })).await.unwrap();
        store
            .update_fields(&path, json!({ "umur": "7" }).as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(
            store.read_subtree(&path).await.unwrap(),
            Some(json!({ "nama": "Budi", "umur": "7" }))
        );

        store.delete_record(&path).await.unwrap();
        assert_eq!(store.read_subtree(&StorePath::history()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_seeded_store_and_last_writer_wins() {
        let store = MemoryStore::with_data(json!({ "measurements": { "bayi1": { "height": 60 } } }));
        let path = StorePath::parse("measurements/bayi1").unwrap();

        store.write_record(&path, json!({ "height": 61 })).await.unwrap();
        store.write_record(&path, json!({ "height": 62 })).await.unwrap();

        assert_eq!(store.read_subtree(&path).await.unwrap(), Some(json!({ "height": 62 })));
        assert_eq!(store.snapshot().await["measurements"]["bayi1"]["height"], 62);
    }
}
