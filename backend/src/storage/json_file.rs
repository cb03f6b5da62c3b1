//! # JSON File Store
//!
//! Keeps the whole record tree in a single JSON file, e.g.
//!
//! ```text
//! store.json
//! {
//!   "measurements": { "bayi1": { "height": 65.2, ... } },
//!   "Riwayat": { "1719822600000": { "nama": "Budi", ... } }
//! }
//! ```
//!
//! Every mutation rewrites the file through a temp file and a rename, and the
//! in-memory tree only changes once the file write succeeded.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::path::StorePath;
use super::traits::RecordStore;
use super::tree;
use crate::error::StoreError;

#[derive(Clone)]
pub struct JsonFileStore {
    file_path: PathBuf,
    root: Arc<Mutex<Value>>,
}

impl JsonFileStore {
    /// Open the store at `file_path`, starting empty when the file is missing
    pub async fn open<P: AsRef<Path>>(file_path: P) -> Result<Self, StoreError> {
        let file_path = file_path.as_ref().to_path_buf();

        let root = match fs::read_to_string(&file_path).await {
            Ok(content) if content.trim().is_empty() => Value::Object(Map::new()),
            Ok(content) => {
                let value: Value = serde_json::from_str(&content).map_err(|e| {
                    StoreError::Unknown(format!("corrupt store file {}: {}", file_path.display(), e))
                })?;
                if !value.is_object() {
                    return Err(StoreError::Unknown(format!(
                        "store file {} does not hold a JSON object",
                        file_path.display()
                    )));
                }
                info!("Loaded record store from {}", file_path.display());
                value
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No store file at {}, starting empty", file_path.display());
                Value::Object(Map::new())
            }
            Err(e) => return Err(io_error(&file_path, e)),
        };

        Ok(Self {
            file_path,
            root: Arc::new(Mutex::new(root)),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    async fn persist(&self, tree: &Value) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| io_error(parent, e))?;
            }
        }

        let content = serde_json::to_string_pretty(tree).map_err(|e| StoreError::Unknown(e.to_string()))?;

        // Atomic write using temp file
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content).await.map_err(|e| io_error(&temp_path, e))?;
        fs::rename(&temp_path, &self.file_path)
            .await
            .map_err(|e| io_error(&self.file_path, e))?;

        debug!("Saved record store to {}", self.file_path.display());
        Ok(())
    }

    async fn mutate<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Value) -> Result<(), StoreError> + Send,
    {
        let mut root = self.root.lock().await;
        let mut next = root.clone();
        apply(&mut next)?;
        if let Err(e) = self.persist(&next).await {
            error!("Failed to persist record store: {}", e);
            return Err(e);
        }
        *root = next;
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    match e.kind() {
        ErrorKind::PermissionDenied => StoreError::Permission(format!("{}: {}", path.display(), e)),
        _ => StoreError::Unknown(format!("{}: {}", path.display(), e)),
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        Ok(tree::read(&*self.root.lock().await, path))
    }

    async fn write_record(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.mutate(|root| {
            tree::write(root, path, value);
            Ok(())
        })
        .await
    }

    async fn update_fields(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError> {
        self.mutate(|root| tree::update(root, path, partial)).await
    }

    async fn delete_record(&self, path: &StorePath) -> Result<(), StoreError> {
        self.mutate(|root| {
            tree::remove(root, path);
            Ok(())
        })
        .await
    }
}
