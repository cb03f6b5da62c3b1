//! # Application Context
//!
//! Owns the identity provider and the record store for the lifetime of the
//! process. Built once at start-up from [`AppConfig`] and shared by every
//! service; [`AppContext::shutdown`] is called on exit.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AppConfig, StoreConfig};
use crate::identity::{FirebaseAnonymousAuth, IdentityBackend, IdentityProvider, LocalAnonymousBackend};
use crate::storage::{FirebaseStore, JsonFileStore, MemoryStore, RecordStore};

#[derive(Clone)]
pub struct AppContext {
    identity: Arc<IdentityProvider>,
    store: Arc<dyn RecordStore>,
}

impl AppContext {
    pub fn new(identity: Arc<IdentityProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self { identity, store }
    }

    /// Wire up the configured store together with its identity backend
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        match &config.store {
            StoreConfig::Memory => {
                info!("Using in-memory record store");
                let identity = local_identity();
                Ok(Self::new(identity, Arc::new(MemoryStore::new())))
            }
            StoreConfig::File { path } => {
                info!("Using JSON file record store at {:?}", path);
                let store = JsonFileStore::open(path)
                    .await
                    .with_context(|| format!("Failed to open record store {:?}", path))?;
                Ok(Self::new(local_identity(), Arc::new(store)))
            }
            StoreConfig::Firebase {
                database_url,
                api_key,
                timeout_secs,
            } => {
                info!("Using Firebase record store at {}", database_url);
                let timeout = Duration::from_secs(*timeout_secs);
                let backend: Arc<dyn IdentityBackend> = Arc::new(
                    FirebaseAnonymousAuth::new(api_key.clone(), timeout)
                        .context("Failed to build identity client")?,
                );
                let identity = Arc::new(IdentityProvider::new(backend));
                let store = FirebaseStore::new(database_url, Arc::clone(&identity), timeout)
                    .context("Failed to build record store client")?;
                Ok(Self::new(identity, Arc::new(store)))
            }
        }
    }

    pub fn identity(&self) -> &Arc<IdentityProvider> {
        &self.identity
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Release the identity on exit
    pub async fn shutdown(&self) {
        let active = self.identity.active_subscriptions();
        if active > 0 {
            warn!("Shutting down with {} auth subscriptions still active", active);
        }
        if let Err(e) = self.identity.sign_out().await {
            warn!("Sign-out during shutdown failed: {}", e);
        }
        info!("Application context shut down");
    }
}

fn local_identity() -> Arc<IdentityProvider> {
    Arc::new(IdentityProvider::new(Arc::new(LocalAnonymousBackend::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AuthState;
    use crate::storage::StorePath;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_context_from_defaults() {
        let context = AppContext::from_config(&AppConfig::default()).await.unwrap();
        assert_eq!(context.identity().state(), AuthState::Pending);
        assert!(matches!(
            context.identity().ensure_authenticated().await,
            AuthState::Authenticated(_)
        ));
        assert_eq!(context.store().read_subtree(&StorePath::history()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_context_uses_configured_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let config = AppConfig {
            store: StoreConfig::File { path: path.clone() },
            ..AppConfig::default()
        };

        let context = AppContext::from_config(&config).await.unwrap();
        context
            .store()
            .write_record(&StorePath::parse("measurements/bayi1").unwrap(), json!({ "height": 60 }))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_shutdown_signs_out() {
        let context = AppContext::from_config(&AppConfig::default()).await.unwrap();
        context.identity().ensure_authenticated().await;

        context.shutdown().await;
        assert_eq!(context.identity().state(), AuthState::Pending);
    }
}
