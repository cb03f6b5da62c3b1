use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::keys::RecordKeyGenerator;
use super::validation::Measurements;
use crate::context::AppContext;
use crate::error::{SessionError, StoreError};
use crate::identity::IdentityProvider;
use crate::storage::StorePath;
use shared::{ChildIdentity, HistoryEntry, MeasurementTemplate};

/// Store operations behind the measurement screen.
///
/// Every call passes the auth gate first; when it fails no store call is made.
#[derive(Clone)]
pub struct SessionService {
    context: AppContext,
    keys: Arc<RecordKeyGenerator>,
}

impl SessionService {
    pub fn new(context: AppContext) -> Self {
        Self {
            context,
            keys: Arc::new(RecordKeyGenerator::new()),
        }
    }

    pub fn identity(&self) -> &Arc<IdentityProvider> {
        self.context.identity()
    }

    /// Keys of the templates under `measurements`
    pub async fn list_template_keys(&self) -> Result<Vec<String>, SessionError> {
        info!("Listing measurement templates");
        self.context.identity().require_authenticated().await?;

        let keys = match self.context.store().read_subtree(&StorePath::templates()).await? {
            None => Vec::new(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(_) => {
                warn!("Templates subtree is not an object, ignoring it");
                Vec::new()
            }
        };

        info!("Found {} measurement templates", keys.len());
        Ok(keys)
    }

    pub async fn fetch_template(&self, key: &str) -> Result<Option<MeasurementTemplate>, SessionError> {
        info!("Fetching measurement template: {}", key);
        self.context.identity().require_authenticated().await?;

        let path = StorePath::templates().child(key)?;
        let Some(value) = self.context.store().read_subtree(&path).await? else {
            warn!("Measurement template not found: {}", key);
            return Ok(None);
        };

        let template: MeasurementTemplate = serde_json::from_value(value)
            .map_err(|e| StoreError::Unknown(format!("malformed template {}: {}", key, e)))?;
        Ok(Some(template))
    }

    /// Write a completed session to `Riwayat/<key>`
    pub async fn persist(&self, identity: ChildIdentity, measurements: Measurements) -> Result<HistoryEntry, SessionError> {
        info!("Saving measurement session: name={}, mother={}", identity.name, identity.mother_name);
        self.context.identity().require_authenticated().await?;

        // Generate key and timestamp
        let now = Utc::now();
        let id = HistoryEntry::generate_id(self.keys.next_key(now.timestamp_millis()));
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        let record = measurements.into_record(identity, timestamp);
        let value = serde_json::to_value(&record).map_err(|e| StoreError::Unknown(e.to_string()))?;

        let path = StorePath::history().child(&id)?;
        self.context.store().write_record(&path, value).await?;

        info!("Saved measurement session {} for {}", id, record.identity.name);
        Ok(HistoryEntry { id, record })
    }
}
