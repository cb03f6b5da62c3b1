//! # History Repository
//!
//! Lists, filters, edits and deletes the records under `Riwayat`.
//!
//! - `refresh()` replaces the cached list with the store's contents, newest
//!   first. Entries that cannot be decoded are skipped with a warning.
//! - `filter()` is a pure, case-insensitive search over the cached list.
//! - `edit()` overwrites every field of a cached record and refreshes its
//!   timestamp.
//! - Deletion takes two steps: `request_delete()` issues a confirmation and
//!   `confirm_delete()` redeems it. Deleting a record that is already gone
//!   succeeds.

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::validation::{validate_identity, validate_measurements};
use crate::context::AppContext;
use crate::error::{HistoryError, StoreError};
use crate::identity::{AuthState, AuthSubscription};
use crate::storage::StorePath;
use shared::{HistoryEntry, IdentityForm, MeasurementDraft, MeasurementRecord};

/// How long a delete confirmation stays redeemable
pub const CONFIRMATION_TTL_MINUTES: i64 = 5;

/// Proof that the caregiver was asked before a record is removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    pub id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct HistoryRepository {
    context: AppContext,
    entries: Mutex<Vec<HistoryEntry>>,
    confirmations: Mutex<HashMap<String, DeleteConfirmation>>,
    subscription: AuthSubscription,
}

impl HistoryRepository {
    pub fn new(context: AppContext) -> Self {
        let subscription = context.identity().subscribe();
        Self {
            context,
            entries: Mutex::new(Vec::new()),
            confirmations: Mutex::new(HashMap::new()),
            subscription,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        self.subscription.current()
    }

    /// Fetch every record, newest first
    pub async fn refresh(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        info!("Refreshing measurement history");
        self.context.identity().require_authenticated().await?;

        let subtree = self.context.store().read_subtree(&StorePath::history()).await?;
        let mut entries = match subtree {
            None => {
                info!("No measurement history stored yet");
                Vec::new()
            }
            Some(Value::Object(map)) => map.into_iter().filter_map(|(id, value)| decode_entry(id, value)).collect(),
            Some(_) => {
                warn!("History subtree is not an object, ignoring it");
                Vec::new()
            }
        };
        sort_entries(&mut entries);

        info!("Found {} history records", entries.len());
        *self.entries.lock().await = entries.clone();
        Ok(entries)
    }

    /// Records from the last refresh
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn filter(&self, query: &str) -> Vec<HistoryEntry> {
        filter_entries(&self.entries.lock().await, query)
    }

    /// Replace every field of record `id` and stamp it with the current time
    pub async fn edit(
        &self,
        id: &str,
        identity: &IdentityForm,
        measurements: &MeasurementDraft,
    ) -> Result<HistoryEntry, HistoryError> {
        info!("Editing history record: {}", id);

        // Validate both halves of the record, reporting every problem
        let identity = validate_identity(identity);
        let measurements = validate_measurements(measurements);
        let (identity, measurements) = match (identity, measurements) {
            (Ok(identity), Ok(measurements)) => (identity, measurements),
            (identity, measurements) => {
                let mut errors = identity.err().unwrap_or_default();
                errors.extend(measurements.err().unwrap_or_default());
                return Err(HistoryError::Validation(errors));
            }
        };

        if !self.entries.lock().await.iter().any(|entry| entry.id == id) {
            warn!("History record not found: {}", id);
            return Err(HistoryError::NotFound(id.to_string()));
        }

        self.context.identity().require_authenticated().await?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let record = measurements.into_record(identity, timestamp);
        let fields = match serde_json::to_value(&record).map_err(|e| StoreError::Unknown(e.to_string()))? {
            Value::Object(fields) => fields,
            _ => return Err(StoreError::Unknown("record did not encode as an object".to_string()).into()),
        };

        let path = StorePath::history().child(id)?;
        self.context.store().update_fields(&path, fields).await?;

        let entry = HistoryEntry {
            id: id.to_string(),
            record,
        };

        // Reconcile the cached list
        let mut entries = self.entries.lock().await;
        match entries.iter_mut().find(|cached| cached.id == id) {
            Some(cached) => *cached = entry.clone(),
            None => entries.push(entry.clone()),
        }
        sort_entries(&mut entries);

        info!("Updated history record: {}", id);
        Ok(entry)
    }

    /// Issue a confirmation for deleting record `id`
    pub async fn request_delete(&self, id: &str) -> Result<DeleteConfirmation, HistoryError> {
        StorePath::history().child(id)?;

        let confirmation = DeleteConfirmation {
            id: id.to_string(),
            token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + Duration::minutes(CONFIRMATION_TTL_MINUTES),
        };

        let mut confirmations = self.confirmations.lock().await;
        let now = Utc::now();
        confirmations.retain(|_, pending| pending.expires_at > now);
        confirmations.insert(confirmation.token.clone(), confirmation.clone());

        info!("Delete of history record {} awaiting confirmation", id);
        Ok(confirmation)
    }

    /// Remove record `id`; the confirmation stays valid if the store call fails
    pub async fn confirm_delete(&self, id: &str, token: &str) -> Result<(), HistoryError> {
        info!("Deleting history record: {}", id);

        let valid = self
            .confirmations
            .lock()
            .await
            .get(token)
            .is_some_and(|pending| pending.id == id && pending.expires_at > Utc::now());
        if !valid {
            warn!("Rejected delete of {} without a valid confirmation", id);
            return Err(HistoryError::InvalidConfirmation(id.to_string()));
        }

        self.context.identity().require_authenticated().await?;

        let path = StorePath::history().child(id)?;
        self.context.store().delete_record(&path).await?;

        self.confirmations.lock().await.remove(token);
        self.entries.lock().await.retain(|entry| entry.id != id);

        info!("Deleted history record: {}", id);
        Ok(())
    }
}

fn decode_entry(id: String, value: Value) -> Option<HistoryEntry> {
    match serde_json::from_value::<MeasurementRecord>(value) {
        Ok(record) => Some(HistoryEntry { id, record }),
        Err(e) => {
            warn!("Skipping undecodable history record {}: {}", id, e);
            None
        }
    }
}

fn parsed_timestamp(entry: &HistoryEntry) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(&entry.record.timestamp).ok()
}

/// Newest first; unparseable timestamps last; ties by key, highest first
fn sort_entries(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| {
        let by_time = match (parsed_timestamp(a), parsed_timestamp(b)) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time.then_with(|| {
            let key = |entry: &HistoryEntry| (entry.created_millis().ok(), entry.id.clone());
            key(b).cmp(&key(a))
        })
    });
}

/// Case-insensitive substring match on the child's or the mother's name.
///
/// A blank query returns every entry.
pub fn filter_entries(entries: &[HistoryEntry], query: &str) -> Vec<HistoryEntry> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return entries.to_vec();
    }

    entries
        .iter()
        .filter(|entry| {
            entry.record.identity.name.to_lowercase().contains(&query)
                || entry.record.identity.mother_name.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::IdentityHandoff;
    use crate::domain::session_registry::SessionRegistry;
    use crate::domain::session_service::SessionService;
    use crate::error::AuthError;
    use crate::storage::{MemoryStore, RecordStore};
    use crate::test_utils::{
        budi, budi_form, budi_measurements, context_with, history_record, memory_context, FlakyStore,
        ScriptedIdentityBackend,
    };
    use serde_json::json;
    use shared::{MeasurementField, Sex};
    use std::sync::Arc;

    fn seeded_history() -> MemoryStore {
        MemoryStore::with_data(json!({
            "Riwayat": {
                "1719822600000": history_record("Ani", "Sari Dewi", "2024-07-01T08:30:00.000Z"),
                "1719909000000": history_record("Rina", "Wati", "2024-07-02T08:30:00.000Z"),
                "1719736200000": history_record("Dodi", "Maya", "2024-06-30T08:30:00.000Z")
            }
        }))
    }

    fn ids(entries: &[HistoryEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_saved_session_appears_in_history() {
        let store = MemoryStore::new();
        let context = memory_context(store);
        let registry = SessionRegistry::new(SessionService::new(context.clone()));
        let history = HistoryRepository::new(context);

        let before = Utc::now();
        let id = registry
            .mount(&IdentityHandoff::encode(&budi()).unwrap())
            .await
            .unwrap()
            .session_id;
        let draft = budi_measurements();
        let edits = MeasurementField::ALL
            .iter()
            .map(|field| (*field, draft.get(*field).to_string()))
            .collect();
        registry.update_draft(&id, edits).await.unwrap();
        let saved = registry.save(&id).await.unwrap();
        let after = Utc::now();

        let entries = history.refresh().await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry, &saved);
        assert_eq!(entry.record.identity.name, "Budi");
        assert_eq!(entry.record.identity.age_months, "6");
        assert_eq!(entry.record.identity.sex, Sex::Male);
        assert_eq!(entry.record.identity.mother_name, "Sari");
        assert_eq!(entry.record.height, 65.2);
        assert_eq!(entry.record.weight_kg, 7.1);
        assert_eq!(entry.record.head_circumference, 42.0);
        assert_eq!(entry.record.body_temperature, 36.6);

        let saved_at = DateTime::parse_from_rfc3339(&entry.record.timestamp).unwrap();
        assert!(saved_at.timestamp_millis() >= before.timestamp_millis());
        assert!(saved_at.timestamp_millis() <= after.timestamp_millis());
    }

    #[tokio::test]
    async fn test_refresh_sorts_newest_first() {
        let history = HistoryRepository::new(memory_context(seeded_history()));
        let entries = history.refresh().await.unwrap();
        assert_eq!(ids(&entries), vec!["1719909000000", "1719822600000", "1719736200000"]);
    }

    #[tokio::test]
    async fn test_absent_history_is_empty() {
        let history = HistoryRepository::new(memory_context(MemoryStore::new()));
        assert!(history.refresh().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_skips_undecodable_and_reads_legacy_strings() {
        let mut legacy = history_record("Lama", "Ina", "2024-05-01T00:00:00.000Z");
        legacy["height"] = json!("61.5");
        let mut not_finite = history_record("Aneh", "Ina", "2024-05-02T00:00:00.000Z");
        not_finite["height"] = json!("NaN");
        not_finite["weight_kg"] = json!("inf");
        let store = MemoryStore::with_data(json!({
            "Riwayat": {
                "1": legacy,
                "2": { "nama": "Rusak" },
                "3": history_record("Tanpa", "Waktu", "kemarin"),
                "4": not_finite
            }
        }));
        let history = HistoryRepository::new(memory_context(store));

        let entries = history.refresh().await.unwrap();
        assert_eq!(ids(&entries), vec!["1", "3"]);
        assert_eq!(entries[0].record.height, 61.5);
    }

    #[test]
    fn test_sort_ties_by_key() {
        let entry = |id: &str, timestamp: &str| HistoryEntry {
            id: id.to_string(),
            record: serde_json::from_value(history_record("A", "B", timestamp)).unwrap(),
        };
        let mut entries = vec![
            entry("100", "2024-07-01T08:30:00.000Z"),
            entry("200", "2024-07-01T08:30:00.000Z"),
            entry("50", "bukan waktu"),
            entry("300", "2024-07-01T09:30:00.000+01:00"),
        ];
        sort_entries(&mut entries);
        assert_eq!(ids(&entries), vec!["300", "200", "100", "50"]);
    }

    #[tokio::test]
    async fn test_filter_is_case_insensitive() {
        let history = HistoryRepository::new(memory_context(seeded_history()));
        history.refresh().await.unwrap();

        let matches = history.filter("sari").await;
        assert_eq!(ids(&matches), vec!["1719822600000"]);

        assert_eq!(ids(&history.filter("RINA").await), vec!["1719909000000"]);
        assert_eq!(history.filter("   ").await.len(), 3);
        assert!(history.filter("zzz").await.is_empty());
    }

    #[tokio::test]
    async fn test_filter_is_idempotent() {
        let history = HistoryRepository::new(memory_context(seeded_history()));
        let entries = history.refresh().await.unwrap();

        let first = history.filter("a").await;
        let second = history.filter("a").await;
        assert_eq!(first, second);
        assert!(!first.is_empty());
        assert_eq!(history.entries().await, entries);
    }

    #[tokio::test]
    async fn test_edit_overwrites_record() {
        let store = seeded_history();
        let history = HistoryRepository::new(memory_context(store.clone()));
        history.refresh().await.unwrap();

        let mut measurements = budi_measurements();
        measurements.weight_kg = "7,5".to_string();
        let entry = history
            .edit("1719736200000", &budi_form(), &measurements)
            .await
            .unwrap();
        assert_eq!(entry.record.identity, budi());
        assert_eq!(entry.record.weight_kg, 7.5);

        let stored = store
            .read_subtree(&StorePath::history().child("1719736200000").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["nama"], "Budi");
        assert_eq!(stored["weight_kg"], 7.5);
        assert_eq!(stored["timestamp"], json!(entry.record.timestamp));

        // The edited record now has the newest timestamp
        assert_eq!(history.entries().await[0].id, "1719736200000");
    }

    #[tokio::test]
    async fn test_edit_validates_and_requires_known_id() {
        let history = HistoryRepository::new(memory_context(seeded_history()));
        history.refresh().await.unwrap();

        let mut form = budi_form();
        form.name = String::new();
        let mut measurements = budi_measurements();
        measurements.height = "tinggi".to_string();
        let result = history.edit("1719736200000", &form, &measurements).await;
        assert!(matches!(result, Err(HistoryError::Validation(errors)) if errors.len() == 2));

        let result = history.edit("404", &budi_form(), &budi_measurements()).await;
        assert!(matches!(result, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let store = seeded_history();
        let history = HistoryRepository::new(memory_context(store.clone()));
        history.refresh().await.unwrap();

        let confirmation = history.request_delete("1719822600000").await.unwrap();
        assert!(matches!(
            history.confirm_delete("1719822600000", "wrong").await,
            Err(HistoryError::InvalidConfirmation(_))
        ));
        assert!(matches!(
            history.confirm_delete("1719909000000", &confirmation.token).await,
            Err(HistoryError::InvalidConfirmation(_))
        ));

        history
            .confirm_delete("1719822600000", &confirmation.token)
            .await
            .unwrap();
        assert_eq!(history.entries().await.len(), 2);
        assert_eq!(history.refresh().await.unwrap().len(), 2);

        // Tokens are single use
        assert!(history
            .confirm_delete("1719822600000", &confirmation.token)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_a_no_op() {
        let history = HistoryRepository::new(memory_context(seeded_history()));
        history.refresh().await.unwrap();

        let confirmation = history.request_delete("1234").await.unwrap();
        history.confirm_delete("1234", &confirmation.token).await.unwrap();
        assert_eq!(history.refresh().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_confirmation() {
        let store = Arc::new(FlakyStore::new(seeded_history()));
        let context = context_with(Arc::new(ScriptedIdentityBackend::succeeding()), store.clone());
        let history = HistoryRepository::new(context);
        history.refresh().await.unwrap();

        let confirmation = history.request_delete("1719822600000").await.unwrap();
        store.fail_next(StoreError::Permission("denied".to_string()));
        assert!(matches!(
            history.confirm_delete("1719822600000", &confirmation.token).await,
            Err(HistoryError::Store(StoreError::Permission(_)))
        ));
        assert_eq!(history.entries().await.len(), 3);

        history
            .confirm_delete("1719822600000", &confirmation.token)
            .await
            .unwrap();
        assert_eq!(history.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_blocks_history_without_store_calls() {
        let store = Arc::new(FlakyStore::new(seeded_history()));
        let context = context_with(Arc::new(ScriptedIdentityBackend::failing("offline")), store.clone());
        let history = HistoryRepository::new(context);

        assert!(matches!(
            history.refresh().await,
            Err(HistoryError::Auth(AuthError::SignInFailed(_)))
        ));
        let confirmation = history.request_delete("1719822600000").await.unwrap();
        assert!(matches!(
            history.confirm_delete("1719822600000", &confirmation.token).await,
            Err(HistoryError::Auth(_))
        ));
        assert_eq!(store.calls(), 0);
        assert!(matches!(history.auth_state(), AuthState::Failed(_)));
    }
}
