//! Test doubles shared by the unit tests of every layer.
//!
//! - [`ScriptedIdentityBackend`]: sign-in that succeeds or fails on demand
//! - [`FlakyStore`]: in-memory store with queued failures and a call counter
//! - [`GatedStore`]: in-memory store whose next read blocks until released
//! - [`send_json`]: one request through the router, JSON in and out

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower::ServiceExt;

use crate::context::AppContext;
use crate::error::{AuthError, StoreError};
use crate::identity::{Identity, IdentityBackend, IdentityProvider};
use crate::storage::{MemoryStore, RecordStore, StorePath};
use shared::{ChildIdentity, IdentityForm, MeasurementDraft, Sex};

pub struct ScriptedIdentityBackend {
    failure: Mutex<Option<String>>,
    lifetime: Mutex<Option<Duration>>,
    current: Mutex<Option<Identity>>,
    sign_in_calls: AtomicUsize,
}

impl ScriptedIdentityBackend {
    pub fn succeeding() -> Self {
        Self {
            failure: Mutex::new(None),
            lifetime: Mutex::new(None),
            current: Mutex::new(None),
            sign_in_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        let backend = Self::succeeding();
        backend.set_failure(Some(reason));
        backend
    }

    pub fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn set_lifetime(&self, lifetime: Option<Duration>) {
        *self.lifetime.lock().unwrap() = lifetime;
    }

    pub fn preload_identity(&self, user_id: &str) {
        *self.current.lock().unwrap() = Some(Identity {
            user_id: user_id.to_string(),
            token: format!("token-{}", user_id),
            expires_at: None,
        });
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBackend for ScriptedIdentityBackend {
    async fn current_identity(&self) -> Option<Identity> {
        self.current.lock().unwrap().clone()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let call = self.sign_in_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(AuthError::SignInFailed(reason));
        }
        let identity = Identity {
            user_id: format!("scripted-{}", call),
            token: format!("token-{}", call),
            expires_at: self.lifetime.lock().unwrap().map(|lifetime| Utc::now() + lifetime),
        };
        *self.current.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.current.lock().unwrap() = None;
        Ok(())
    }
}

/// Memory store that fails the next calls with queued errors
pub struct FlakyStore {
    inner: MemoryStore,
    failures: Mutex<VecDeque<StoreError>>,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, error: StoreError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Number of calls that reached the store, failed or not
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn read_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.enter()?;
        self.inner.read_subtree(path).await
    }

    async fn write_record(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.enter()?;
        self.inner.write_record(path, value).await
    }

    async fn update_fields(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError> {
        self.enter()?;
        self.inner.update_fields(path, partial).await
    }

    async fn delete_record(&self, path: &StorePath) -> Result<(), StoreError> {
        self.enter()?;
        self.inner.delete_record(path).await
    }
}

/// Memory store whose next read parks until [`GatedStore::release`]
pub struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl GatedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn read_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.inner.read_subtree(path).await
    }

    async fn write_record(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.inner.write_record(path, value).await
    }

    async fn update_fields(&self, path: &StorePath, partial: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.update_fields(path, partial).await
    }

    async fn delete_record(&self, path: &StorePath) -> Result<(), StoreError> {
        self.inner.delete_record(path).await
    }
}

pub fn context_with(backend: Arc<ScriptedIdentityBackend>, store: Arc<dyn RecordStore>) -> AppContext {
    AppContext::new(Arc::new(IdentityProvider::new(backend)), store)
}

pub fn memory_context(store: MemoryStore) -> AppContext {
    context_with(Arc::new(ScriptedIdentityBackend::succeeding()), Arc::new(store))
}

/// Two templates under `measurements`
pub fn seeded_templates() -> MemoryStore {
    MemoryStore::with_data(json!({
        "measurements": {
            "bayi1": {
                "height": 65.2,
                "weight_kg": 7.1,
                "head_circumference": 42.0,
                "body_temperature": 36.6
            },
            "bayi2": {
                "height": 70.0,
                "weight_kg": "8,4",
                "head_circumference": 44.5,
                "body_temperature": 36.9
            }
        }
    }))
}

pub fn budi() -> ChildIdentity {
    ChildIdentity {
        name: "Budi".to_string(),
        age_months: "6".to_string(),
        sex: Sex::Male,
        mother_name: "Sari".to_string(),
    }
}

pub fn budi_form() -> IdentityForm {
    IdentityForm {
        name: "Budi".to_string(),
        age_months: "6".to_string(),
        sex: Some(Sex::Male),
        mother_name: "Sari".to_string(),
    }
}

pub fn budi_measurements() -> MeasurementDraft {
    MeasurementDraft {
        height: "65.2".to_string(),
        weight_kg: "7.1".to_string(),
        head_circumference: "42".to_string(),
        body_temperature: "36.6".to_string(),
    }
}

/// A stored history record in the wire shape
pub fn history_record(name: &str, mother: &str, timestamp: &str) -> Value {
    json!({
        "nama": name,
        "umur": "6",
        "jk": "Perempuan",
        "ibu": mother,
        "height": 60.0,
        "weight_kg": 6.0,
        "head_circumference": 40.0,
        "body_temperature": 36.5,
        "timestamp": timestamp
    })
}

/// Send one request through `router` and decode the JSON body, if any
pub async fn send_json(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
