//! In-process anonymous identities for local stores.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{Identity, IdentityBackend};
use crate::error::AuthError;

/// Issues random anonymous tokens without any remote service
#[derive(Default)]
pub struct LocalAnonymousBackend {
    current: Mutex<Option<Identity>>,
    lifetime: Option<Duration>,
}

impl LocalAnonymousBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens expire after `lifetime` and are then re-issued
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            current: Mutex::new(None),
            lifetime: Some(lifetime),
        }
    }
}

#[async_trait]
impl IdentityBackend for LocalAnonymousBackend {
    async fn current_identity(&self) -> Option<Identity> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let identity = Identity {
            user_id: format!("anon-{}", Uuid::new_v4().simple()),
            token: Uuid::new_v4().to_string(),
            expires_at: self.lifetime.map(|lifetime| Utc::now() + lifetime),
        };
        debug!("Issued local anonymous identity {}", identity.user_id);
        *self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}
