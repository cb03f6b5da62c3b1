//! # Identity Module
//!
//! Provisions the anonymous identity every store call depends on.
//!
//! The [`IdentityProvider`] owns the current [`AuthState`] and broadcasts every
//! transition over a `tokio::sync::watch` channel. Screens take one
//! [`AuthSubscription`] when they mount and release it by dropping it when they
//! unmount. Before a screen issues its first store call it goes through
//! [`IdentityProvider::require_authenticated`], which either yields the
//! identity or an [`AuthError`]; on error no store call may be made.
//!
//! Sign-in itself is delegated to an [`IdentityBackend`]:
//!
//! - [`local::LocalAnonymousBackend`]: issues tokens in-process
//! - [`firebase::FirebaseAnonymousAuth`]: Identity Toolkit anonymous sign-up

pub mod firebase;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::error::AuthError;
use shared::{AuthStateResponse, AuthStatus};

pub use firebase::FirebaseAnonymousAuth;
pub use local::LocalAnonymousBackend;

/// An anonymous session issued by the identity backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Pending,
    Authenticated(Identity),
    Failed(String),
}

impl AuthState {
    pub fn status(&self) -> AuthStatus {
        match self {
            AuthState::Pending => AuthStatus::Pending,
            AuthState::Authenticated(_) => AuthStatus::Authenticated,
            AuthState::Failed(_) => AuthStatus::Failed,
        }
    }

    pub fn to_response(&self) -> AuthStateResponse {
        match self {
            AuthState::Pending => AuthStateResponse {
                status: AuthStatus::Pending,
                user_id: None,
                message: None,
            },
            AuthState::Authenticated(identity) => AuthStateResponse {
                status: AuthStatus::Authenticated,
                user_id: Some(identity.user_id.clone()),
                message: None,
            },
            AuthState::Failed(reason) => AuthStateResponse {
                status: AuthStatus::Failed,
                user_id: None,
                message: Some(reason.clone()),
            },
        }
    }
}

/// Source of anonymous identities
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Identity persisted from an earlier sign-in, if any
    async fn current_identity(&self) -> Option<Identity>;

    /// Request a fresh anonymous identity
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;

    /// Forget the current identity
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Owns the auth state and hands out subscriptions to it
pub struct IdentityProvider {
    backend: Arc<dyn IdentityBackend>,
    state_tx: watch::Sender<AuthState>,
    subscriptions: Arc<AtomicUsize>,
    // Serializes sign-in so concurrent screens share one issuance
    sign_in: Mutex<()>,
}

impl IdentityProvider {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Pending);
        Self {
            backend,
            state_tx,
            subscriptions: Arc::new(AtomicUsize::new(0)),
            sign_in: Mutex::new(()),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Token of the current identity, if authenticated and not expired
    pub fn current_token(&self) -> Option<String> {
        match &*self.state_tx.borrow() {
            AuthState::Authenticated(identity) if identity.is_valid_at(Utc::now()) => Some(identity.token.clone()),
            _ => None,
        }
    }

    /// Subscribe to auth-state transitions; drop the handle to unsubscribe
    pub fn subscribe(&self) -> AuthSubscription {
        let active = self.subscriptions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Auth subscription acquired ({} active)", active);
        AuthSubscription {
            receiver: self.state_tx.subscribe(),
            counter: Arc::clone(&self.subscriptions),
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Reuse an existing identity or request a new anonymous one.
    ///
    /// Always leaves the state in `Authenticated` or `Failed`.
    pub async fn ensure_authenticated(&self) -> AuthState {
        let _guard = self.sign_in.lock().await;

        let current = self.state();
        if let AuthState::Authenticated(identity) = &current {
            if identity.is_valid_at(Utc::now()) {
                return current;
            }
            info!("Anonymous identity {} expired, signing in again", identity.user_id);
        }

        self.state_tx.send_replace(AuthState::Pending);

        let existing = self
            .backend
            .current_identity()
            .await
            .filter(|identity| identity.is_valid_at(Utc::now()));

        let next = match existing {
            Some(identity) => {
                info!("Reusing anonymous identity {}", identity.user_id);
                AuthState::Authenticated(identity)
            }
            None => match self.backend.sign_in_anonymously().await {
                Ok(identity) => {
                    info!("Signed in anonymously as {}", identity.user_id);
                    AuthState::Authenticated(identity)
                }
                Err(e) => {
                    error!("Anonymous sign-in failed: {}", e);
                    AuthState::Failed(e.to_string())
                }
            },
        };

        self.state_tx.send_replace(next.clone());
        next
    }

    /// Gate for store access.
    ///
    /// A `Failed` state is returned as an error without retrying; retries
    /// happen only through an explicit [`IdentityProvider::ensure_authenticated`].
    pub async fn require_authenticated(&self) -> Result<Identity, AuthError> {
        let state = match self.state() {
            AuthState::Authenticated(identity) if identity.is_valid_at(Utc::now()) => return Ok(identity),
            AuthState::Failed(reason) => return Err(AuthError::SignInFailed(reason)),
            _ => self.ensure_authenticated().await,
        };

        match state {
            AuthState::Authenticated(identity) => Ok(identity),
            AuthState::Failed(reason) => Err(AuthError::SignInFailed(reason)),
            AuthState::Pending => Err(AuthError::Closed),
        }
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let _guard = self.sign_in.lock().await;
        self.backend.sign_out().await?;
        self.state_tx.send_replace(AuthState::Pending);
        info!("Signed out anonymous identity");
        Ok(())
    }
}

/// Scoped subscription to auth-state changes.
///
/// The subscription is released when the handle is dropped or cancelled.
pub struct AuthSubscription {
    receiver: watch::Receiver<AuthState>,
    counter: Arc<AtomicUsize>,
}

impl AuthSubscription {
    pub fn current(&self) -> AuthState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next transition; `None` once the provider is gone
    pub async fn changed(&mut self) -> Option<AuthState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn cancel(self) {}
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        debug!("Auth subscription released ({} active)", remaining);
    }
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("state", &*self.receiver.borrow())
            .finish()
    }
}
