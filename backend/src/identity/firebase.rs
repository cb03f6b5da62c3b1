//! Anonymous sign-in against the Firebase Identity Toolkit REST API.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration as StdDuration;
use tracing::{debug, error};

use super::{Identity, IdentityBackend};
use crate::error::AuthError;

const SIGN_UP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signUp";
const USER_AGENT: &str = concat!("antropometri/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    local_id: String,
    /// Lifetime in seconds, sent as a string
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity Toolkit client issuing anonymous users
pub struct FirebaseAnonymousAuth {
    http_client: reqwest::Client,
    api_key: String,
    sign_up_url: String,
    current: Mutex<Option<Identity>>,
}

impl FirebaseAnonymousAuth {
    pub fn new(api_key: String, timeout: StdDuration) -> Result<Self, AuthError> {
        Self::with_endpoint(api_key, SIGN_UP_URL.to_string(), timeout)
    }

    /// Point the client at another sign-up endpoint, e.g. the auth emulator
    pub fn with_endpoint(api_key: String, sign_up_url: String, timeout: StdDuration) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::SignInFailed(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            sign_up_url,
            current: Mutex::new(None),
        })
    }

    fn remember(&self, identity: Option<Identity>) {
        *self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = identity;
    }
}

fn identity_from_response(response: SignUpResponse) -> Identity {
    let expires_at = response
        .expires_in
        .as_deref()
        .and_then(|secs| secs.parse::<i64>().ok())
        .map(|secs| Utc::now() + Duration::seconds(secs));

    Identity {
        user_id: response.local_id,
        token: response.id_token,
        expires_at,
    }
}

#[async_trait]
impl IdentityBackend for FirebaseAnonymousAuth {
    async fn current_identity(&self) -> Option<Identity> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        debug!("Requesting anonymous identity from {}", self.sign_up_url);

        let response = self
            .http_client
            .post(&self.sign_up_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&SignUpRequest {
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| AuthError::SignInFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            error!("Identity Toolkit rejected anonymous sign-up ({}): {}", status, reason);
            return Err(AuthError::SignInFailed(format!("{}: {}", status.as_u16(), reason)));
        }

        let payload: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AuthError::SignInFailed(format!("unreadable response: {}", e)))?;

        let identity = identity_from_response(payload);
        self.remember(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Anonymous sessions are only held client-side
        self.remember(None);
        Ok(())
    }
}
