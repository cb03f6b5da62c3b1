//! # REST API Interface Layer
//!
//! Axum handlers for every screen of the measurement flow. Handlers log the
//! request, call one domain operation and translate its result.
//!
//! ## Error Translation
//!
//! | Domain error | Status |
//! |---|---|
//! | Validation | 422 |
//! | Auth | 401 |
//! | Store: permission | 403 |
//! | Store: network | 503 |
//! | Store: unknown | 502 |
//! | Not found, closed session | 404 |
//! | Invalid handoff or delete confirmation | 400 |
//! | Already persisted, busy | 409 |
//!
//! Error bodies are [`shared::ErrorResponse`] and carry the notice the UI
//! should show.

pub mod auth_apis;
pub mod history_apis;
pub mod mappers;
pub mod nutrition_apis;
pub mod session_apis;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::error::{HistoryError, SessionError, StoreError};
use shared::{ErrorResponse, UserNotice};

/// Error response returned by every handler
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, message: String, notice: UserNotice) -> Self {
        Self {
            status,
            body: ErrorResponse {
                kind: kind.to_string(),
                message,
                notice: Some(notice),
                field_errors: Vec::new(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            message.into(),
            UserNotice::info("No data", "Nothing was found."),
        )
    }
}

fn store_status(error: &StoreError) -> (StatusCode, &'static str) {
    match error {
        StoreError::Permission(_) => (StatusCode::FORBIDDEN, "permission"),
        StoreError::Network(_) => (StatusCode::SERVICE_UNAVAILABLE, "network"),
        StoreError::Unknown(_) => (StatusCode::BAD_GATEWAY, "store"),
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        let (status, kind) = match &error {
            SessionError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            SessionError::Auth(_) => (StatusCode::UNAUTHORIZED, "auth"),
            SessionError::Store(store) => store_status(store),
            SessionError::InvalidHandoff(_) => (StatusCode::BAD_REQUEST, "invalid_handoff"),
            SessionError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SessionError::SessionClosed(_) => (StatusCode::NOT_FOUND, "session_closed"),
            SessionError::AlreadyPersisted(_) => (StatusCode::CONFLICT, "already_persisted"),
            SessionError::Busy(_) => (StatusCode::CONFLICT, "busy"),
        };
        let mut api_error = Self::new(status, kind, error.to_string(), error.notice());
        api_error.body.field_errors = error.field_errors();
        api_error
    }
}

impl From<HistoryError> for ApiError {
    fn from(error: HistoryError) -> Self {
        let (status, kind) = match &error {
            HistoryError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            HistoryError::Auth(_) => (StatusCode::UNAUTHORIZED, "auth"),
            HistoryError::Store(store) => store_status(store),
            HistoryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            HistoryError::InvalidConfirmation(_) => (StatusCode::BAD_REQUEST, "invalid_confirmation"),
        };
        let mut api_error = Self::new(status, kind, error.to_string(), error.notice());
        api_error.body.field_errors = error.field_errors();
        api_error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
