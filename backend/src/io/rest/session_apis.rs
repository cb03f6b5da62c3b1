//! # REST API for Measurement Sessions
//!
//! The identity form is validated statelessly; the measurement screen lives
//! in the session registry from `POST /api/sessions` until it is deleted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{error, info};

use super::mappers::{IdentityMapper, SessionMapper};
use super::ApiError;
use crate::domain::{IdentityHandoff, IdentityStep};
use crate::AppState;
use shared::{IdentityForm, SetModeRequest, StartSessionRequest, UpdateDraftRequest};

/// Gate of the identity screen
pub async fn validate_identity(Json(form): Json<IdentityForm>) -> impl IntoResponse {
    info!("POST /api/identity/validate");

    let step = IdentityStep::from_form(form);
    (StatusCode::OK, Json(IdentityMapper::to_validation_dto(&step))).into_response()
}

/// Mount a measurement screen from the identity handoff
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> impl IntoResponse {
    info!("POST /api/sessions");

    match state.sessions.mount(&IdentityHandoff::from_raw(request.handoff)).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => {
            error!("Failed to start measurement session: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

pub async fn get_session(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    info!("GET /api/sessions/{}", session_id);

    match state.sessions.snapshot(&session_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Unmount the screen
pub async fn close_session(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    info!("DELETE /api/sessions/{}", session_id);

    match state.sessions.unmount(&session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Load the template keys and the first template
pub async fn load_templates(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    info!("POST /api/sessions/{}/templates", session_id);

    match state.sessions.load_templates(&session_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => {
            error!("Failed to load measurement templates: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

pub async fn select_template(
    State(state): State<AppState>,
    Path((session_id, key)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("POST /api/sessions/{}/templates/{}", session_id, key);

    match state.sessions.select_template(&session_id, &key).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => {
            error!("Failed to fetch measurement template {}: {}", key, e);
            ApiError::from(e).into_response()
        }
    }
}

pub async fn update_draft(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<UpdateDraftRequest>,
) -> impl IntoResponse {
    info!("PUT /api/sessions/{}/draft - request: {:?}", session_id, request);

    match state.sessions.update_draft(&session_id, request.edits()).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn set_mode(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SetModeRequest>,
) -> impl IntoResponse {
    info!("PUT /api/sessions/{}/mode - {:?}", session_id, request.mode);

    match state.sessions.set_mode(&session_id, request.mode).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Persist the session and send the UI to the history screen
pub async fn save_session(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    info!("POST /api/sessions/{}/save", session_id);

    match state.sessions.save(&session_id).await {
        Ok(entry) => (StatusCode::CREATED, Json(SessionMapper::to_save_dto(entry))).into_response(),
        Err(e) => {
            error!("Failed to save measurement session: {}", e);
            ApiError::from(e).into_response()
        }
    }
}
