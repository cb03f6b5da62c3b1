//! # REST API for the Measurement History
//!
//! Deleting is a two-step exchange: `POST /api/history/:id/delete-request`
//! returns a confirmation token and `DELETE /api/history/:id` redeems it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{error, info};

use super::mappers::HistoryMapper;
use super::ApiError;
use crate::AppState;
use shared::{ConfirmDeleteRequest, EditHistoryRequest};

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub q: Option<String>,
}

/// Refresh the history and filter it by `q`
pub async fn list_history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> impl IntoResponse {
    info!("GET /api/history - query: {:?}", query.q);

    let entries = match state.history.refresh().await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to load history: {}", e);
            return ApiError::from(e).into_response();
        }
    };

    let total = entries.len();
    let filtered = match query.q.as_deref() {
        Some(q) => state.history.filter(q).await,
        None => entries,
    };
    (StatusCode::OK, Json(HistoryMapper::to_list_dto(filtered, total, query.q))).into_response()
}

pub async fn edit_history(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(request): Json<EditHistoryRequest>,
) -> impl IntoResponse {
    info!("PUT /api/history/{} - request: {:?}", record_id, request);

    match state
        .history
        .edit(&record_id, &request.identity, &request.measurements)
        .await
    {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(e) => {
            error!("Failed to update history record: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

pub async fn request_delete(State(state): State<AppState>, Path(record_id): Path<String>) -> impl IntoResponse {
    info!("POST /api/history/{}/delete-request", record_id);

    match state.history.request_delete(&record_id).await {
        Ok(confirmation) => (StatusCode::OK, Json(HistoryMapper::to_delete_request_dto(confirmation))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn confirm_delete(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(request): Json<ConfirmDeleteRequest>,
) -> impl IntoResponse {
    info!("DELETE /api/history/{}", record_id);

    match state
        .history
        .confirm_delete(&record_id, &request.confirmation_token)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete history record: {}", e);
            ApiError::from(e).into_response()
        }
    }
}
