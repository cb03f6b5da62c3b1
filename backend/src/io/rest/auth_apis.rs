//! # REST API for the Anonymous Identity

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{info, warn};

use crate::identity::AuthState;
use crate::AppState;

/// Current auth state; signs in anonymously first when not authenticated
pub async fn get_auth_state(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/auth");

    let auth = state.context.identity().ensure_authenticated().await;
    if let AuthState::Failed(reason) = &auth {
        warn!("Anonymous identity unavailable: {}", reason);
    }
    (StatusCode::OK, Json(auth.to_response())).into_response()
}
