//! # Antropometri Backend
//!
//! Records infant anthropometric measurement sessions (height, weight, head
//! circumference, body temperature) against a remote record store and lets a
//! caregiver browse, edit and delete the saved history.
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST API, handlers)
//!     ↓
//! Domain Layer (session builder, history, nutrition)
//!     ↓
//! Identity + Storage (anonymous sign-in, record store adapters)
//! ```
//!
//! ## Key Responsibilities
//!
//! - Build the [`AppContext`] from configuration and authenticate on start-up
//! - Set up the REST API router with CORS and request tracing

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod identity;
pub mod io;
pub mod logging;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::AppConfig;
pub use context::AppContext;

use crate::domain::{HistoryRepository, SessionRegistry, SessionService};
use crate::identity::AuthState;

/// Main application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub context: AppContext,
    pub sessions: Arc<SessionRegistry>,
    pub history: Arc<HistoryRepository>,
}

impl AppState {
    pub fn new(context: AppContext) -> Self {
        let sessions = Arc::new(SessionRegistry::new(SessionService::new(context.clone())));
        let history = Arc::new(HistoryRepository::new(context.clone()));
        Self {
            context,
            sessions,
            history,
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    info!("Setting up record store");
    let context = AppContext::from_config(config)
        .await
        .context("Failed to set up application context")?;

    info!("Signing in anonymously");
    match context.identity().ensure_authenticated().await {
        AuthState::Authenticated(identity) => info!("Authenticated as {}", identity.user_id),
        AuthState::Failed(reason) => warn!("Starting without an identity: {}", reason),
        AuthState::Pending => warn!("Anonymous sign-in still pending"),
    }

    info!("Setting up application state");
    Ok(AppState::new(context))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, cors_origin: Option<&str>) -> Router {
    // CORS setup to allow the frontend to make requests
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    let cors = match cors_origin.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS origin: {}", e);
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    };

    let api_routes = Router::new()
        .route("/auth", get(io::get_auth_state))
        .route("/identity/validate", post(io::validate_identity))
        .route("/sessions", post(io::start_session))
        .route("/sessions/:id", get(io::get_session).delete(io::close_session))
        .route("/sessions/:id/templates", post(io::load_templates))
        .route("/sessions/:id/templates/:key", post(io::select_template))
        .route("/sessions/:id/draft", axum::routing::put(io::update_draft))
        .route("/sessions/:id/mode", axum::routing::put(io::set_mode))
        .route("/sessions/:id/save", post(io::save_session))
        .route("/history", get(io::list_history))
        .route("/history/:id", axum::routing::put(io::edit_history).delete(io::confirm_delete))
        .route("/history/:id/delete-request", post(io::request_delete))
        .route("/nutrition", get(io::list_nutrition))
        .route("/nutrition/:id", get(io::get_nutrition));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
