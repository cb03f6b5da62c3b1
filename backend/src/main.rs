use anyhow::{Context, Result};
use tracing::info;

use antropometri_backend::{create_router, initialize_backend, logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing first so config loading is logged
    let log_filter = logging::init();
    let config = AppConfig::load()?;
    log_filter.apply_configured(&config.log_level)?;

    info!("Starting antropometri server");
    let app_state = initialize_backend(&config).await?;
    let context = app_state.context.clone();

    let app = create_router(app_state, config.cors_origin.as_deref());

    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    context.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
