use std::net::SocketAddr;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::{
    services::{default_view, download_local, fetch_archived, health, read_local, reset_local, search},
    state::AppState,
};
use crate::config::Config;
use crate::facade::Logbook;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Read API routes over a shared logbook
pub fn router(state: AppState) -> Router {
    let max_concurrent = state.config.server.max_concurrent_requests;

    Router::new()
        .route("/health", get(health))
        .route("/logs/default", get(default_view))
        .route("/logs/search", get(search))
        .route("/logs/archive/{*key}", get(fetch_archived))
        .route("/logs/local/{category}", get(read_local))
        .route("/logs/local/{category}/reset", post(reset_local))
        .route("/logs/local/{category}/download", get(download_local))
        .with_state(state)
        // one permit pool shared by every route
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http())
}

/// Open the logbook and serve the read API until a shutdown signal
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);

    info!("Opening logbook");
    let logbook = Logbook::from_config(&config)?;
    let app = router(AppState::new(config, logbook));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "circlelog API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
