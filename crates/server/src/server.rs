//! Router assembly, startup, and the shutdown drain sequence.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use suppsearch::{bootstrap_seeds, SearchService};

use crate::config::ServerConfig;
use crate::middleware::{correlation_id, log_requests};
use crate::routes::{admin, health, search};
use crate::state::AppState;

/// Build the router over shared state. Public: health, readiness, metrics,
/// API info. Core: search, admin ingest, job inspection.
pub fn build_router(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let timeout = state.config.request_timeout();

    let mut router = Router::new()
        .route("/", get(health::api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api/v1/search", post(search::search))
        .route("/api/v1/supplements", post(admin::upsert_supplement))
        .route("/api/v1/supplements/{name}", get(admin::get_supplement))
        .route("/api/v1/discovery/jobs/{job_id}", get(admin::get_discovery_job));

    if let Some(handle) = metrics_handle {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    router
        .fallback(health::not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            timeout,
        ))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(from_fn(log_requests))
        .layer(from_fn(correlation_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server: install logging and metrics, assemble the core
/// service, optionally bootstrap the seed catalog, then serve until
/// SIGTERM/Ctrl-C and drain.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .json()
        .init();

    let metrics_handle = if config.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let service = SearchService::start(config.service.clone()).await?;
    if config.bootstrap_seeds && service.store().is_empty() {
        let created = bootstrap_seeds(&service).await?;
        tracing::info!(created, "seed catalog bootstrapped");
    }

    let addr: SocketAddr = config.socket_addr()?;
    let state = AppState::new(config, service);
    let app = build_router(state.clone(), metrics_handle);

    tracing::info!(%addr, rows = state.service.store().len(), "suppsearch server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain: axum has stopped accepting and finished in-flight requests
    // (bounded by the timeout layer); now drain the discovery worker and
    // close the stores.
    state.service.shutdown().await;
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
