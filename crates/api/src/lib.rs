//! HTTP API server for the marketplace checkout system.
//!
//! Exposes listing, cart, checkout and purchase endpoints over the
//! [`checkout`] and [`domain`] services, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, post};
use common::DefaultClock;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::StoreError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::{AppState, Stores};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/items", post(routes::items::create))
        .route(
            "/items/{id}",
            get(routes::items::get)
                .patch(routes::items::update)
                .delete(routes::items::delete),
        )
        .route("/cart", get(routes::cart::list).post(routes::cart::add))
        .route("/cart/checkout", post(routes::cart::checkout))
        .route("/cart/{id}", delete(routes::cart::remove))
        .route("/purchases", get(routes::purchases::list))
        .route("/reconciliation/gaps", get(routes::reconciliation::gaps))
        .route(
            "/reconciliation/gaps/{purchase_id}/resolve",
            post(routes::reconciliation::resolve),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over empty in-memory stores and the system clock.
pub fn create_default_state() -> Arc<AppState> {
    Arc::new(AppState::new(
        Stores::in_memory(),
        Arc::new(DefaultClock),
        &Config::default(),
    ))
}

/// Creates application state for `config`.
///
/// Connects to PostgreSQL and applies migrations when `DATABASE_URL` is set;
/// otherwise falls back to in-memory stores.
pub async fn create_state(config: &Config) -> Result<Arc<AppState>, StoreError> {
    let stores = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            store::run_migrations(&pool).await?;
            tracing::info!("using PostgreSQL stores");
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            Stores::in_memory()
        }
    };

    Ok(Arc::new(AppState::new(stores, Arc::new(DefaultClock), config)))
}

/// Runs one maintenance pass: repairs reconciliation gaps, then purges
/// expired cart entries. Failures are logged and do not stop the other step.
pub async fn run_maintenance_once(state: &AppState) {
    match state.reconciliation.repair().await {
        Ok(report) if !report.repaired.is_empty() || !report.unresolved.is_empty() => {
            tracing::info!(
                repaired = report.repaired.len(),
                unresolved = report.unresolved.len(),
                "reconciliation pass finished"
            );
        }
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "reconciliation pass failed"),
    }

    match state.carts.purge_expired().await {
        Ok(0) => {}
        Ok(purged) => tracing::debug!(purged, "purged expired cart entries"),
        Err(err) => tracing::error!(error = %err, "cart purge failed"),
    }
}

/// Spawns the background maintenance loop, ticking every `period`.
pub fn spawn_maintenance(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_maintenance_once(&state).await;
        }
    })
}
