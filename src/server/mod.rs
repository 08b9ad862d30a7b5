//! HTTP surface for dashboards.
//!
//! | Method | Path          | Body                       | Response                  |
//! |--------|---------------|----------------------------|---------------------------|
//! | GET    | `/stats`      |                            | [`StatsReport`] JSON      |
//! | POST   | `/identifier` | `{"queue", "identifier"}`  | [`LookupResponse`] JSON   |
//! | GET    | `/metrics`    |                            | Prometheus text           |
//! | GET    | `/health`     |                            | 200                       |
//!
//! [`StatsReport`]: crate::stats::StatsReport
//! [`LookupResponse`]: crate::lookup::LookupResponse

pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::InspectorConfig;
use crate::directory::WorkerDirectory;
use crate::lookup::{IdentifierLookup, LookupOptions};
use crate::metrics::MetricsCollector;
use crate::stats::StatsAggregator;
use crate::store::{KeyValueStore, StoreKeys};

/// Shared state of the HTTP handlers.
pub struct AppState {
    pub stats: StatsAggregator,
    pub lookup: IdentifierLookup,
    pub metrics: MetricsCollector,
}

impl AppState {
    /// Wires the aggregator and the lookup to the same directory and store.
    pub fn new(
        directory: Arc<dyn WorkerDirectory>,
        store: Arc<dyn KeyValueStore>,
        config: &InspectorConfig,
    ) -> Self {
        let keys = StoreKeys::new(config.namespace.clone(), &config.retry_key);

        let stats = StatsAggregator::new(Arc::clone(&directory), Arc::clone(&store), keys.clone())
            .with_mismatch_policy(config.mismatch_policy);
        let lookup = IdentifierLookup::new(directory, store, keys).with_options(LookupOptions {
            scan_retry_set: config.scan_retry_set,
        });

        Self {
            stats,
            lookup,
            metrics: MetricsCollector::new(),
        }
    }
}

/// Builds the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .route("/identifier", post(routes::check_identifier))
        .route("/metrics", get(routes::metrics))
        .with_state(state)
}

/// Serves the router on `listen_addr` until Ctrl-C.
pub async fn serve(listen_addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = %listener.local_addr()?, "Introspection server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Introspection server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
