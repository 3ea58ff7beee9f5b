//! HTTP server for the REST API
//!
//! `/` and `/health` are public; everything else requires a bearer key.

use crate::api::auth::require_api_key;
use crate::api::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the full router around shared state
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        // Indexes
        .route("/indexes", get(handlers::list_indexes))
        .route("/indexes/:index_id", get(handlers::get_index))
        .route("/indexes/:index_id/price", get(handlers::get_index_price))
        .route("/indexes/:index_id/history", get(handlers::get_index_history))
        .route("/indexes/:index_id/volume", get(handlers::get_index_volume))
        // Linkage Finance funds
        .route("/linkage-funds", get(handlers::list_linkage_funds))
        .route("/linkage-funds/:fund_id", get(handlers::get_linkage_fund))
        // Collector admin
        .route("/admin/querier/status", get(handlers::get_querier_status))
        .route("/admin/querier/force-run", post(handlers::force_querier_run))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server manager
pub struct ApiServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Bind and serve in the background, returning the bound address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let bind = self.state.settings.bind_address();
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid address {}: {}", bind, e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let app = router(self.state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting Cardano Index API server on {}", local_addr);
        self.task = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        }));

        info!("Health check: GET http://{}/health", local_addr);
        info!("Indexes:      GET http://{}/indexes", local_addr);
        info!("Funds:        GET http://{}/linkage-funds", local_addr);
        Ok(local_addr)
    }

    /// Signal shutdown and wait for in-flight requests to drain
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("API server task ended abnormally: {}", e);
            }
        }
    }
}
