//! Cardano Index - weighted token index valuation and history service
//!
//! Values baskets of Cardano native tokens from MuesliSwap quotes, collects
//! periodic snapshots into SQLite and serves both over a REST API.

pub mod api;
pub mod baskets;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod quotes;
pub mod scheduler;
pub mod services;
pub mod state;

use api::ApiServer;
use config::Settings;
use error::Result;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run the service until Ctrl-C
pub async fn run(settings: Settings) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardano_index=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cardano Index API...");

    let state = Arc::new(AppState::new(settings)?);
    tracing::info!("Application state initialized");

    if state.settings.querier_enabled {
        state.collector.start();
    } else {
        tracing::info!("Historical collector disabled by configuration");
    }

    let mut server = ApiServer::new(state.clone());
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    state.collector.stop().await;
    server.stop().await;

    tracing::info!("Cardano Index API stopped");
    Ok(())
}
