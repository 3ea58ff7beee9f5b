//! Application state management

use crate::baskets::{BasketCatalog, BasketSource, FundRegistry, JsonBasketSource};
use crate::config::Settings;
use crate::db::{HistoryStore, SqliteDb};
use crate::error::Result;
use crate::index::Resampler;
use crate::quotes::{MuesliswapClient, QuoteSource};
use crate::scheduler::HistoricalCollector;
use crate::services::IndexService;
use std::sync::Arc;
use tracing::info;

/// Handles shared by the API handlers and the collector, built once at startup
pub struct AppState {
    pub settings: Settings,

    /// Snapshot and status storage
    pub store: Arc<dyn HistoryStore>,

    /// Linkage Finance funds
    pub funds: Arc<FundRegistry>,

    /// Live valuation with its caches
    pub index_service: Arc<IndexService>,

    pub collector: Arc<HistoricalCollector>,

    /// Bucketing in the configured reference timezone
    pub resampler: Resampler,
}

impl AppState {
    /// Create application state from settings
    pub fn new(settings: Settings) -> Result<Self> {
        info!("Opening database at {:?}", settings.database_path);
        let store: Arc<dyn HistoryStore> = Arc::new(SqliteDb::new(&settings.database_path)?);

        let quotes: Arc<dyn QuoteSource> = Arc::new(MuesliswapClient::new(
            &settings.muesliswap_base_url,
            settings.muesliswap_timeout_seconds,
        )?);

        let funds = Arc::new(FundRegistry::new(
            settings.funds_path.clone(),
            settings.funds_cache_ttl_seconds,
        ));
        let catalog = Arc::new(BasketCatalog::new(
            JsonBasketSource::new(settings.index_config_path.clone()),
            funds.clone(),
        ));

        Self::from_parts(settings, store, quotes, catalog, funds)
    }

    /// Assemble state around already-built collaborators
    pub fn from_parts(
        settings: Settings,
        store: Arc<dyn HistoryStore>,
        quotes: Arc<dyn QuoteSource>,
        baskets: Arc<dyn BasketSource>,
        funds: Arc<FundRegistry>,
    ) -> Result<Self> {
        let resampler = Resampler::new(settings.timezone()?);
        let index_service = Arc::new(IndexService::new(
            baskets,
            quotes,
            settings.cache_ttl_seconds,
        ));
        let collector = Arc::new(HistoricalCollector::new(
            index_service.clone(),
            store.clone(),
            settings.collector_config(),
        ));

        Ok(Self {
            settings,
            store,
            funds,
            index_service,
            collector,
            resampler,
        })
    }
}
