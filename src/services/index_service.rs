//! Index Service
//!
//! Live index valuation. Valuations, volumes and derived dynamic members are
//! cached for a fixed TTL; failures are never cached.

use crate::baskets::{Basket, BasketMember, BasketSource};
use crate::clock::{Clock, SystemClock};
use crate::error::{AppError, Result};
use crate::index::aggregator::{self, Valuation, VolumeValuation};
use crate::index::cache::{Cached, TtlCache};
use crate::index::selector;
use crate::quotes::{fetch_quotes, QuoteSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Index service for business logic
pub struct IndexService {
    baskets: Arc<dyn BasketSource>,
    quotes: Arc<dyn QuoteSource>,
    clock: Arc<dyn Clock>,
    prices: TtlCache<Valuation>,
    volumes: TtlCache<VolumeValuation>,
    members: TtlCache<Vec<BasketMember>>,
}

impl IndexService {
    pub fn new(
        baskets: Arc<dyn BasketSource>,
        quotes: Arc<dyn QuoteSource>,
        cache_ttl_seconds: u64,
    ) -> Self {
        Self::with_clock(baskets, quotes, cache_ttl_seconds, Arc::new(SystemClock))
    }

    pub fn with_clock(
        baskets: Arc<dyn BasketSource>,
        quotes: Arc<dyn QuoteSource>,
        cache_ttl_seconds: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            baskets,
            quotes,
            prices: TtlCache::with_clock(cache_ttl_seconds, clock.clone()),
            volumes: TtlCache::with_clock(cache_ttl_seconds, clock.clone()),
            members: TtlCache::with_clock(cache_ttl_seconds, clock.clone()),
            clock,
        }
    }

    pub fn quote_source(&self) -> &Arc<dyn QuoteSource> {
        &self.quotes
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Evict expired valuations, volumes and selections
    pub fn purge_expired(&self) -> usize {
        self.prices.purge_expired() + self.volumes.purge_expired() + self.members.purge_expired()
    }

    /// All baskets, reloaded from the source
    pub async fn list_baskets(&self) -> Result<Vec<Basket>> {
        self.baskets.load_baskets().await
    }

    pub async fn get_basket(&self, index_id: &str) -> Result<Basket> {
        self.list_baskets()
            .await?
            .into_iter()
            .find(|basket| basket.id == index_id)
            .ok_or_else(|| AppError::NotFound(format!("Index '{}'", index_id)))
    }

    /// A basket with its current members filled in.
    ///
    /// Dynamic baskets whose selection fails are returned without members.
    pub async fn basket_detail(&self, index_id: &str) -> Result<Basket> {
        let mut basket = self.get_basket(index_id).await?;
        if basket.is_dynamic() {
            match self.resolve_members(&basket).await {
                Ok(members) => basket.members = members,
                Err(e) => warn!("Failed to select dynamic tokens for {}: {}", index_id, e),
            }
        }
        Ok(basket)
    }

    /// Fixed members of a static basket, or the cached selection of a dynamic one
    pub async fn resolve_members(&self, basket: &Basket) -> Result<Vec<BasketMember>> {
        let criteria = match (&basket.criteria, basket.is_dynamic()) {
            (Some(criteria), true) => criteria,
            _ => return Ok(basket.members.clone()),
        };

        let key = format!("members:{}", basket.id);
        if let Some(cached) = self.members.get(&key) {
            return Ok(cached.value);
        }

        let members = selector::select(self.quotes.as_ref(), criteria).await?;
        info!(
            "Dynamically selected {} tokens for index {}",
            members.len(),
            basket.id
        );
        self.members.set(key, members.clone());
        Ok(members)
    }

    /// Value `basket` from fresh quotes, stamped with `timestamp`
    pub async fn valuation_for(
        &self,
        basket: &Basket,
        timestamp: DateTime<Utc>,
    ) -> Result<Valuation> {
        let members = self.resolve_members(basket).await?;
        if members.is_empty() {
            return Err(AppError::NoTokens(basket.id.clone()));
        }

        let quotes = fetch_quotes(self.quotes.as_ref(), &members).await;
        aggregator::compute(&basket.id, basket.base_value, &members, &quotes, timestamp)
    }

    /// Current index value, served from cache while fresh
    pub async fn calculate_index_price(&self, index_id: &str) -> Result<Cached<Valuation>> {
        let key = format!("price:{}", index_id);
        if let Some(cached) = self.prices.get(&key) {
            debug!(
                "Returning cached price for {} ({:.1}s old)",
                index_id, cached.cache_age_seconds
            );
            return Ok(cached);
        }

        let basket = self.get_basket(index_id).await?;
        let valuation = self.valuation_for(&basket, self.clock.now()).await?;

        self.prices.set(key, valuation.clone());
        Ok(Cached::fresh(valuation))
    }

    /// Weighted volume of the index, served from cache while fresh
    pub async fn get_index_volume(&self, index_id: &str) -> Result<Cached<VolumeValuation>> {
        let key = format!("volume:{}", index_id);
        if let Some(cached) = self.volumes.get(&key) {
            return Ok(cached);
        }

        let basket = self.get_basket(index_id).await?;
        let members = self.resolve_members(&basket).await?;
        if members.is_empty() {
            return Err(AppError::NoTokens(basket.id));
        }

        let quotes = fetch_quotes(self.quotes.as_ref(), &members).await;
        let volume = aggregator::compute_volume(&basket.id, &members, &quotes, self.clock.now());

        self.volumes.set(key, volume.clone());
        Ok(Cached::fresh(volume))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory basket source shared by service, scheduler and API tests

    use super::*;
    use crate::baskets::{BasketKind, SelectionCriteria};
    use crate::quotes::types::TokenAddress;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct StaticBasketSource {
        pub baskets: Mutex<Vec<Basket>>,
        pub fail_with: Mutex<Option<String>>,
    }

    impl StaticBasketSource {
        pub fn new(baskets: Vec<Basket>) -> Self {
            Self {
                baskets: Mutex::new(baskets),
                fail_with: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BasketSource for StaticBasketSource {
        async fn load_baskets(&self) -> Result<Vec<Basket>> {
            if let Some(message) = self.fail_with.lock().clone() {
                return Err(AppError::Config(message));
            }
            Ok(self.baskets.lock().clone())
        }
    }

    /// A static basket whose members are keyed by policy `policy_{name}`
    pub fn static_basket(id: &str, members: &[(&str, f64)]) -> Basket {
        let now = Utc::now();
        Basket {
            id: id.to_string(),
            name: format!("{} index", id),
            description: String::new(),
            category: "test".to_string(),
            methodology: "fixed weights".to_string(),
            kind: BasketKind::Static,
            members: members
                .iter()
                .map(|(name, weight)| BasketMember {
                    name: name.to_string(),
                    address: TokenAddress {
                        policy_id: format!("policy_{}", name),
                        token_name: String::new(),
                    },
                    weight: *weight,
                    description: None,
                })
                .collect(),
            criteria: None,
            base_value: 100.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dynamic_basket(id: &str, limit: usize) -> Basket {
        Basket {
            kind: BasketKind::Dynamic,
            members: Vec::new(),
            criteria: Some(SelectionCriteria {
                rank_method: "market_cap".to_string(),
                limit,
                min_volume: 100.0,
                min_market_cap: None,
                excluded: Vec::new(),
                included_categories: Vec::new(),
                weighting_method: "equal".to_string(),
                rebalance_frequency: "daily".to_string(),
            }),
            ..static_basket(id, &[])
        }
    }
}
