//! Quote source adapters

pub mod types;
pub mod muesliswap;

use crate::baskets::BasketMember;
use crate::error::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use tracing::warn;
use types::*;

pub use muesliswap::MuesliswapClient;

/// Trait every market data provider must implement
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Provider ID (e.g., "muesliswap")
    fn id(&self) -> &'static str;

    /// Fetch the current quote for one token
    async fn fetch_quote(&self, address: &TokenAddress) -> Result<Quote>;

    /// List tokens ranked by `method`, best first
    async fn list_ranked(
        &self,
        method: RankMethod,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RankedToken>>;

    /// Whether the provider is currently answering
    async fn health_check(&self) -> bool;
}

/// Fetch quotes for every member concurrently.
///
/// Members whose fetch fails are logged and left out of the returned map.
pub async fn fetch_quotes(
    source: &dyn QuoteSource,
    members: &[BasketMember],
) -> HashMap<String, Quote> {
    let fetches = members.iter().map(|member| async move {
        let result = source.fetch_quote(&member.address).await;
        (member, result)
    });

    let mut quotes = HashMap::with_capacity(members.len());
    for (member, result) in join_all(fetches).await {
        match result {
            Ok(quote) => {
                quotes.insert(member.name.clone(), quote);
            }
            Err(e) => warn!("Failed to fetch price for {}: {}", member.name, e),
        }
    }
    quotes
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory quote source shared by the service and scheduler tests

    use super::*;
    use crate::error::AppError;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct StaticQuoteSource {
        pub quotes: Mutex<HashMap<String, Quote>>,
        pub ranked: Mutex<Vec<RankedToken>>,
        pub quote_calls: Mutex<usize>,
        pub list_calls: Mutex<usize>,
        pub offline: Mutex<bool>,
    }

    impl StaticQuoteSource {
        pub fn with_quote(self, policy_id: &str, price: f64, market_cap: f64) -> Self {
            self.quotes
                .lock()
                .insert(policy_id.to_string(), quote(price, market_cap));
            self
        }
    }

    pub fn quote(price: f64, market_cap: f64) -> Quote {
        Quote {
            price,
            market_cap,
            volume_24h: 1_000.0,
            volume_7d: 7_000.0,
            volume_change: 10.0,
            price_change: HashMap::from([("24h".to_string(), 2.0), ("7d".to_string(), -4.0)]),
        }
    }

    #[async_trait]
    impl QuoteSource for StaticQuoteSource {
        fn id(&self) -> &'static str {
            "static"
        }

        async fn fetch_quote(&self, address: &TokenAddress) -> Result<Quote> {
            *self.quote_calls.lock() += 1;
            self.quotes
                .lock()
                .get(&address.policy_id)
                .cloned()
                .ok_or_else(|| AppError::QuoteUnavailable(address.policy_id.clone()))
        }

        async fn list_ranked(
            &self,
            _method: RankMethod,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<RankedToken>> {
            *self.list_calls.lock() += 1;
            Ok(self
                .ranked
                .lock()
                .iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn health_check(&self) -> bool {
            !*self.offline.lock()
        }
    }
}
