//! MuesliSwap DEX quote adapter

use crate::error::{AppError, Result};
use crate::quotes::types::*;
use crate::quotes::QuoteSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api-v2.muesliswap.com";

/// MuesliSwap REST client
pub struct MuesliswapClient {
    client: Client,
    base_url: Url,
}

impl MuesliswapClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid MuesliSwap base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config("MuesliSwap base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::QuoteUnavailable(format!("{}: {}", url.path(), e)))?;

        let response = response
            .error_for_status()
            .map_err(|e| AppError::QuoteUnavailable(format!("{}: {}", url.path(), e)))?;

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::QuoteUnavailable(format!("Malformed response from {}: {}", url.path(), e)))
    }
}

#[async_trait]
impl QuoteSource for MuesliswapClient {
    fn id(&self) -> &'static str {
        "muesliswap"
    }

    async fn fetch_quote(&self, address: &TokenAddress) -> Result<Quote> {
        let url = self.endpoint("price")?;

        // The API treats the quote slot as the priced token, so ours goes there
        let query = [
            ("base-policy-id", String::new()),
            ("base-tokenname", String::new()),
            ("quote-policy-id", address.policy_id.clone()),
            ("quote-tokenname", address.token_name.clone()),
        ];

        let data: PriceResponse = self.get_json(url, &query).await.map_err(|e| {
            error!("Failed to fetch price for {}.{}: {}", address.policy_id, address.token_name, e);
            e
        })?;

        Ok(data.into_quote())
    }

    async fn list_ranked(
        &self,
        method: RankMethod,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RankedToken>> {
        let url = self.endpoint("list/v2")?;

        let query = [
            ("base-policy-id", String::new()),
            ("base-tokenname", String::new()),
            ("verified", "true".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("search", String::new()),
            ("sort_by", method.sort_key().to_string()),
            ("desc", "true".to_string()),
        ];

        let data: TokenListResponse = self.get_json(url, &query).await.map_err(|e| {
            error!("Failed to fetch token list from MuesliSwap: {}", e);
            e
        })?;

        Ok(data.items.into_iter().map(TokenListItem::into_ranked).collect())
    }

    async fn health_check(&self) -> bool {
        let Ok(url) = self.endpoint("list/v2") else {
            return false;
        };

        let query = [
            ("base-policy-id", String::new()),
            ("base-tokenname", String::new()),
            ("verified", "true".to_string()),
            ("limit", "1".to_string()),
            ("offset", "0".to_string()),
        ];

        match self
            .client
            .get(url)
            .query(&query)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Scale a raw price by the decimal places of the pair
pub fn normalize_price(price: f64, quote_decimal_places: i32, base_decimal_places: i32) -> f64 {
    price * 10f64.powi(quote_decimal_places - base_decimal_places)
}

/// Scale a raw market cap down by the base token's decimal places
pub fn normalize_market_cap(market_cap: f64, base_decimal_places: i32) -> f64 {
    market_cap * 10f64.powi(-base_decimal_places)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireAddress {
    #[serde(default)]
    name: String,
    #[serde(rename = "policyId", default)]
    policy_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireVolume {
    #[serde(default)]
    base: f64,
    #[serde(default)]
    quote: f64,
}

impl WireVolume {
    fn total(&self) -> f64 {
        self.base + self.quote
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceResponse {
    base_decimal_places: i32,
    quote_decimal_places: i32,
    price: f64,
    market_cap: f64,
    #[serde(default)]
    volume: WireVolume,
    #[serde(rename = "volume7d", default)]
    volume_7d: WireVolume,
    #[serde(default)]
    volume_change: WireVolume,
    #[serde(default)]
    price_change: HashMap<String, f64>,
}

impl PriceResponse {
    fn into_quote(self) -> Quote {
        Quote {
            price: normalize_price(self.price, self.quote_decimal_places, self.base_decimal_places),
            market_cap: normalize_market_cap(self.market_cap, self.base_decimal_places),
            volume_24h: self.volume.total(),
            volume_7d: self.volume_7d.total(),
            volume_change: self.volume_change.total(),
            price_change: self.price_change,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenListResponse {
    items: Vec<TokenListItem>,
}

#[derive(Debug, Deserialize)]
struct TokenListItem {
    info: WireTokenInfo,
    price: WireMarketPrice,
}

#[derive(Debug, Deserialize)]
struct WireTokenInfo {
    symbol: Option<String>,
    address: WireAddress,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMarketPrice {
    #[serde(default)]
    volume: WireVolume,
    #[serde(default)]
    volume_change: WireVolume,
    price: f64,
    #[serde(default)]
    price_change: HashMap<String, f64>,
    quote_decimal_places: i32,
    base_decimal_places: i32,
    market_cap: f64,
}

impl TokenListItem {
    fn into_ranked(self) -> RankedToken {
        let price = self.price;
        RankedToken {
            symbol: self.info.symbol.filter(|s| !s.is_empty()),
            address: TokenAddress {
                policy_id: self.info.address.policy_id,
                token_name: self.info.address.name,
            },
            categories: self.info.categories,
            quote: Quote {
                price: normalize_price(price.price, price.quote_decimal_places, price.base_decimal_places),
                market_cap: normalize_market_cap(price.market_cap, price.base_decimal_places),
                volume_24h: price.volume.total(),
                volume_7d: 0.0,
                volume_change: price.volume_change.total(),
                price_change: price.price_change,
            },
        }
    }
}
