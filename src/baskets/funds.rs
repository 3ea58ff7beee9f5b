//! Linkage Finance fund registry
//!
//! Funds are user-created token baskets. Each one is exposed as a static
//! index with id `linkage-fund-{fund_id}`.

use crate::baskets::config::parse_timestamp;
use crate::baskets::{Basket, BasketKind, BasketMember, BasketSource};
use crate::error::{AppError, Result};
use crate::index::cache::TtlCache;
use crate::quotes::types::TokenAddress;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hex length of a Cardano policy id
const POLICY_ID_LEN: usize = 56;

const FUNDS_KEY: &str = "funds";

/// A fund as stored in the registry file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkageFund {
    pub fund_id: String,
    pub name: String,
    /// Concatenated `policy_id ++ asset_name_hex` per token
    pub tokens: Vec<String>,
    pub factors: Vec<u64>,
    pub creator: String,
    pub fund_factor: u64,
    pub royalty_factor: u64,
    pub tx: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawFund {
    fund_id: String,
    name: String,
    tokens: Vec<String>,
    factors: Vec<u64>,
    creator: String,
    fund_factor: u64,
    royalty_factor: u64,
    tx: String,
    #[serde(default)]
    created_at: Option<String>,
}

impl RawFund {
    fn into_fund(self, loaded_at: DateTime<Utc>) -> Result<LinkageFund> {
        let created_at = match self.created_at.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => loaded_at,
        };

        Ok(LinkageFund {
            fund_id: self.fund_id,
            name: self.name,
            tokens: self.tokens,
            factors: self.factors,
            creator: self.creator,
            fund_factor: self.fund_factor,
            royalty_factor: self.royalty_factor,
            tx: self.tx,
            created_at,
        })
    }
}

/// Split a token id into its address and a display symbol
fn parse_token_id(token_id: &str) -> (TokenAddress, String) {
    if token_id.len() < POLICY_ID_LEN || !token_id.is_char_boundary(POLICY_ID_LEN) {
        let address = TokenAddress {
            policy_id: token_id.to_string(),
            token_name: String::new(),
        };
        return (address, token_id.to_string());
    }

    let (policy_id, name_hex) = token_id.split_at(POLICY_ID_LEN);
    let symbol = hex::decode(name_hex)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|s| s.trim_matches('\0').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            if name_hex.is_empty() {
                "UNKNOWN".to_string()
            } else {
                name_hex.chars().take(8).collect()
            }
        });

    let address = TokenAddress {
        policy_id: policy_id.to_string(),
        token_name: name_hex.to_string(),
    };
    (address, symbol)
}

impl LinkageFund {
    pub fn index_id(&self) -> String {
        format!("linkage-fund-{}", self.fund_id)
    }

    /// Convert to a static basket weighted by `factor / Σfactors`
    pub fn to_basket(&self) -> Basket {
        let total: u64 = self
            .tokens
            .iter()
            .zip(&self.factors)
            .map(|(_, factor)| *factor)
            .sum();

        let members = self
            .tokens
            .iter()
            .zip(&self.factors)
            .map(|(token_id, factor)| {
                let (address, symbol) = parse_token_id(token_id);
                let weight = if total > 0 {
                    *factor as f64 / total as f64
                } else {
                    0.0
                };
                BasketMember {
                    name: symbol,
                    address,
                    weight,
                    description: Some(format!("Token from Linkage Finance fund {}", self.name)),
                }
            })
            .collect();

        let creator: String = self.creator.chars().take(16).collect();

        Basket {
            id: self.index_id(),
            name: format!("Linkage Fund: {}", self.name),
            description: format!(
                "User-created index fund from Linkage Finance (Creator: {}...)",
                creator
            ),
            category: "linkage-fund".to_string(),
            methodology: format!(
                "Factor-weighted index fund with fund_factor={}, royalty_factor={}",
                self.fund_factor, self.royalty_factor
            ),
            kind: BasketKind::Static,
            members,
            criteria: None,
            base_value: 100.0,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }
}

/// Fund list read from a JSON file and cached for a fixed TTL
pub struct FundRegistry {
    path: PathBuf,
    cache: TtlCache<Arc<Vec<LinkageFund>>>,
}

impl FundRegistry {
    pub fn new(path: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        Self {
            path: path.into(),
            cache: TtlCache::new(ttl_seconds),
        }
    }

    pub fn parse(contents: &str) -> Result<Vec<LinkageFund>> {
        let raw: Vec<RawFund> = serde_json::from_str(contents)
            .map_err(|e| AppError::Config(format!("Invalid funds file: {}", e)))?;

        let loaded_at = Utc::now();
        raw.into_iter().map(|fund| fund.into_fund(loaded_at)).collect()
    }

    async fn read_funds(&self) -> Result<Vec<LinkageFund>> {
        if !tokio::fs::try_exists(&self.path).await? {
            warn!("Linkage funds file not found: {:?}", self.path);
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let funds = Self::parse(&contents)?;
        info!("Loaded {} Linkage Finance funds", funds.len());
        Ok(funds)
    }

    pub async fn all_funds(&self) -> Result<Arc<Vec<LinkageFund>>> {
        if let Some(cached) = self.cache.get(FUNDS_KEY) {
            debug!("Using cached funds ({:.1}s old)", cached.cache_age_seconds);
            return Ok(cached.value);
        }

        let funds = Arc::new(self.read_funds().await?);
        self.cache.set(FUNDS_KEY, funds.clone());
        Ok(funds)
    }

    pub async fn fund_by_id(&self, fund_id: &str) -> Result<LinkageFund> {
        self.all_funds()
            .await?
            .iter()
            .find(|fund| fund.fund_id == fund_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Linkage Finance fund '{}'", fund_id)))
    }
}

#[async_trait]
impl BasketSource for FundRegistry {
    async fn load_baskets(&self) -> Result<Vec<Basket>> {
        let funds = self.all_funds().await?;
        Ok(funds.iter().map(LinkageFund::to_basket).collect())
    }
}
