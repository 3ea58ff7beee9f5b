//! Index basket definitions and the sources they are loaded from

pub mod config;
pub mod funds;

use crate::error::{AppError, Result};
use crate::quotes::types::{RankMethod, TokenAddress};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use config::JsonBasketSource;
pub use funds::{FundRegistry, LinkageFund};

/// One constituent of a basket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketMember {
    /// Identifier the member's quote is keyed by (the token symbol)
    pub name: String,
    #[serde(flatten)]
    pub address: TokenAddress,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasketKind {
    Static,
    Dynamic,
}

impl fmt::Display for BasketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasketKind::Static => write!(f, "static"),
            BasketKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl FromStr for BasketKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "static" => Ok(BasketKind::Static),
            "dynamic" => Ok(BasketKind::Dynamic),
            other => Err(AppError::Config(format!("Unknown index type '{}'", other))),
        }
    }
}

/// How selected tokens are weighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightingMethod {
    Equal,
    MarketCap,
}

impl FromStr for WeightingMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "equal" => Ok(WeightingMethod::Equal),
            "market_cap" => Ok(WeightingMethod::MarketCap),
            other => Err(AppError::Config(format!(
                "Unsupported weighting method '{}'",
                other
            ))),
        }
    }
}

fn default_min_volume() -> f64 {
    100.0
}

fn default_weighting_method() -> String {
    "market_cap".to_string()
}

fn default_rebalance_frequency() -> String {
    "daily".to_string()
}

/// Declarative rules a dynamic basket derives its members from.
///
/// Methods are kept as the configured strings and parsed when a selection
/// runs, so a bad value only fails the basket that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    #[serde(rename = "selection_method")]
    pub rank_method: String,
    pub limit: usize,
    #[serde(rename = "min_volume_ada", default = "default_min_volume")]
    pub min_volume: f64,
    #[serde(default)]
    pub min_market_cap: Option<f64>,
    #[serde(rename = "exclude_tokens", default)]
    pub excluded: Vec<String>,
    #[serde(rename = "include_categories", default)]
    pub included_categories: Vec<String>,
    #[serde(default = "default_weighting_method")]
    pub weighting_method: String,
    #[serde(default = "default_rebalance_frequency")]
    pub rebalance_frequency: String,
}

impl SelectionCriteria {
    pub fn rank_method(&self) -> Result<RankMethod> {
        self.rank_method.parse()
    }

    pub fn weighting_method(&self) -> Result<WeightingMethod> {
        self.weighting_method.parse()
    }
}

/// An index definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basket {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub methodology: String,
    #[serde(rename = "index_type")]
    pub kind: BasketKind,
    /// Fixed members for static baskets; empty until derived for dynamic ones
    #[serde(rename = "tokens")]
    pub members: Vec<BasketMember>,
    #[serde(rename = "dynamic_criteria")]
    pub criteria: Option<SelectionCriteria>,
    pub base_value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Basket {
    pub fn is_dynamic(&self) -> bool {
        self.kind == BasketKind::Dynamic && self.criteria.is_some()
    }
}

/// Scale weights so they sum to 1, leaving them untouched if the sum is not positive
pub fn normalize_weights(members: &mut [BasketMember]) {
    let total: f64 = members.iter().map(|m| m.weight).sum();
    if total > 0.0 {
        for member in members.iter_mut() {
            member.weight /= total;
        }
    }
}

/// Source of basket definitions, reloaded on every call
#[async_trait]
pub trait BasketSource: Send + Sync {
    async fn load_baskets(&self) -> Result<Vec<Basket>>;
}

/// Configured indexes followed by Linkage Finance funds
pub struct BasketCatalog {
    config: JsonBasketSource,
    funds: Arc<FundRegistry>,
}

impl BasketCatalog {
    pub fn new(config: JsonBasketSource, funds: Arc<FundRegistry>) -> Self {
        Self { config, funds }
    }
}

#[async_trait]
impl BasketSource for BasketCatalog {
    async fn load_baskets(&self) -> Result<Vec<Basket>> {
        let mut baskets = self.config.load_baskets().await?;
        baskets.extend(self.funds.load_baskets().await?);
        Ok(baskets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, weight: f64) -> BasketMember {
        BasketMember {
            name: name.to_string(),
            address: TokenAddress {
                policy_id: format!("policy_{}", name),
                token_name: String::new(),
            },
            weight,
            description: None,
        }
    }

    #[test]
    fn test_normalize_weights() {
        let mut members = vec![member("A", 40.0), member("B", 30.0), member("C", 30.0)];
        normalize_weights(&mut members);

        let total: f64 = members.iter().map(|m| m.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((members[0].weight - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_zero_weights_untouched() {
        let mut members = vec![member("A", 0.0), member("B", 0.0)];
        normalize_weights(&mut members);
        assert!(members.iter().all(|m| m.weight == 0.0));
    }

    #[test]
    fn test_criteria_methods() {
        let criteria: SelectionCriteria = serde_json::from_str(
            r#"{"selection_method": "volume", "limit": 5, "weighting_method": "equal"}"#,
        )
        .unwrap();

        assert_eq!(criteria.rank_method().unwrap(), RankMethod::Volume);
        assert_eq!(criteria.weighting_method().unwrap(), WeightingMethod::Equal);
        assert_eq!(criteria.min_volume, 100.0);
        assert_eq!(criteria.rebalance_frequency, "daily");

        let custom = SelectionCriteria {
            weighting_method: "inverse_vol".to_string(),
            ..criteria
        };
        assert!(matches!(custom.weighting_method(), Err(AppError::Config(_))));
    }
}
