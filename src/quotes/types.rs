//! Common quote types

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// On-chain address of a native token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAddress {
    pub policy_id: String,
    /// Hex-encoded asset name
    pub token_name: String,
}

/// Normalized per-token market snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub volume_7d: f64,
    pub volume_change: f64,
    /// Percentage change keyed by window ("24h", "7d", ...)
    pub price_change: HashMap<String, f64>,
}

impl Quote {
    pub fn change(&self, window: &str) -> Option<f64> {
        self.price_change.get(window).copied()
    }
}

/// One entry of a ranked token listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedToken {
    pub symbol: Option<String>,
    pub address: TokenAddress,
    pub categories: Vec<String>,
    pub quote: Quote,
}

/// Sort key for ranked listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMethod {
    MarketCap,
    Volume,
}

impl RankMethod {
    /// Sort key understood by the listing endpoint
    pub fn sort_key(&self) -> &'static str {
        match self {
            RankMethod::MarketCap => "marketCap",
            RankMethod::Volume => "volume",
        }
    }
}

impl FromStr for RankMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "market_cap" => Ok(RankMethod::MarketCap),
            "volume" => Ok(RankMethod::Volume),
            other => Err(AppError::Config(format!(
                "Unsupported selection method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankMethod::MarketCap => write!(f, "market_cap"),
            RankMethod::Volume => write!(f, "volume"),
        }
    }
}
