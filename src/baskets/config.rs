//! Index configuration file loader

use crate::baskets::{
    normalize_weights, Basket, BasketKind, BasketMember, BasketSource, SelectionCriteria,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct IndexConfigFile {
    #[serde(default)]
    indexes: Vec<serde_json::Value>,
}

fn default_index_type() -> String {
    "static".to_string()
}

fn default_base_value() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    methodology: String,
    #[serde(default = "default_index_type")]
    index_type: String,
    #[serde(default)]
    tokens: Vec<BasketMember>,
    #[serde(default)]
    dynamic_criteria: Option<SelectionCriteria>,
    #[serde(default = "default_base_value")]
    base_value: f64,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// Parse an ISO-8601 timestamp; values without an offset are taken as UTC
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| AppError::Config(format!("Invalid timestamp '{}': {}", value, e)))
}

impl IndexEntry {
    fn into_basket(self, loaded_at: DateTime<Utc>) -> Result<Basket> {
        let declared: BasketKind = self.index_type.parse()?;

        if !self.base_value.is_finite() || self.base_value <= 0.0 {
            return Err(AppError::Config(format!(
                "Index {} has invalid base_value {}",
                self.id, self.base_value
            )));
        }

        let (kind, mut members, criteria) = match (declared, self.dynamic_criteria) {
            (BasketKind::Dynamic, Some(criteria)) => {
                if criteria.limit == 0 {
                    return Err(AppError::Config(format!(
                        "Index {} has a selection limit of 0",
                        self.id
                    )));
                }
                (BasketKind::Dynamic, Vec::new(), Some(criteria))
            }
            _ => (BasketKind::Static, self.tokens, None),
        };

        if let Some(bad) = members
            .iter()
            .find(|m| !(0.0..=1.0).contains(&m.weight))
        {
            return Err(AppError::Config(format!(
                "Token {} in index {} has weight {} outside [0, 1]",
                bad.name, self.id, bad.weight
            )));
        }
        normalize_weights(&mut members);

        let created_at = self
            .created_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?
            .unwrap_or(loaded_at);
        let updated_at = self
            .updated_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?
            .unwrap_or(loaded_at);

        Ok(Basket {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            methodology: self.methodology,
            kind,
            members,
            criteria,
            base_value: self.base_value,
            created_at,
            updated_at,
        })
    }
}

/// Loads `{"indexes": [...]}` from a JSON file on every call
pub struct JsonBasketSource {
    path: PathBuf,
}

impl JsonBasketSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse a config document. Malformed entries are logged and skipped.
    pub fn parse(contents: &str) -> Result<Vec<Basket>> {
        let file: IndexConfigFile = serde_json::from_str(contents)
            .map_err(|e| AppError::Config(format!("Invalid index config: {}", e)))?;

        let loaded_at = Utc::now();
        let mut baskets = Vec::with_capacity(file.indexes.len());

        for (position, raw) in file.indexes.into_iter().enumerate() {
            let basket = serde_json::from_value::<IndexEntry>(raw)
                .map_err(|e| AppError::Config(e.to_string()))
                .and_then(|entry| entry.into_basket(loaded_at));

            match basket {
                Ok(basket) => baskets.push(basket),
                Err(e) => warn!("Skipping index #{} in config: {}", position, e),
            }
        }

        Ok(baskets)
    }
}

#[async_trait]
impl BasketSource for JsonBasketSource {
    async fn load_baskets(&self) -> Result<Vec<Basket>> {
        if !tokio::fs::try_exists(&self.path).await? {
            warn!("Index config file not found: {:?}", self.path);
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let baskets = Self::parse(&contents)?;

        info!("Loaded {} index configurations", baskets.len());
        Ok(baskets)
    }
}
