//! REST API response types

use crate::baskets::{Basket, LinkageFund};
use crate::db::models::format_timestamp;
use crate::scheduler::{CollectorStatus, ForcedRunResult};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const API_VERSION: &str = "1.0.0";

/// Service information served at `/`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub features: BTreeMap<&'static str, &'static str>,
}

impl ServiceInfo {
    pub fn current() -> Self {
        Self {
            message: "Cardano Index API",
            version: API_VERSION,
            description: "API for accessing token index data from the Cardano ecosystem",
            features: BTreeMap::from([
                ("static_indexes", "Pre-configured token indexes with fixed weights"),
                (
                    "dynamic_indexes",
                    "Indexes whose members are re-derived from market rankings",
                ),
                (
                    "historical_data",
                    "Index snapshots collected by the background collector",
                ),
                ("live_prices", "Price calculations from MuesliSwap quotes"),
                ("linkage_funds", "User-created Linkage Finance funds as indexes"),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthQuerier {
    pub enabled: bool,
    pub running: bool,
    pub interval_minutes: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    /// Percentage with one decimal, or "N/A" before the first run
    pub success_rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub database: &'static str,
    /// Reachability of the market data provider
    pub quote_source: &'static str,
    pub querier: HealthQuerier,
}

impl HealthResponse {
    pub fn build(
        state: &AppState,
        status: Option<&CollectorStatus>,
        quotes_reachable: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let collector = &state.collector;
        let enabled = state.settings.querier_enabled;
        Self {
            status: "healthy",
            timestamp: format_timestamp(&now),
            version: API_VERSION,
            database: "connected",
            quote_source: if quotes_reachable {
                "connected"
            } else {
                "unreachable"
            },
            querier: HealthQuerier {
                enabled,
                running: enabled && collector.is_running(),
                interval_minutes: collector.config().interval.as_secs() / 60,
                last_run: status.and_then(|s| s.record.last_run_at),
                next_run: collector.next_run_at(),
                success_rate: status
                    .map(|s| format!("{:.1}%", s.success_rate * 100.0))
                    .unwrap_or_else(|| "N/A".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexListResponse {
    pub indexes: Vec<Basket>,
    pub total_count: usize,
}

impl From<Vec<Basket>> for IndexListResponse {
    fn from(indexes: Vec<Basket>) -> Self {
        Self {
            total_count: indexes.len(),
            indexes,
        }
    }
}

/// A fund together with the id of the index it is exposed as
#[derive(Debug, Clone, Serialize)]
pub struct FundSummary {
    #[serde(flatten)]
    pub fund: LinkageFund,
    pub index_id: String,
}

impl From<&LinkageFund> for FundSummary {
    fn from(fund: &LinkageFund) -> Self {
        Self {
            index_id: fund.index_id(),
            fund: fund.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FundListResponse {
    pub funds: Vec<FundSummary>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundDetailResponse {
    #[serde(flatten)]
    pub summary: FundSummary,
    pub index_metadata: Basket,
}

impl From<LinkageFund> for FundDetailResponse {
    fn from(fund: LinkageFund) -> Self {
        Self {
            index_metadata: fund.to_basket(),
            summary: FundSummary::from(&fund),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerierSettings {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub startup_delay_seconds: u64,
    pub error_backoff_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuerierStatusResponse {
    NotStarted {
        message: &'static str,
    },
    Status {
        querier_status: CollectorStatus,
        settings: QuerierSettings,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ForceRunResponse {
    pub message: &'static str,
    pub result: ForcedRunResult,
}
