//! Persisted records

use crate::baskets::BasketKind;
use crate::index::aggregator::Valuation;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-width UTC text format; lexical order matches time order
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// One collected valuation of a basket, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSnapshot {
    pub id: Option<i64>,
    pub basket_id: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
    pub price_change_7d: f64,
    pub member_count: usize,
    pub basket_kind: BasketKind,
    pub success: bool,
    pub error_message: Option<String>,
}

impl HistoricalSnapshot {
    pub fn success(valuation: &Valuation, kind: BasketKind) -> Self {
        Self {
            id: None,
            basket_id: valuation.basket_id.clone(),
            timestamp: valuation.timestamp,
            price: valuation.price,
            market_cap: valuation.market_cap,
            volume_24h: valuation.volume_24h,
            price_change_24h: valuation.price_change_24h,
            price_change_7d: valuation.price_change_7d,
            member_count: valuation.member_count,
            basket_kind: kind,
            success: true,
            error_message: None,
        }
    }

    /// A failed valuation: numbers zeroed, error always present
    pub fn failure(
        basket_id: &str,
        timestamp: DateTime<Utc>,
        kind: BasketKind,
        error: impl Into<String>,
    ) -> Self {
        let mut message = error.into();
        if message.is_empty() {
            message = "Unknown error".to_string();
        }

        Self {
            id: None,
            basket_id: basket_id.to_string(),
            timestamp,
            price: 0.0,
            market_cap: 0.0,
            volume_24h: 0.0,
            price_change_24h: 0.0,
            price_change_7d: 0.0,
            member_count: 0,
            basket_kind: kind,
            success: false,
            error_message: Some(message),
        }
    }
}

/// Run bookkeeping for one collector identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerierStatusRecord {
    pub querier_name: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuerierStatusRecord {
    pub fn new(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            querier_name: name.to_string(),
            last_run_at: None,
            last_success_at: None,
            last_error_at: None,
            last_error_message: None,
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_text_orders_like_time() {
        let early = DateTime::parse_from_rfc3339("2025-01-09T23:59:59.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2025-01-10T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let (a, b) = (format_timestamp(&early), format_timestamp(&late));
        assert_eq!(a, "2025-01-09T23:59:59.500000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).unwrap(), early);
    }

    #[test]
    fn test_failure_snapshot_invariants() {
        let snapshot = HistoricalSnapshot::failure("idx", Utc::now(), BasketKind::Dynamic, "");

        assert!(!snapshot.success);
        assert_eq!(snapshot.price, 0.0);
        assert_eq!(snapshot.member_count, 0);
        assert_eq!(snapshot.error_message.as_deref(), Some("Unknown error"));
    }
}
