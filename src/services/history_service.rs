//! History Service
//!
//! Validated historical queries over collected snapshots, resampled into
//! calendar buckets.

use crate::baskets::config::parse_timestamp;
use crate::error::{AppError, Result};
use crate::index::resample::{HistoricalPoint, Interval};
use crate::state::AppState;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;
pub const MAX_RANGE_DAYS: i64 = 365;

/// Years representable in the fixed-width stored timestamp format
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Raw query parameters; timestamps are ISO-8601, naive values taken as UTC
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub interval: Option<String>,
}

/// A validated query window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Interval,
}

/// History result
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub index_id: String,
    pub interval: Interval,
    pub data: Vec<HistoricalPoint>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|value| {
        let ts = parse_timestamp(value)
            .map_err(|_| AppError::Validation(format!("Invalid {}: '{}'", name, value)))?;
        if !YEAR_RANGE.contains(&ts.year()) {
            return Err(AppError::Validation(format!(
                "{} is out of range: '{}'",
                name, value
            )));
        }
        Ok(ts)
    })
    .transpose()
}

/// History service for business logic
pub struct HistoryService;

impl HistoryService {
    /// Apply defaults and reject bad ranges before any lookup
    pub fn validate(query: &HistoryQuery, now: DateTime<Utc>) -> Result<HistoryWindow> {
        let interval = match query.interval.as_deref() {
            Some(raw) => raw.parse::<Interval>()?,
            None => Interval::default(),
        };

        let end = parse_bound("end_date", query.end_date.as_deref())?.unwrap_or(now);
        let start = match parse_bound("start_date", query.start_date.as_deref())? {
            Some(start) => start,
            None => end
                .checked_sub_signed(Duration::days(DEFAULT_LOOKBACK_DAYS))
                .ok_or_else(|| AppError::Validation("end_date is out of range".to_string()))?,
        };

        if start >= end {
            return Err(AppError::Validation(
                "start_date must be before end_date".to_string(),
            ));
        }
        if (end - start).num_days() > MAX_RANGE_DAYS {
            return Err(AppError::Validation(format!(
                "Date range cannot exceed {} days",
                MAX_RANGE_DAYS
            )));
        }

        Ok(HistoryWindow {
            start,
            end,
            interval,
        })
    }

    /// Resampled price history of one index
    pub async fn get_history(
        state: &AppState,
        index_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryResult> {
        let window = Self::validate(query, Utc::now())?;
        info!(
            "HistoryService::get_history - {} {} {} to {}",
            index_id, window.interval, window.start, window.end
        );

        state.index_service.get_basket(index_id).await?;

        let records = state
            .store
            .query_snapshots(index_id, window.start, window.end)?;
        if records.is_empty() {
            warn!(
                "No historical data found for index {} between {} and {}",
                index_id, window.start, window.end
            );
        }

        let data = state
            .resampler
            .resample(&records, window.interval, window.start, window.end);
        info!(
            "Retrieved {} historical data points for {}",
            data.len(),
            index_id
        );

        Ok(HistoryResult {
            index_id: index_id.to_string(),
            interval: window.interval,
            data,
            start_date: window.start,
            end_date: window.end,
        })
    }
}
