//! Collector run bookkeeping

use crate::db::models::QuerierStatusRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Folds collection runs into a [`QuerierStatusRecord`]
pub struct StatusTracker;

impl StatusTracker {
    /// Record one run on top of `existing`.
    ///
    /// A successful run keeps the previous error fields so the last failure
    /// stays visible.
    pub fn apply_run(
        existing: Option<QuerierStatusRecord>,
        name: &str,
        success: bool,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> QuerierStatusRecord {
        let mut status = existing.unwrap_or_else(|| QuerierStatusRecord::new(name, now));

        status.last_run_at = Some(now);
        status.total_runs += 1;
        status.updated_at = now;

        if success {
            status.successful_runs += 1;
            status.last_success_at = Some(now);
        } else {
            status.failed_runs += 1;
            status.last_error_at = Some(now);
            status.last_error_message = error;
        }

        status
    }
}

/// Read-only status projection with a derived success rate
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    #[serde(flatten)]
    pub record: QuerierStatusRecord,
    pub success_rate: f64,
}

impl From<QuerierStatusRecord> for CollectorStatus {
    fn from(record: QuerierStatusRecord) -> Self {
        let success_rate = if record.total_runs > 0 {
            record.successful_runs as f64 / record.total_runs as f64
        } else {
            0.0
        };
        Self {
            record,
            success_rate,
        }
    }
}
