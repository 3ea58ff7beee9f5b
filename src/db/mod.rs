//! Persistence layer

pub mod models;
pub mod sqlite;

use crate::error::Result;
use chrono::{DateTime, Utc};
use models::{HistoricalSnapshot, QuerierStatusRecord};

pub use sqlite::SqliteDb;

/// Storage for collected snapshots and collector status.
///
/// Every call is its own transaction.
pub trait HistoryStore: Send + Sync {
    /// Append one snapshot, returning its row id
    fn append_snapshot(&self, snapshot: &HistoricalSnapshot) -> Result<i64>;

    /// Successful snapshots of `basket_id` in `[start, end]`, oldest first
    fn query_snapshots(
        &self,
        basket_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoricalSnapshot>>;

    /// Every snapshot of `basket_id`, failures included, oldest first
    fn list_snapshots(&self, basket_id: &str) -> Result<Vec<HistoricalSnapshot>>;

    fn upsert_status(&self, status: &QuerierStatusRecord) -> Result<()>;

    fn read_status(&self, name: &str) -> Result<Option<QuerierStatusRecord>>;
}
