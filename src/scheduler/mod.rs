//! Scheduler module
//!
//! Background collection of index snapshots and its run bookkeeping.

mod collector;
mod status;

pub use collector::{
    CollectorConfig, CollectorState, ForcedRunResult, HistoricalCollector, PassSummary,
    DEFAULT_QUERIER_NAME,
};
pub use status::{CollectorStatus, StatusTracker};
