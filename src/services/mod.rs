//! Services Layer
//!
//! Business logic called by the REST API handlers and the collector.
//!
//! # Services
//!
//! - `IndexService` - Index metadata, live price and volume
//! - `HistoryService` - Historical price series

pub mod history_service;
pub mod index_service;

pub use history_service::{HistoryQuery, HistoryResult, HistoryService, HistoryWindow};
pub use index_service::IndexService;
