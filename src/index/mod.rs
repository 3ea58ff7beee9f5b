//! Index valuation engine

pub mod aggregator;
pub mod cache;
pub mod resample;
pub mod selector;

pub use aggregator::{compute, compute_volume, Valuation, VolumeValuation};
pub use cache::{Cached, TtlCache};
pub use resample::{HistoricalPoint, Interval, Resampler};
