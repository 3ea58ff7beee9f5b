//! REST API module
//!
//! Provides:
//! - Service info and health (`/`, `/health`)
//! - Index metadata, live price, volume and history (`/indexes/*`)
//! - Linkage Finance funds (`/linkage-funds/*`)
//! - Collector administration (`/admin/querier/*`)

mod auth;
mod handlers;
mod server;
pub mod types;

pub use auth::mask_api_key;
pub use server::{router, ApiServer};
