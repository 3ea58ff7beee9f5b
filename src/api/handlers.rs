//! REST API handlers
//!
//! Each handler delegates to a service and lets `AppError` pick the status.

use crate::api::types::{
    FundDetailResponse, FundListResponse, FundSummary, ForceRunResponse, HealthResponse,
    IndexListResponse, QuerierSettings, QuerierStatusResponse, ServiceInfo,
};
use crate::baskets::Basket;
use crate::error::Result;
use crate::index::{Cached, Valuation, VolumeValuation};
use crate::services::{HistoryQuery, HistoryResult, HistoryService};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

type ApiState = State<Arc<AppState>>;

// ============================================================================
// Public
// ============================================================================

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::current())
}

pub async fn health_check(State(state): ApiState) -> Json<HealthResponse> {
    let status = state.collector.get_status().unwrap_or_else(|e| {
        warn!("Could not read collector status for health check: {}", e);
        None
    });

    let quotes = state.index_service.quote_source();
    let reachable = quotes.health_check().await;
    if !reachable {
        warn!("Quote source {} is not answering", quotes.id());
    }

    Json(HealthResponse::build(
        &state,
        status.as_ref(),
        reachable,
        Utc::now(),
    ))
}

// ============================================================================
// Indexes
// ============================================================================

/// GET /indexes
pub async fn list_indexes(State(state): ApiState) -> Result<Json<IndexListResponse>> {
    let baskets = state.index_service.list_baskets().await?;
    Ok(Json(baskets.into()))
}

/// GET /indexes/:index_id
pub async fn get_index(
    State(state): ApiState,
    Path(index_id): Path<String>,
) -> Result<Json<Basket>> {
    Ok(Json(state.index_service.basket_detail(&index_id).await?))
}

/// GET /indexes/:index_id/price
pub async fn get_index_price(
    State(state): ApiState,
    Path(index_id): Path<String>,
) -> Result<Json<Cached<Valuation>>> {
    Ok(Json(state.index_service.calculate_index_price(&index_id).await?))
}

/// GET /indexes/:index_id/history
pub async fn get_index_history(
    State(state): ApiState,
    Path(index_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResult>> {
    Ok(Json(HistoryService::get_history(&state, &index_id, &query).await?))
}

/// GET /indexes/:index_id/volume
pub async fn get_index_volume(
    State(state): ApiState,
    Path(index_id): Path<String>,
) -> Result<Json<Cached<VolumeValuation>>> {
    Ok(Json(state.index_service.get_index_volume(&index_id).await?))
}

// ============================================================================
// Linkage Finance funds
// ============================================================================

/// GET /linkage-funds
pub async fn list_linkage_funds(State(state): ApiState) -> Result<Json<FundListResponse>> {
    let funds = state.funds.all_funds().await?;
    let funds: Vec<FundSummary> = funds.iter().map(FundSummary::from).collect();
    Ok(Json(FundListResponse {
        total_count: funds.len(),
        funds,
    }))
}

/// GET /linkage-funds/:fund_id
pub async fn get_linkage_fund(
    State(state): ApiState,
    Path(fund_id): Path<String>,
) -> Result<Json<FundDetailResponse>> {
    let fund = state.funds.fund_by_id(&fund_id).await?;
    Ok(Json(fund.into()))
}

// ============================================================================
// Collector admin
// ============================================================================

/// GET /admin/querier/status
pub async fn get_querier_status(State(state): ApiState) -> Result<Json<QuerierStatusResponse>> {
    let Some(status) = state.collector.get_status()? else {
        return Ok(Json(QuerierStatusResponse::NotStarted {
            message: "Querier has not started yet",
        }));
    };

    let settings = &state.settings;
    Ok(Json(QuerierStatusResponse::Status {
        querier_status: status,
        settings: QuerierSettings {
            enabled: settings.querier_enabled,
            interval_minutes: settings.querier_interval_minutes,
            startup_delay_seconds: settings.querier_startup_delay_seconds,
            error_backoff_seconds: settings.querier_error_backoff_seconds,
        },
    }))
}

/// POST /admin/querier/force-run
pub async fn force_querier_run(State(state): ApiState) -> Json<ForceRunResponse> {
    info!("Forced collection requested");
    let result = state.collector.force_collection().await;
    Json(ForceRunResponse {
        message: "Forced data collection completed",
        result,
    })
}
