// Scraper status, trigger, summary and history endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::domain::{RunResults, StatusSnapshot};
use crate::error::{ApiError, ApiResult};
use crate::handlers::AppState;
use crate::models::{
    ApiResponse, HistoryParams, RecentParams, RecentTransactionsResponse, SummaryParams,
    TransactionHistoryResponse,
};
use crate::services::aggregation::{self, NetworkSummary};
use crate::services::transaction_service;

/// Handler for GET /blockchain/status
pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<StatusSnapshot>> {
    Json(ApiResponse::ok(state.coordinator.snapshot()))
}

/// Handler for POST /blockchain/scrape - starts a run over all networks
pub async fn trigger_scrape(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<ApiResponse<StatusSnapshot>>)> {
    let started = state.coordinator.trigger_all()?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::with_message(
            started.snapshot,
            "Blockchain scrapers started successfully. Poll /blockchain/status for progress.",
        )),
    ))
}

/// Handler for POST /blockchain/scrape/{network_id} - returns after the run finished
pub async fn trigger_network_scrape(
    State(state): State<AppState>,
    Path(network_id): Path<String>,
) -> ApiResult<Json<ApiResponse<RunResults>>> {
    let results = state.coordinator.trigger_network(&network_id).await?;
    let name = results
        .summary
        .network_name
        .clone()
        .unwrap_or_else(|| network_id.clone());

    Ok(Json(ApiResponse::with_message(
        results,
        format!("Blockchain scrape completed for network {}", name),
    )))
}

/// Handler for GET /blockchain/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let window = params.window().map_err(ApiError::InvalidRequest)?;
    let summary = aggregation::global_summary(&state.repositories, window).await?;

    Ok(Json(ApiResponse::ok(json!({ "summary": summary }))))
}

/// Handler for GET /blockchain/networks/{network_id}/summary
pub async fn get_network_summary(
    State(state): State<AppState>,
    Path(network_id): Path<String>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Json<ApiResponse<NetworkSummary>>> {
    let window = params.window().map_err(ApiError::InvalidRequest)?;
    let summary = aggregation::network_summary(&state.repositories, &network_id, window)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("network {}", network_id)))?;

    Ok(Json(ApiResponse::ok(summary)))
}

/// Handler for GET /blockchain/networks/{network_id}/transactions
pub async fn get_network_transactions(
    State(state): State<AppState>,
    Path(network_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<ApiResponse<TransactionHistoryResponse>>> {
    let filter = params.to_filter().map_err(ApiError::InvalidRequest)?;
    if state.repositories.networks.find_by_id(&network_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("network {}", network_id)));
    }

    let page =
        transaction_service::network_transactions(&state.repositories, &network_id, &filter)
            .await?;

    Ok(Json(ApiResponse::ok(TransactionHistoryResponse {
        transactions: page.transactions,
        pagination: page.pagination,
        filters: params,
        network_id,
    })))
}

/// Handler for GET /blockchain/transactions
pub async fn get_recent_transactions(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<ApiResponse<RecentTransactionsResponse>>> {
    let limit = params.limit().map_err(ApiError::InvalidRequest)?;
    let transactions = transaction_service::recent_transactions(&state.repositories, limit).await?;

    Ok(Json(ApiResponse::ok(RecentTransactionsResponse {
        count: transactions.len(),
        transactions,
        limit,
    })))
}
