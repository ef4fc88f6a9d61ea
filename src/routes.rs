// HTTP routes of the scraper service

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    get_network_summary, get_network_transactions, get_recent_transactions, get_status,
    get_summary, health_check, trigger_network_scrape, trigger_scrape, AppState,
};

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/blockchain/status", get(get_status))
        .route("/blockchain/scrape", post(trigger_scrape))
        .route("/blockchain/scrape/{network_id}", post(trigger_network_scrape))
        .route("/blockchain/summary", get(get_summary))
        .route("/blockchain/transactions", get(get_recent_transactions))
        .route(
            "/blockchain/networks/{network_id}/summary",
            get(get_network_summary),
        )
        .route(
            "/blockchain/networks/{network_id}/transactions",
            get(get_network_transactions),
        )
        .with_state(state)
}
