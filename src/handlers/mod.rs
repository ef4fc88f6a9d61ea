// Handlers Module
// This module contains the API endpoint handlers

pub mod blockchain;
pub mod health;

use std::sync::Arc;

use crate::db::Repositories;
use crate::services::RunCoordinator;

/// Shared state handed to every handler
pub struct AppContext {
    pub repositories: Repositories,
    pub coordinator: Arc<RunCoordinator>,
}

// Type alias for the application state
pub type AppState = Arc<AppContext>;

pub use blockchain::{
    get_network_summary, get_network_transactions, get_recent_transactions, get_status,
    get_summary, trigger_network_scrape, trigger_scrape,
};
pub use health::health_check;
