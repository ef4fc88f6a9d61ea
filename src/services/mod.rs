// Services Module
// Business logic between the HTTP handlers and the repositories

pub mod aggregation;
pub mod price_resolver;
pub mod run_coordinator;
pub mod scheduler;
pub mod transaction_service;

pub use price_resolver::{CoinGeckoSource, PriceResolver, PriceSource};
pub use run_coordinator::RunCoordinator;
