//! Entity module for database models

pub mod networks;
pub mod prelude;
pub mod scrape_checkpoints;
pub mod transfers;
pub mod wallet_addresses;
