//! Prelude module for convenient imports

pub use super::networks::Entity as Networks;
pub use super::scrape_checkpoints::Entity as ScrapeCheckpoints;
pub use super::transfers::Entity as Transfers;
pub use super::wallet_addresses::Entity as WalletAddresses;
