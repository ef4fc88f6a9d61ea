//! Core domain types shared by adapters, the run coordinator and the API

pub mod chain;
pub mod errors;
pub mod run_state;
pub mod transfer;

pub use chain::{Chain, PerChain, TransferType};
pub use errors::{AdapterError, RunError};
pub use run_state::{Phase, RunResults, RunScope, RunState, RunSummary, StatusSnapshot};
pub use transfer::{NetworkWallets, RawTransfer, TokenInfo, Transfer};
