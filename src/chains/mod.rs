//! Chain adapters: one per explorer API, each normalizing incoming transfers
//! for a single address into [`RawTransfer`] records.

pub mod bitcoin;
pub mod ethereum;
mod http;
pub mod retry;
pub mod tron;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use crate::config::ExplorerConfig;
use crate::domain::{AdapterError, Chain, PerChain, RawTransfer};

pub use bitcoin::BitcoinAdapter;
pub use ethereum::EthereumAdapter;
pub use retry::RetryHandler;
pub use tron::TronAdapter;

/// Transfers found by one adapter call plus the position to resume from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub transfers: Vec<RawTransfer>,
    /// Highest position observed; `None` when nothing was scanned yet
    pub checkpoint: Option<i64>,
    /// The page cap stopped a newest-first scan before it reached the oldest
    /// history; `checkpoint` then stays where it was so the gap is rescanned
    pub truncated: bool,
}

/// Source of incoming transfers for one chain.
///
/// Calls must be safe to repeat: adapters may re-return transfers at the
/// checkpoint boundary, deduplication happens in the store.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> Chain;

    /// Label stored with every transfer this adapter produced
    fn data_source(&self) -> &'static str;

    async fn fetch_incoming(
        &self,
        address: &str,
        since: Option<i64>,
    ) -> Result<FetchOutcome, AdapterError>;
}

/// The adapter set used by the run coordinator
pub type AdapterSet = PerChain<Arc<dyn ChainAdapter>>;

/// Builds the explorer-backed adapters sharing one HTTP client
pub fn build_adapters(config: &ExplorerConfig, client: Client) -> AdapterSet {
    PerChain {
        bitcoin: Arc::new(BitcoinAdapter::new(client.clone(), config)),
        ethereum: Arc::new(EthereumAdapter::new(client.clone(), config)),
        tron: Arc::new(TronAdapter::new(client, config)),
    }
}

/// Keeps a checkpoint from moving backwards
pub(crate) fn advance(since: Option<i64>, seen: Option<i64>) -> Option<i64> {
    match (since, seen) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Page accounting for explorers that list history newest first.
///
/// With a checkpoint the scan stops on its own once it pages past it, so no
/// cap applies. A first scan is capped at `max_pages`; if the cap cuts it
/// short the checkpoint is withheld, otherwise the older history it never
/// reached would sit below the checkpoint and never be fetched.
#[derive(Debug)]
pub(crate) struct NewestFirstPaging {
    since: Option<i64>,
    max_pages: u32,
    pages: u32,
    highest: Option<i64>,
    truncated: bool,
}

impl NewestFirstPaging {
    pub fn new(since: Option<i64>, max_pages: u32) -> Self {
        Self {
            since,
            max_pages: max_pages.max(1),
            pages: 0,
            highest: None,
            truncated: false,
        }
    }

    /// Records one fetched page and the highest position it held
    pub fn record(&mut self, highest: Option<i64>) {
        self.pages += 1;
        self.highest = advance(self.highest, highest);
    }

    /// Called when the explorer has more pages; false once the cap is hit
    pub fn may_continue(&mut self, chain: Chain, address: &str) -> bool {
        if self.since.is_some() || self.pages < self.max_pages {
            return true;
        }
        tracing::warn!(
            chain = chain.as_str(),
            address,
            "History truncated after {} pages, checkpoint not advanced",
            self.max_pages
        );
        self.truncated = true;
        false
    }

    pub fn into_outcome(self, transfers: Vec<RawTransfer>) -> FetchOutcome {
        let checkpoint = if self.truncated {
            self.since
        } else {
            advance(self.since, self.highest)
        };
        FetchOutcome {
            transfers,
            checkpoint,
            truncated: self.truncated,
        }
    }
}
