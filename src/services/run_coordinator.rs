//! Run coordinator: the single writer of [`RunState`].
//!
//! Sequences networks, then chains within a network; wallets of one chain are
//! scraped concurrently up to the configured width. Adapter failures are
//! recorded per chain, store failures abort the run.

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::chains::{AdapterSet, RetryHandler};
use crate::config::{FailurePolicy, RunConfig};
use crate::db::repositories::TransferKey;
use crate::db::{DbError, Repositories};
use crate::domain::{
    AdapterError, Chain, NetworkWallets, RunError, RunResults, RunScope, RunState, RunSummary,
    StatusSnapshot, Transfer,
};
use crate::entity::transfers;
use crate::services::price_resolver::{PriceResolution, PriceResolver};

/// A full run accepted for background execution
pub struct StartedRun {
    /// Status right after the run entered `running`
    pub snapshot: StatusSnapshot,
    pub handle: JoinHandle<Result<RunResults, RunError>>,
}

/// Transfers gathered for one wallet
#[derive(Debug)]
struct WalletOutcome {
    address: String,
    fetched: usize,
    new: Vec<transfers::Model>,
    /// Older history was left unscanned and the checkpoint kept
    truncated: bool,
}

#[derive(Debug)]
enum WalletFailure {
    Adapter { address: String, error: AdapterError },
    Store(DbError),
}

pub struct RunCoordinator {
    state: RwLock<RunState>,
    repositories: Repositories,
    adapters: AdapterSet,
    prices: Arc<PriceResolver>,
    retry: RetryHandler,
    settings: RunConfig,
    wallet_permits: Semaphore,
}

impl RunCoordinator {
    pub fn new(
        repositories: Repositories,
        adapters: AdapterSet,
        prices: Arc<PriceResolver>,
        settings: RunConfig,
    ) -> Self {
        Self {
            state: RwLock::new(RunState::new()),
            repositories,
            adapters,
            prices,
            retry: RetryHandler::with_config(settings.max_attempts, settings.retry_base_delay_ms),
            wallet_permits: Semaphore::new(settings.wallet_concurrency.max(1)),
            settings,
        }
    }

    /// Copy of the current run state; never waits on scraping work
    pub fn snapshot(&self) -> StatusSnapshot {
        match self.state.read() {
            Ok(state) => state.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        }
    }

    fn write_state<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> Result<R, RunError> {
        let mut state = self.state.write().map_err(|_| RunError::StateLock)?;
        Ok(f(&mut state))
    }

    /// Terminal writes go through even on a poisoned lock so a run never stays `running`
    fn force_state(&self, f: impl FnOnce(&mut RunState) -> bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !f(&mut state) {
            tracing::warn!("Terminal transition ignored: no run active");
        }
    }

    fn try_begin(&self, scope: RunScope, total_networks: usize) -> Result<Uuid, RunError> {
        let run_id = Uuid::new_v4();
        let mut state = self.state.write().map_err(|_| RunError::StateLock)?;
        if !state.begin(run_id, scope, total_networks, Utc::now()) {
            return Err(RunError::Conflict(Box::new(state.snapshot())));
        }
        Ok(run_id)
    }

    /// Starts a run over every active network and returns immediately
    pub fn trigger_all(self: &Arc<Self>) -> Result<StartedRun, RunError> {
        let run_id = self.try_begin(RunScope::All, 0)?;
        let snapshot = self.snapshot();
        tracing::info!(%run_id, "Scrape run accepted for all networks");

        let coordinator = Arc::clone(self);
        let span = tracing::info_span!("scrape_run", %run_id);
        let handle = tokio::spawn(
            async move {
                let outcome = coordinator.run_all().await;
                coordinator.finish(run_id, outcome)
            }
            .instrument(span),
        );

        Ok(StartedRun { snapshot, handle })
    }

    async fn run_all(&self) -> Result<RunResults, RunError> {
        let networks = self.repositories.networks.find_scrapable().await?;
        self.write_state(|s| s.set_total_networks(networks.len()))?;
        tracing::info!("Scraping {} network(s)", networks.len());

        self.execute(&networks, None).await
    }

    /// Scrapes one network and returns once the run reached a terminal state
    pub async fn trigger_network(&self, network_id: &str) -> Result<RunResults, RunError> {
        let network = self
            .repositories
            .networks
            .find_active(network_id)
            .await?
            .ok_or_else(|| RunError::NetworkNotFound(network_id.to_string()))?;

        let run_id = self.try_begin(
            RunScope::Network {
                network_id: network.id.clone(),
            },
            1,
        )?;
        let span = tracing::info_span!("scrape_run", %run_id, network = %network.id);

        async {
            tracing::info!("Scrape run accepted for network {}", network.name);
            let outcome = self
                .execute(std::slice::from_ref(&network), Some(&network.id))
                .await
                .map(|mut results| {
                    results.summary.network_id = Some(network.id.clone());
                    results.summary.network_name = Some(network.name.clone());
                    results
                });
            self.finish(run_id, outcome)
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        networks: &[NetworkWallets],
        scope_network: Option<&str>,
    ) -> Result<RunResults, RunError> {
        let mut summary = RunSummary::default();
        let mut fresh: Vec<transfers::Model> = Vec::new();

        for network in networks {
            self.write_state(|s| s.enter_network(&network.name))?;
            self.scrape_network(network, &mut summary, &mut fresh).await?;
            summary.networks_scraped += 1;
            self.write_state(|s| s.network_done())?;
        }

        summary.backfilled_prices = self.backfill_prices(scope_network).await?;

        fresh.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        fresh.truncate(self.settings.sample_size);
        Ok(RunResults {
            summary,
            sample: fresh.into_iter().map(Transfer::from).collect(),
        })
    }

    async fn scrape_network(
        &self,
        network: &NetworkWallets,
        summary: &mut RunSummary,
        fresh: &mut Vec<transfers::Model>,
    ) -> Result<(), RunError> {
        for chain in Chain::ALL {
            let addresses = network.addresses(chain);
            if addresses.is_empty() {
                continue;
            }
            self.write_state(|s| s.chain_started(chain))?;

            let mut tasks: FuturesUnordered<_> = addresses
                .iter()
                .map(|address| self.scrape_wallet(chain, &network.id, address))
                .collect();

            let mut chain_failed = false;
            let mut fatal = None;
            while let Some(result) = tasks.next().await {
                let tally = summary.breakdown.get_mut(chain);
                tally.wallets_attempted += 1;
                match result {
                    Ok(outcome) => {
                        let usd: rust_decimal::Decimal =
                            outcome.new.iter().filter_map(|t| t.usd_value).sum();
                        let unpriced = outcome.new.iter().filter(|t| t.usd_value.is_none()).count();

                        tally.fetched += outcome.fetched;
                        tally.count += outcome.new.len();
                        tally.total_usd_value += usd;
                        summary.total_transactions += outcome.fetched;
                        summary.new_transactions += outcome.new.len();
                        summary.total_usd_value += usd;
                        summary.unpriced_transactions += unpriced;
                        if outcome.truncated {
                            tracing::warn!(network = %network.id, %chain, address = %outcome.address, "Wallet history truncated");
                            tally.wallets_truncated += 1;
                            tally.errors.push(format!(
                                "{} ({}): history truncated, checkpoint not advanced",
                                outcome.address, network.name
                            ));
                        }
                        fresh.extend(outcome.new);
                    }
                    Err(WalletFailure::Adapter { address, error }) => {
                        tracing::warn!(network = %network.id, %chain, %address, "Wallet scrape failed: {}", error);
                        tally.wallets_failed += 1;
                        tally.errors.push(format!("{} ({}): {}", address, network.name, error));
                        chain_failed = true;
                    }
                    Err(WalletFailure::Store(e)) => {
                        tracing::error!(network = %network.id, %chain, "Store write failed: {}", e);
                        fatal.get_or_insert(e);
                    }
                }
            }
            drop(tasks);

            if let Some(e) = fatal {
                return Err(e.into());
            }
            self.write_state(|s| s.chain_finished(chain, !chain_failed, Utc::now()))?;
        }
        Ok(())
    }

    async fn scrape_wallet(
        &self,
        chain: Chain,
        network_id: &str,
        address: &str,
    ) -> Result<WalletOutcome, WalletFailure> {
        let _permit = self.wallet_permits.acquire().await.map_err(|e| WalletFailure::Adapter {
            address: address.to_string(),
            error: AdapterError::Unavailable(e.to_string()),
        })?;

        let adapter = self.adapters.get(chain).as_ref();
        let since = self
            .repositories
            .checkpoints
            .get(chain, address)
            .await
            .map_err(WalletFailure::Store)?;

        let timeout = self.settings.adapter_timeout;
        let outcome = self
            .retry
            .execute_with_retry_and_logging(
                move || async move {
                    match tokio::time::timeout(timeout, adapter.fetch_incoming(address, since)).await {
                        Ok(result) => result,
                        Err(_) => Err(AdapterError::Unavailable(format!(
                            "no response within {:?}",
                            timeout
                        ))),
                    }
                },
                "fetch_incoming",
                chain.as_str(),
            )
            .await
            .map_err(|error| WalletFailure::Adapter {
                address: address.to_string(),
                error,
            })?;

        let fetched = outcome.transfers.len();
        let mut new = Vec::new();
        for raw in outcome.transfers {
            let usd_value = self
                .prices
                .usd_value(&raw.token.symbol, raw.amount, raw.timestamp)
                .await
                .usd_value();

            let model = transfers::Model {
                chain: chain.as_str().to_string(),
                transaction_hash: raw.transaction_hash,
                log_index: raw.log_index,
                to_address: raw.to_address,
                from_address: raw.from_address,
                token_symbol: raw.token.symbol,
                token_name: raw.token.name,
                amount: raw.amount,
                usd_value,
                transfer_type: raw.transfer_type.as_str().to_string(),
                block_number: raw.block_number,
                timestamp: raw.timestamp,
                network_id: network_id.to_string(),
                wallet_address: address.to_string(),
                data_source: adapter.data_source().to_string(),
                scraped_at: Utc::now(),
            };

            let is_new = self
                .repositories
                .transfers
                .upsert(model.clone())
                .await
                .map_err(WalletFailure::Store)?;
            if is_new {
                new.push(model);
            }
        }

        // only after every transfer up to the checkpoint is stored
        if let Some(checkpoint) = outcome.checkpoint.filter(|cp| Some(*cp) != since) {
            self.repositories
                .checkpoints
                .save(chain, address, checkpoint)
                .await
                .map_err(WalletFailure::Store)?;
        }

        tracing::debug!(%chain, address, fetched, new = new.len(), "Wallet scraped");
        Ok(WalletOutcome {
            address: address.to_string(),
            fetched,
            new,
            truncated: outcome.truncated,
        })
    }

    /// Re-prices stored transfers whose USD value is still missing
    async fn backfill_prices(&self, network_id: Option<&str>) -> Result<usize, RunError> {
        if self.settings.backfill_batch == 0 {
            return Ok(0);
        }

        let pending = self
            .repositories
            .transfers
            .find_unpriced(network_id, self.settings.backfill_batch)
            .await?;

        let mut filled = 0;
        for row in &pending {
            if let PriceResolution::Resolved(usd) = self
                .prices
                .usd_value(&row.token_symbol, row.amount, row.timestamp)
                .await
            {
                if self
                    .repositories
                    .transfers
                    .backfill_usd_value(&TransferKey::from(row), usd)
                    .await?
                {
                    filled += 1;
                }
            }
        }

        if filled > 0 {
            tracing::info!("Backfilled {} of {} unpriced transfer(s)", filled, pending.len());
        }
        Ok(filled)
    }

    /// Applies the terminal transition for `run_id`; this is the last state write of a run
    fn finish(
        &self,
        run_id: Uuid,
        outcome: Result<RunResults, RunError>,
    ) -> Result<RunResults, RunError> {
        let now = Utc::now();

        let results = match outcome {
            Ok(results) => results,
            Err(e) => {
                let message = e.to_string();
                tracing::error!(%run_id, "Scrape run failed: {}", message);
                self.force_state(|s| s.fail(message.clone(), None, now));
                return Err(RunError::Failed(message));
            }
        };

        let degradation = results.summary.degradation();
        let attempted = results.summary.wallets_attempted();
        let failed = results.summary.wallets_failed();
        let run_failed = match self.settings.failure_policy {
            FailurePolicy::Strict => failed > 0,
            FailurePolicy::Tolerant => attempted > 0 && failed == attempted,
        };

        if run_failed {
            let message = degradation.unwrap_or_else(|| "every wallet failed".to_string());
            tracing::error!(%run_id, "Scrape run failed: {}", message);
            self.force_state(|s| s.fail(message.clone(), Some(results), now));
            return Err(RunError::Failed(message));
        }

        if let Some(message) = &degradation {
            tracing::warn!(%run_id, "Scrape run completed with errors: {}", message);
        }
        tracing::info!(
            %run_id,
            new = results.summary.new_transactions,
            usd = %results.summary.total_usd_value,
            "Scrape run completed"
        );
        self.force_state(|s| s.complete(results.clone(), degradation, now));
        Ok(results)
    }
}
