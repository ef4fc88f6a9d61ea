//! Process-wide run state machine.
//!
//! `idle -> running -> {completed, failed}`; a terminal state is left only
//! when the next run begins. Every transition is a plain method so the
//! coordinator can apply it inside one short write-lock section.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chain::{Chain, PerChain};
use super::transfer::Transfer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// What a run covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RunScope {
    All,
    Network {
        #[serde(rename = "networkId")]
        network_id: String,
    },
}

/// Per-chain tallies accumulated during a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTally {
    /// Newly ingested transfers
    pub count: usize,
    pub fetched: usize,
    pub total_usd_value: Decimal,
    pub wallets_attempted: usize,
    pub wallets_failed: usize,
    /// Wallets whose history was cut short by the page cap
    #[serde(default)]
    pub wallets_truncated: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    pub networks_scraped: usize,
    /// Transfers returned by the explorers, new or not
    pub total_transactions: usize,
    pub new_transactions: usize,
    /// USD value of the newly ingested transfers
    pub total_usd_value: Decimal,
    pub unpriced_transactions: usize,
    pub backfilled_prices: usize,
    pub breakdown: PerChain<ChainTally>,
}

impl RunSummary {
    /// Human readable description of every degraded chain, if any
    pub fn degradation(&self) -> Option<String> {
        let mut parts = Vec::new();
        for (chain, t) in self.breakdown.iter() {
            if t.wallets_failed > 0 {
                let first = t.errors.first().map(String::as_str).unwrap_or("unknown error");
                parts.push(format!(
                    "{}: {} of {} wallet(s) failed ({})",
                    chain, t.wallets_failed, t.wallets_attempted, first
                ));
            }
            if t.wallets_truncated > 0 {
                parts.push(format!(
                    "{}: {} wallet(s) with truncated history",
                    chain, t.wallets_truncated
                ));
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }

    pub fn wallets_attempted(&self) -> usize {
        self.breakdown.iter().map(|(_, t)| t.wallets_attempted).sum()
    }

    pub fn wallets_failed(&self) -> usize {
        self.breakdown.iter().map(|(_, t)| t.wallets_failed).sum()
    }
}

/// Summary plus a sample of the transfers ingested by a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub summary: RunSummary,
    pub sample: Vec<Transfer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStatus {
    pub run_id: Option<Uuid>,
    pub scope: Option<RunScope>,
    pub state: Phase,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_networks: usize,
    pub networks_processed: usize,
    pub current_network: Option<String>,
    pub progress: u8,
    pub error: Option<String>,
    pub last_results: Option<RunResults>,
}

/// Read-only copy of the run state handed to status readers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: PerChain<Phase>,
    pub last_scrape_time: PerChain<Option<DateTime<Utc>>>,
    pub is_running: bool,
    pub overall: OverallStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RunState {
    status: PerChain<Phase>,
    last_scrape_time: PerChain<Option<DateTime<Utc>>>,
    overall: OverallStatus,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.overall.state
    }

    pub fn is_running(&self) -> bool {
        self.overall.state == Phase::Running
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status.clone(),
            last_scrape_time: self.last_scrape_time.clone(),
            is_running: self.is_running(),
            overall: self.overall.clone(),
        }
    }

    /// Compare-and-set into `running`. Returns false when a run is already active.
    pub fn begin(
        &mut self,
        run_id: Uuid,
        scope: RunScope,
        total_networks: usize,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_running() {
            return false;
        }

        self.status = PerChain::default();
        self.overall = OverallStatus {
            run_id: Some(run_id),
            scope: Some(scope),
            state: Phase::Running,
            start_time: Some(now),
            total_networks,
            ..OverallStatus::default()
        };
        true
    }

    /// Sets the network count once the run has enumerated its scope
    pub fn set_total_networks(&mut self, total: usize) {
        if self.is_running() && self.overall.networks_processed == 0 {
            self.overall.total_networks = total;
        }
    }

    pub fn enter_network(&mut self, name: &str) {
        if self.is_running() {
            self.overall.current_network = Some(name.to_string());
        }
    }

    /// Counts one network as processed and recomputes progress
    pub fn network_done(&mut self) {
        if !self.is_running() {
            return;
        }
        let total = self.overall.total_networks;
        let processed = (self.overall.networks_processed + 1).min(total);
        self.overall.networks_processed = processed;
        self.overall.progress = progress_percent(processed, total).max(self.overall.progress);
    }

    pub fn chain_started(&mut self, chain: Chain) {
        if !self.is_running() {
            return;
        }
        let status = self.status.get_mut(chain);
        // a failure stays visible for the rest of the run
        if *status != Phase::Failed {
            *status = Phase::Running;
        }
    }

    pub fn chain_finished(&mut self, chain: Chain, succeeded: bool, now: DateTime<Utc>) {
        if !self.is_running() {
            return;
        }
        let status = self.status.get_mut(chain);
        if succeeded {
            if *status != Phase::Failed {
                *status = Phase::Completed;
            }
            *self.last_scrape_time.get_mut(chain) = Some(now);
        } else {
            *status = Phase::Failed;
        }
    }

    /// Terminal transition to `completed`. Returns false if no run was active.
    pub fn complete(
        &mut self,
        results: RunResults,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_running() {
            return false;
        }
        if self.overall.total_networks == 0 {
            self.overall.progress = 100;
        }
        self.overall.current_network = None;
        self.overall.end_time = Some(now);
        self.overall.error = error;
        self.overall.last_results = Some(results);
        self.overall.state = Phase::Completed;
        true
    }

    /// Terminal transition to `failed`. Returns false if no run was active.
    pub fn fail(
        &mut self,
        error: String,
        results: Option<RunResults>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_running() {
            return false;
        }
        // chains still marked running were interrupted
        for chain in Chain::ALL {
            let status = self.status.get_mut(chain);
            if *status == Phase::Running {
                *status = Phase::Failed;
            }
        }
        self.overall.current_network = None;
        self.overall.end_time = Some(now);
        self.overall.error = Some(error);
        self.overall.last_results = results;
        self.overall.state = Phase::Failed;
        true
    }
}

/// `floor(100 * processed / total)`, clamped to 0..=100
pub fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((processed.min(total) * 100) / total) as u8
}
