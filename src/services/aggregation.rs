//! Aggregation engine: summaries computed on read from persisted transfers.
//!
//! Chain totals count only transfers received by a currently configured
//! wallet; transfers to addresses no longer configured are reported as
//! `unmatched` so they stay visible without inflating the totals.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::db::{DbError, Repositories};
use crate::domain::{Chain, NetworkWallets, PerChain, Transfer};
use crate::entity::transfers;

const RECENT_PER_WALLET: usize = 5;
const RECENT_PER_SUMMARY: usize = 10;
/// Longest trailing window accepted from a request (100 years)
pub const MAX_TRAILING_DAYS: u32 = 36_525;

/// `[first day of month, first day of next month)` in UTC, `None` outside chrono's range
fn month_range(month: u32, year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((
        start.and_hms_opt(0, 0, 0)?.and_utc(),
        end.and_hms_opt(0, 0, 0)?.and_utc(),
    ))
}

/// Time window of a summary, evaluated in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Trailing days from now; 0 means all time
    TrailingDays(u32),
    /// A calendar month, `[first day, first day of next month)`
    Month { month: u32, year: i32 },
}

impl Default for Window {
    fn default() -> Self {
        Window::TrailingDays(30)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodInfo {
    pub days: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub is_month_filter: bool,
}

impl Window {
    /// Builds a window from query parameters; month and year must come together
    pub fn from_params(days: Option<i64>, month: Option<u32>, year: Option<i32>) -> Result<Self, String> {
        match (month, year) {
            (Some(month), Some(year)) => {
                if !(1..=12).contains(&month) {
                    return Err(format!("month must be between 1 and 12, got {}", month));
                }
                if month_range(month, year).is_none() {
                    return Err(format!("year out of range: {}", year));
                }
                Ok(Window::Month { month, year })
            }
            (None, None) => match days {
                None => Ok(Window::default()),
                Some(d) if d < 0 => Err(format!("days must not be negative, got {}", d)),
                Some(d) => u32::try_from(d)
                    .ok()
                    .filter(|d| *d <= MAX_TRAILING_DAYS)
                    .map(Window::TrailingDays)
                    .ok_or_else(|| format!("days must be at most {}, got {}", MAX_TRAILING_DAYS, d)),
            },
            _ => Err("month and year must be provided together".to_string()),
        }
    }

    /// Inclusive start and exclusive end; `None` is unbounded
    pub fn bounds(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match *self {
            Window::TrailingDays(0) => (None, None),
            // a start before chrono's range covers everything stored
            Window::TrailingDays(days) => (now.checked_sub_signed(Duration::days(i64::from(days))), None),
            Window::Month { month, year } => match month_range(month, year) {
                Some((start, end)) => (Some(start), Some(end)),
                // an unrepresentable month matches nothing
                None => (Some(now), Some(now)),
            },
        }
    }

    pub fn period_info(&self) -> PeriodInfo {
        match *self {
            Window::TrailingDays(days) => PeriodInfo {
                days: Some(days),
                month: None,
                year: None,
                is_month_filter: false,
            },
            Window::Month { month, year } => PeriodInfo {
                days: None,
                month: Some(month),
                year: Some(year),
                is_month_filter: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStats {
    pub address: String,
    pub count: usize,
    pub total_usd_value: Decimal,
    pub recent_transactions: Vec<Transfer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBreakdown {
    pub count: usize,
    pub total_usd_value: Decimal,
    /// First configured wallet, kept for single-address displays
    pub wallet_address: Option<String>,
    pub wallets: Vec<WalletStats>,
    pub unmatched_count: usize,
    pub unmatched_usd_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub total_wallets: usize,
    pub bitcoin: usize,
    pub ethereum: usize,
    pub tron: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub network_id: String,
    pub network_name: String,
    pub total_transactions: usize,
    pub total_usd_value: Decimal,
    pub breakdown: PerChain<ChainBreakdown>,
    pub wallet_summary: WalletSummary,
    pub recent_transactions: Vec<Transfer>,
    pub period_info: PeriodInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTotals {
    pub count: usize,
    pub total_usd_value: Decimal,
    pub networks_with_wallets: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDetail {
    pub network_id: String,
    pub network_name: String,
    pub total_transactions: usize,
    pub total_usd_value: Decimal,
    pub breakdown: PerChain<ChainTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSummary {
    pub total_transactions: usize,
    pub total_usd_value: Decimal,
    pub total_networks: usize,
    pub active_networks_with_wallets: usize,
    pub breakdown: PerChain<ChainTotals>,
    pub network_details: Vec<NetworkDetail>,
    pub recent_transactions: Vec<Transfer>,
    pub period_info: PeriodInfo,
}

fn same_address(chain: Chain, a: &str, b: &str) -> bool {
    match chain {
        // hex addresses are case-insensitive
        Chain::Ethereum => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

fn newest_first(mut rows: Vec<&transfers::Model>, take: usize) -> Vec<Transfer> {
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows.into_iter().take(take).cloned().map(Transfer::from).collect()
}

/// Summarizes one network. `rows` must already be limited to the network and window.
pub fn summarize_network(
    network: &NetworkWallets,
    rows: &[transfers::Model],
    window: Window,
) -> NetworkSummary {
    let mut breakdown: PerChain<ChainBreakdown> = PerChain::default();
    let mut matched_rows: Vec<&transfers::Model> = Vec::new();

    for chain in Chain::ALL {
        let configured = network.addresses(chain);
        let chain_rows: Vec<&transfers::Model> =
            rows.iter().filter(|r| r.chain == chain.as_str()).collect();
        let entry = breakdown.get_mut(chain);

        let mut wallets: Vec<WalletStats> = configured
            .iter()
            .map(|address| {
                let mine: Vec<&transfers::Model> = chain_rows
                    .iter()
                    .copied()
                    .filter(|r| same_address(chain, &r.to_address, address))
                    .collect();
                WalletStats {
                    address: address.clone(),
                    count: mine.len(),
                    total_usd_value: mine.iter().filter_map(|r| r.usd_value).sum(),
                    recent_transactions: newest_first(mine, RECENT_PER_WALLET),
                }
            })
            .collect();
        wallets.sort_by(|a, b| b.total_usd_value.cmp(&a.total_usd_value));

        for &row in &chain_rows {
            if configured.iter().any(|a| same_address(chain, &row.to_address, a)) {
                matched_rows.push(row);
            } else {
                entry.unmatched_count += 1;
                entry.unmatched_usd_value += row.usd_value.unwrap_or_default();
            }
        }

        entry.count = wallets.iter().map(|w| w.count).sum();
        entry.total_usd_value = wallets.iter().map(|w| w.total_usd_value).sum();
        entry.wallet_address = configured.first().cloned();
        entry.wallets = wallets;
    }

    let wallet_summary = WalletSummary {
        total_wallets: network.wallet_count(),
        bitcoin: network.wallets.bitcoin.len(),
        ethereum: network.wallets.ethereum.len(),
        tron: network.wallets.tron.len(),
    };

    NetworkSummary {
        network_id: network.id.clone(),
        network_name: network.name.clone(),
        total_transactions: breakdown.iter().map(|(_, b)| b.count).sum(),
        total_usd_value: breakdown.iter().map(|(_, b)| b.total_usd_value).sum(),
        breakdown,
        wallet_summary,
        recent_transactions: newest_first(matched_rows, RECENT_PER_SUMMARY),
        period_info: window.period_info(),
    }
}

/// Summarizes every active network and folds the results together
pub fn summarize_all(
    networks: &[NetworkWallets],
    rows: &[transfers::Model],
    window: Window,
) -> GlobalSummary {
    let mut by_network: HashMap<&str, Vec<transfers::Model>> = HashMap::new();
    for row in rows {
        by_network.entry(row.network_id.as_str()).or_default().push(row.clone());
    }

    let mut breakdown: PerChain<ChainTotals> = PerChain::default();
    let mut details = Vec::new();
    let mut recent = Vec::new();

    for network in networks.iter().filter(|n| n.has_wallets()) {
        let network_rows = by_network.get(network.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let summary = summarize_network(network, network_rows, window);

        for chain in Chain::ALL {
            let source = summary.breakdown.get(chain);
            let totals = breakdown.get_mut(chain);
            totals.count += source.count;
            totals.total_usd_value += source.total_usd_value;
            if !network.addresses(chain).is_empty() {
                totals.networks_with_wallets += 1;
            }
        }

        details.push(NetworkDetail {
            network_id: summary.network_id,
            network_name: summary.network_name,
            total_transactions: summary.total_transactions,
            total_usd_value: summary.total_usd_value,
            breakdown: PerChain::from_fn(|c| {
                let b = summary.breakdown.get(c);
                ChainTotals {
                    count: b.count,
                    total_usd_value: b.total_usd_value,
                    networks_with_wallets: usize::from(!network.addresses(c).is_empty()),
                }
            }),
        });
        recent.extend(summary.recent_transactions);
    }

    details.sort_by(|a, b| b.total_usd_value.cmp(&a.total_usd_value));
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent.truncate(RECENT_PER_SUMMARY);

    GlobalSummary {
        total_transactions: details.iter().map(|d| d.total_transactions).sum(),
        total_usd_value: details.iter().map(|d| d.total_usd_value).sum(),
        total_networks: networks.len(),
        active_networks_with_wallets: details.len(),
        breakdown,
        network_details: details,
        recent_transactions: recent,
        period_info: window.period_info(),
    }
}

/// Per-network summary read from the store; `None` if the network is unknown or inactive
pub async fn network_summary(
    repositories: &Repositories,
    network_id: &str,
    window: Window,
) -> Result<Option<NetworkSummary>, DbError> {
    let Some(network) = repositories.networks.find_active(network_id).await? else {
        return Ok(None);
    };

    let (start, end) = window.bounds(Utc::now());
    let rows = repositories
        .transfers
        .find_in_window(Some(network_id), start, end)
        .await?;

    Ok(Some(summarize_network(&network, &rows, window)))
}

/// Summary across all active networks
pub async fn global_summary(
    repositories: &Repositories,
    window: Window,
) -> Result<GlobalSummary, DbError> {
    let networks = repositories.networks.find_all_active().await?;
    let (start, end) = window.bounds(Utc::now());
    let rows = repositories.transfers.find_in_window(None, start, end).await?;

    Ok(summarize_all(&networks, &rows, window))
}
