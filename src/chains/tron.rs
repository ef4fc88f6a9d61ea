//! Tron adapter backed by the TronScan TRC-20 transfer listing.
//! The checkpoint is the highest block timestamp seen, in milliseconds.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::ethereum::scale_amount;
use super::http::get_json;
use super::{ChainAdapter, FetchOutcome, NewestFirstPaging};
use crate::config::ExplorerConfig;
use crate::domain::{AdapterError, Chain, RawTransfer, TokenInfo, TransferType};

const PAGE_SIZE: usize = 50;

/// Tracked TRC-20 contracts with symbol, name and decimals
const TRACKED_TOKENS: [(&str, &str, &str, u32); 3] = [
    ("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "USDT", "Tether USD", 6),
    ("TEkxiTehnzSmSe2XqrBj4w32RUN966rdz8", "USDC", "USD Coin", 6),
    ("TKfjV9RNKJJCqPvBtK8L7Knykh7DNWvnYt", "DAI", "Dai Stablecoin", 18),
];

#[derive(Debug, Deserialize)]
pub(crate) struct TronscanPage {
    /// Not always reported; paging then relies on short pages alone
    total: Option<u64>,
    #[serde(default)]
    token_transfers: Vec<Trc20Transfer>,
}

#[derive(Debug, Deserialize)]
struct Trc20Transfer {
    transaction_id: String,
    block_ts: i64,
    from_address: String,
    to_address: String,
    quant: String,
    contract_address: String,
    #[serde(rename = "tokenInfo")]
    token_info: Option<Trc20TokenInfo>,
    block: Option<i64>,
    confirmed: Option<bool>,
    event_index: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Trc20TokenInfo {
    token_decimal: Option<u32>,
}

/// Collects transfers across pages. Log indexes are settled in
/// [`TransferScan::finish`]: a transaction uses its `event_index` values only
/// when every one of its rows carries one, otherwise row ordinals throughout.
#[derive(Debug, Default)]
pub(crate) struct TransferScan {
    transfers: Vec<(RawTransfer, Option<i32>)>,
    ordinals: HashMap<String, i32>,
    unindexed: HashSet<String>,
}

impl TransferScan {
    pub fn push_page(&mut self, page: &TronscanPage, address: &str) -> Result<Option<i64>, AdapterError> {
        let mut page_highest: Option<i64> = None;
        for row in &page.token_transfers {
            page_highest = Some(page_highest.map_or(row.block_ts, |h| h.max(row.block_ts)));
            if row.event_index.is_none() {
                self.unindexed.insert(row.transaction_id.clone());
            }

            let ordinal = self.ordinals.entry(row.transaction_id.clone()).or_insert(-1);
            *ordinal += 1;
            let ordinal = *ordinal;

            if row.to_address != address || row.confirmed == Some(false) {
                continue;
            }
            let Some((_, symbol, name, default_decimals)) = TRACKED_TOKENS
                .iter()
                .find(|(contract, ..)| *contract == row.contract_address)
            else {
                continue;
            };

            let decimals = row
                .token_info
                .as_ref()
                .and_then(|t| t.token_decimal)
                .unwrap_or(*default_decimals);
            let amount = scale_amount(&row.quant, decimals).ok_or_else(|| {
                AdapterError::Data(format!(
                    "invalid quant '{}' in tx {}",
                    row.quant, row.transaction_id
                ))
            })?;
            let timestamp = Utc
                .timestamp_millis_opt(row.block_ts)
                .single()
                .ok_or_else(|| AdapterError::Data(format!("invalid block_ts {}", row.block_ts)))?;

            let transfer = RawTransfer {
                transaction_hash: row.transaction_id.clone(),
                log_index: ordinal,
                from_address: row.from_address.clone(),
                to_address: address.to_string(),
                token: TokenInfo::new(symbol, name),
                amount,
                block_number: row.block,
                timestamp,
                transfer_type: TransferType::Incoming,
            };
            self.transfers.push((transfer, row.event_index));
        }
        Ok(page_highest)
    }

    pub fn finish(self) -> Vec<RawTransfer> {
        let unindexed = self.unindexed;
        self.transfers
            .into_iter()
            .map(|(mut transfer, event_index)| {
                if let Some(index) = event_index {
                    if !unindexed.contains(&transfer.transaction_hash) {
                        transfer.log_index = index;
                    }
                }
                transfer
            })
            .collect()
    }
}

pub struct TronAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_pages: u32,
    page_delay: Duration,
}

impl TronAdapter {
    pub fn new(client: Client, config: &ExplorerConfig) -> Self {
        Self {
            client,
            base_url: config.tronscan_url.trim_end_matches('/').to_string(),
            api_key: config.tronscan_api_key.clone(),
            max_pages: config.max_pages.max(1),
            page_delay: config.page_delay,
        }
    }
}

#[async_trait]
impl ChainAdapter for TronAdapter {
    fn chain(&self) -> Chain {
        Chain::Tron
    }

    fn data_source(&self) -> &'static str {
        "tronscan"
    }

    async fn fetch_incoming(
        &self,
        address: &str,
        since: Option<i64>,
    ) -> Result<FetchOutcome, AdapterError> {
        let url = format!("{}/api/token_trc20/transfers", self.base_url);
        let mut scan = TransferScan::default();
        let mut paging = NewestFirstPaging::new(since, self.max_pages);
        let mut start = 0usize;

        loop {
            let mut query = vec![
                ("limit", PAGE_SIZE.to_string()),
                ("start", start.to_string()),
                ("relatedAddress", address.to_string()),
            ];
            if let Some(since) = since {
                query.push(("start_timestamp", since.to_string()));
            }

            let mut request = self.client.get(&url).query(&query);
            if let Some(key) = &self.api_key {
                request = request.header("TRON-PRO-API-KEY", key);
            }

            let page: TronscanPage = get_json(request).await?;
            paging.record(scan.push_page(&page, address)?);

            let fetched = page.token_transfers.len();
            start += fetched;
            if fetched < PAGE_SIZE || page.total.is_some_and(|total| start as u64 >= total) {
                break;
            }
            if !paging.may_continue(Chain::Tron, address) {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(paging.into_outcome(scan.finish()))
    }
}
