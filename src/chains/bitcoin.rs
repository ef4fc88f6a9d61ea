//! Bitcoin adapter backed by an Esplora REST API (blockstream.info by default).
//!
//! Pages newest-first through `/address/{a}/txs` and `/address/{a}/txs/chain/{last}`.
//! Every confirmed output paying the address is one transfer; the checkpoint
//! is the highest block height seen. Paging continues down to the checkpoint.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::http::get_json;
use super::{ChainAdapter, FetchOutcome, NewestFirstPaging};
use crate::config::ExplorerConfig;
use crate::domain::{AdapterError, Chain, RawTransfer, TokenInfo, TransferType};

/// Confirmed transactions per Esplora chain page
const CHAIN_PAGE_SIZE: usize = 25;

#[derive(Debug, Deserialize)]
pub(crate) struct EsploraTx {
    txid: String,
    status: EsploraStatus,
    #[serde(default)]
    vin: Vec<EsploraVin>,
    #[serde(default)]
    vout: Vec<EsploraOutput>,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    block_height: Option<i64>,
    block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EsploraVin {
    prevout: Option<EsploraOutput>,
    #[serde(default)]
    is_coinbase: bool,
}

#[derive(Debug, Deserialize)]
struct EsploraOutput {
    scriptpubkey_address: Option<String>,
    value: i64,
}

/// Result of scanning one page
#[derive(Debug, Default)]
pub(crate) struct PageScan {
    pub transfers: Vec<RawTransfer>,
    pub confirmed: usize,
    pub highest: Option<i64>,
    pub reached_checkpoint: bool,
    pub last_txid: Option<String>,
}

fn incoming_outputs(tx: &EsploraTx, address: &str) -> Result<Vec<RawTransfer>, AdapterError> {
    // outputs of a spend from the address are change
    let spends_from_address = tx.vin.iter().any(|i| {
        i.prevout
            .as_ref()
            .and_then(|p| p.scriptpubkey_address.as_deref())
            == Some(address)
    });
    if spends_from_address {
        return Ok(Vec::new());
    }

    let block_time = tx
        .status
        .block_time
        .ok_or_else(|| AdapterError::Data(format!("confirmed tx {} has no block_time", tx.txid)))?;
    let timestamp = Utc
        .timestamp_opt(block_time, 0)
        .single()
        .ok_or_else(|| AdapterError::Data(format!("invalid block_time {}", block_time)))?;

    let from_address = tx
        .vin
        .iter()
        .find_map(|i| i.prevout.as_ref().and_then(|p| p.scriptpubkey_address.clone()))
        .unwrap_or_else(|| {
            if tx.vin.iter().any(|i| i.is_coinbase) {
                "coinbase".to_string()
            } else {
                String::new()
            }
        });

    Ok(tx
        .vout
        .iter()
        .enumerate()
        .filter(|(_, out)| out.scriptpubkey_address.as_deref() == Some(address))
        .map(|(vout, out)| RawTransfer {
            transaction_hash: tx.txid.clone(),
            log_index: vout as i32,
            from_address: from_address.clone(),
            to_address: address.to_string(),
            token: TokenInfo::new("BTC", "Bitcoin"),
            amount: Decimal::new(out.value, 8).normalize(),
            block_number: tx.status.block_height,
            timestamp,
            transfer_type: TransferType::Incoming,
        })
        .collect())
}

/// Extracts incoming transfers at or above `since` from one page
pub(crate) fn scan_page(
    txs: &[EsploraTx],
    address: &str,
    since: Option<i64>,
) -> Result<PageScan, AdapterError> {
    let mut scan = PageScan::default();

    for tx in txs.iter().filter(|t| t.status.confirmed) {
        scan.confirmed += 1;
        scan.last_txid = Some(tx.txid.clone());

        let height = tx.status.block_height.ok_or_else(|| {
            AdapterError::Data(format!("confirmed tx {} has no block_height", tx.txid))
        })?;
        scan.highest = Some(scan.highest.map_or(height, |h| h.max(height)));

        if since.is_some_and(|cp| height < cp) {
            scan.reached_checkpoint = true;
            continue;
        }
        scan.transfers.extend(incoming_outputs(tx, address)?);
    }

    Ok(scan)
}

pub struct BitcoinAdapter {
    client: Client,
    base_url: String,
    max_pages: u32,
    page_delay: Duration,
}

impl BitcoinAdapter {
    pub fn new(client: Client, config: &ExplorerConfig) -> Self {
        Self {
            client,
            base_url: config.esplora_url.trim_end_matches('/').to_string(),
            max_pages: config.max_pages.max(1),
            page_delay: config.page_delay,
        }
    }
}

#[async_trait]
impl ChainAdapter for BitcoinAdapter {
    fn chain(&self) -> Chain {
        Chain::Bitcoin
    }

    fn data_source(&self) -> &'static str {
        "esplora"
    }

    async fn fetch_incoming(
        &self,
        address: &str,
        since: Option<i64>,
    ) -> Result<FetchOutcome, AdapterError> {
        let mut url = format!("{}/address/{}/txs", self.base_url, address);
        let mut paging = NewestFirstPaging::new(since, self.max_pages);
        let mut transfers = Vec::new();

        loop {
            let txs: Vec<EsploraTx> = get_json(self.client.get(&url)).await?;
            let scan = scan_page(&txs, address, since)?;

            transfers.extend(scan.transfers);
            paging.record(scan.highest);

            let last_txid = match scan.last_txid {
                Some(txid) if !scan.reached_checkpoint && scan.confirmed >= CHAIN_PAGE_SIZE => txid,
                _ => break,
            };
            if !paging.may_continue(Chain::Bitcoin, address) {
                break;
            }

            url = format!("{}/address/{}/txs/chain/{}", self.base_url, address, last_txid);
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(paging.into_outcome(transfers))
    }
}
