//! Ethereum adapter backed by the Etherscan v2 `tokentx` endpoint.
//!
//! Only ERC-20 stablecoin transfers paid to the address are kept. Results are
//! requested oldest-first from the checkpoint block, so a truncated scan
//! resumes where it stopped on the next run.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::http::get_json;
use super::{advance, ChainAdapter, FetchOutcome};
use crate::config::ExplorerConfig;
use crate::domain::{AdapterError, Chain, RawTransfer, TokenInfo, TransferType};

/// Etherscan caps `page * offset` at 10 000 rows
const PAGE_SIZE: u32 = 1000;
const MAX_WINDOW_PAGES: u32 = 10;

/// Tracked ERC-20 contracts (lowercase) with symbol and name
const TRACKED_TOKENS: [(&str, &str, &str); 3] = [
    ("0xdac17f958d2ee523a2206206994597c13d831ec7", "USDT", "Tether USD"),
    ("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC", "USD Coin"),
    ("0x6b175474e89094c44da98b954eedeac495271d0f", "DAI", "Dai Stablecoin"),
];

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenTx {
    block_number: String,
    time_stamp: String,
    hash: String,
    from: String,
    to: String,
    value: String,
    contract_address: String,
    token_decimal: String,
    #[serde(default)]
    log_index: Option<String>,
}

fn tracked_token(contract: &str) -> Option<TokenInfo> {
    TRACKED_TOKENS
        .iter()
        .find(|(c, _, _)| c.eq_ignore_ascii_case(contract))
        .map(|(_, symbol, name)| TokenInfo::new(symbol, name))
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &str, hash: &str) -> Result<T, AdapterError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| AdapterError::Data(format!("invalid {} '{}' in tx {}", field, value, hash)))
}

/// Converts an integer amount string with `decimals` places into whole token units
pub(crate) fn scale_amount(raw: &str, decimals: u32) -> Option<Decimal> {
    let units = raw.trim().parse::<i128>().ok()?;
    Decimal::try_from_i128_with_scale(units, decimals)
        .ok()
        .map(|d| d.normalize())
}

/// Unwraps the Etherscan envelope into rows
fn into_rows(response: EtherscanResponse) -> Result<Vec<TokenTx>, AdapterError> {
    if response.status == "1" {
        return serde_json::from_value(response.result)
            .map_err(|e| AdapterError::Data(format!("error decoding tokentx rows: {}", e)));
    }

    let detail = response
        .result
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| response.message.clone());

    if response.message.starts_with("No transactions found") {
        Ok(Vec::new())
    } else if detail.to_ascii_lowercase().contains("rate limit") {
        Err(AdapterError::Unavailable(detail))
    } else {
        Err(AdapterError::Data(format!("etherscan error: {} ({})", response.message, detail)))
    }
}

/// Accumulates incoming transfers across pages
#[derive(Debug, Default)]
pub(crate) struct RowScan {
    pub transfers: Vec<RawTransfer>,
    pub highest: Option<i64>,
    ordinals: HashMap<String, i32>,
}

impl RowScan {
    pub fn push_rows(&mut self, rows: &[TokenTx], address: &str) -> Result<(), AdapterError> {
        for row in rows {
            let block: i64 = parse_field(&row.block_number, "blockNumber", &row.hash)?;
            self.highest = Some(self.highest.map_or(block, |h| h.max(block)));

            // position of this row among the rows of the same transaction
            let ordinal = self.ordinals.entry(row.hash.clone()).or_insert(-1);
            *ordinal += 1;
            let ordinal = *ordinal;

            if !row.to.eq_ignore_ascii_case(address) {
                continue;
            }
            let Some(token) = tracked_token(&row.contract_address) else {
                continue;
            };

            let decimals: u32 = parse_field(&row.token_decimal, "tokenDecimal", &row.hash)?;
            let amount = scale_amount(&row.value, decimals).ok_or_else(|| {
                AdapterError::Data(format!("invalid value '{}' in tx {}", row.value, row.hash))
            })?;
            let seconds: i64 = parse_field(&row.time_stamp, "timeStamp", &row.hash)?;
            let timestamp = Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
                AdapterError::Data(format!("invalid timeStamp {} in tx {}", seconds, row.hash))
            })?;
            let log_index = match &row.log_index {
                Some(raw) if !raw.trim().is_empty() => parse_field(raw, "logIndex", &row.hash)?,
                _ => ordinal,
            };

            self.transfers.push(RawTransfer {
                transaction_hash: row.hash.clone(),
                log_index,
                from_address: row.from.clone(),
                to_address: address.to_string(),
                token,
                amount,
                block_number: Some(block),
                timestamp,
                transfer_type: TransferType::Incoming,
            });
        }
        Ok(())
    }
}

pub struct EthereumAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    max_pages: u32,
    page_delay: Duration,
}

impl EthereumAdapter {
    pub fn new(client: Client, config: &ExplorerConfig) -> Self {
        Self {
            client,
            base_url: config.etherscan_url.clone(),
            api_key: config.etherscan_api_key.clone(),
            max_pages: config.max_pages.clamp(1, MAX_WINDOW_PAGES),
            page_delay: config.page_delay,
        }
    }
}

#[async_trait]
impl ChainAdapter for EthereumAdapter {
    fn chain(&self) -> Chain {
        Chain::Ethereum
    }

    fn data_source(&self) -> &'static str {
        "etherscan"
    }

    async fn fetch_incoming(
        &self,
        address: &str,
        since: Option<i64>,
    ) -> Result<FetchOutcome, AdapterError> {
        let start_block = since.unwrap_or(0).to_string();
        let offset = PAGE_SIZE.to_string();
        let mut scan = RowScan::default();

        for page in 1..=self.max_pages {
            let page_param = page.to_string();
            let request = self.client.get(&self.base_url).query(&[
                ("chainid", "1"),
                ("module", "account"),
                ("action", "tokentx"),
                ("address", address),
                ("startblock", start_block.as_str()),
                ("endblock", "99999999"),
                ("page", page_param.as_str()),
                ("offset", offset.as_str()),
                ("sort", "asc"),
                ("apikey", self.api_key.as_str()),
            ]);

            let response: EtherscanResponse = get_json(request).await?;
            let rows = into_rows(response)?;
            scan.push_rows(&rows, address)?;

            if rows.len() < PAGE_SIZE as usize {
                break;
            }
            if page == self.max_pages {
                tracing::warn!(
                    chain = "ethereum",
                    address,
                    "Stopped after {} pages, resuming next run",
                    self.max_pages
                );
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(FetchOutcome {
            transfers: scan.transfers,
            checkpoint: advance(since, scan.highest),
            truncated: false,
        })
    }
}
