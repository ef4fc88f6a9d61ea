// Shared fixtures for the integration tests: an in-memory store, scripted
// chain adapters and a fixed price table.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait, Schema,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use blockchain_scraper::chains::{AdapterSet, ChainAdapter, FetchOutcome};
use blockchain_scraper::config::RunConfig;
use blockchain_scraper::db::Repositories;
use blockchain_scraper::domain::{AdapterError, Chain, PerChain, RawTransfer, TokenInfo, TransferType};
use blockchain_scraper::entity::{networks, scrape_checkpoints, transfers, wallet_addresses};
use blockchain_scraper::services::price_resolver::PriceError;
use blockchain_scraper::services::{PriceResolver, PriceSource, RunCoordinator};

/// Fresh in-memory database with every table the service touches
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // every pooled connection would otherwise open its own empty database
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(options).await.expect("connect sqlite");

    let schema = Schema::new(DbBackend::Sqlite);
    let backend = conn.get_database_backend();
    for statement in [
        schema.create_table_from_entity(networks::Entity),
        schema.create_table_from_entity(wallet_addresses::Entity),
        schema.create_table_from_entity(transfers::Entity),
        schema.create_table_from_entity(scrape_checkpoints::Entity),
    ] {
        conn.execute(backend.build(&statement)).await.expect("create table");
    }
    conn
}

pub async fn seed_network(conn: &DatabaseConnection, id: &str, name: &str, wallets: &[(Chain, &str)]) {
    networks::Entity::insert(networks::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        is_active: Set(true),
    })
    .exec(conn)
    .await
    .expect("insert network");

    for (chain, address) in wallets {
        wallet_addresses::Entity::insert(wallet_addresses::ActiveModel {
            id: NotSet,
            network_id: Set(id.to_string()),
            chain: Set(chain.as_str().to_string()),
            address: Set(address.to_string()),
        })
        .exec(conn)
        .await
        .expect("insert wallet");
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn raw(hash: &str, to: &str, symbol: &str, amount: &str, block: i64, timestamp: DateTime<Utc>) -> RawTransfer {
    RawTransfer {
        transaction_hash: hash.to_string(),
        log_index: 0,
        from_address: "sender".to_string(),
        to_address: to.to_string(),
        token: TokenInfo::new(symbol, symbol),
        amount: dec(amount),
        block_number: Some(block),
        timestamp,
        transfer_type: TransferType::Incoming,
    }
}

pub fn stored(chain: Chain, network_id: &str, hash: &str, to: &str, usd: Option<&str>, timestamp: DateTime<Utc>) -> transfers::Model {
    transfers::Model {
        chain: chain.as_str().to_string(),
        transaction_hash: hash.to_string(),
        log_index: 0,
        to_address: to.to_string(),
        from_address: "sender".to_string(),
        token_symbol: "USDT".to_string(),
        token_name: "Tether USD".to_string(),
        amount: usd.map(dec).unwrap_or(Decimal::ONE),
        usd_value: usd.map(dec),
        transfer_type: "incoming".to_string(),
        block_number: Some(1),
        timestamp,
        network_id: network_id.to_string(),
        wallet_address: to.to_string(),
        data_source: "test".to_string(),
        scraped_at: Utc::now(),
    }
}

/// Adapter serving a fixed transfer list per address
pub struct ScriptedAdapter {
    chain: Chain,
    transfers: HashMap<String, Vec<RawTransfer>>,
    failure: Option<AdapterError>,
    delay: Option<Duration>,
    truncated: bool,
    pub calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            transfers: HashMap::new(),
            failure: None,
            delay: None,
            truncated: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_transfers(mut self, address: &str, transfers: Vec<RawTransfer>) -> Self {
        self.transfers.insert(address.to_string(), transfers);
        self
    }

    pub fn failing(mut self, error: AdapterError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Serves the transfers but reports the history as cut short
    pub fn truncating(mut self) -> Self {
        self.truncated = true;
        self
    }
}

#[async_trait]
impl ChainAdapter for ScriptedAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn data_source(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_incoming(&self, address: &str, since: Option<i64>) -> Result<FetchOutcome, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let transfers: Vec<RawTransfer> = self
            .transfers
            .get(address)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|t| since.map_or(true, |cp| t.block_number.unwrap_or(0) >= cp))
            .collect();
        if self.truncated {
            return Ok(FetchOutcome {
                transfers,
                checkpoint: since,
                truncated: true,
            });
        }
        let checkpoint = transfers.iter().filter_map(|t| t.block_number).max().or(since);
        Ok(FetchOutcome {
            transfers,
            checkpoint,
            truncated: false,
        })
    }
}

pub fn adapters(bitcoin: ScriptedAdapter, ethereum: ScriptedAdapter, tron: ScriptedAdapter) -> AdapterSet {
    PerChain {
        bitcoin: Arc::new(bitcoin),
        ethereum: Arc::new(ethereum),
        tron: Arc::new(tron),
    }
}

/// Like [`adapters`] but keeps the caller's handles for inspecting `calls`
pub fn shared_adapters(
    bitcoin: &Arc<ScriptedAdapter>,
    ethereum: &Arc<ScriptedAdapter>,
    tron: &Arc<ScriptedAdapter>,
) -> AdapterSet {
    PerChain {
        bitcoin: bitcoin.clone(),
        ethereum: ethereum.clone(),
        tron: tron.clone(),
    }
}

pub fn idle_adapters() -> AdapterSet {
    adapters(
        ScriptedAdapter::new(Chain::Bitcoin),
        ScriptedAdapter::new(Chain::Ethereum),
        ScriptedAdapter::new(Chain::Tron),
    )
}

/// Prices by symbol, independent of the day
pub struct FixedPrices(pub HashMap<String, Decimal>);

impl FixedPrices {
    pub fn btc(price: &str) -> Self {
        Self(HashMap::from([("BTC".to_string(), dec(price))]))
    }
}

#[async_trait]
impl PriceSource for FixedPrices {
    async fn usd_price(&self, symbol: &str, _day: NaiveDate) -> Result<Decimal, PriceError> {
        self.0
            .get(symbol)
            .copied()
            .ok_or_else(|| PriceError::UnsupportedSymbol(symbol.to_string()))
    }
}

pub fn fast_settings() -> RunConfig {
    RunConfig {
        adapter_timeout: Duration::from_secs(5),
        retry_base_delay_ms: 1,
        ..RunConfig::default()
    }
}

pub fn coordinator(
    conn: &DatabaseConnection,
    adapters: AdapterSet,
    prices: FixedPrices,
    settings: RunConfig,
) -> Arc<RunCoordinator> {
    let resolver = Arc::new(PriceResolver::new(Arc::new(prices), Duration::from_secs(60)));
    Arc::new(RunCoordinator::new(
        Repositories::new(conn.clone()),
        adapters,
        resolver,
        settings,
    ))
}
