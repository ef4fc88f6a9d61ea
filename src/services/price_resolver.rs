//! USD price resolution with a short-lived cache.
//!
//! Stablecoins are pegged at 1 USD. Other assets go through a [`PriceSource`]
//! keyed by day; failures degrade to [`PriceResolution::Unresolved`] so the
//! transfer is still stored with an empty USD value.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::PriceConfig;

const STABLECOINS: [&str; 3] = ["USDT", "USDC", "DAI"];
const USD_DECIMALS: u32 = 8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PriceError {
    #[error("no price source for symbol {0}")]
    UnsupportedSymbol(String),
    #[error("price request failed: {0}")]
    Request(String),
    #[error("price missing in response for {0}")]
    Missing(String),
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        PriceError::Request(err.to_string())
    }
}

/// Outcome of pricing one transfer
#[derive(Debug, Clone, PartialEq)]
pub enum PriceResolution {
    Resolved(Decimal),
    Unresolved(String),
}

impl PriceResolution {
    pub fn usd_value(&self) -> Option<Decimal> {
        match self {
            PriceResolution::Resolved(v) => Some(*v),
            PriceResolution::Unresolved(_) => None,
        }
    }
}

/// USD price of one unit of `symbol` on `day`
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn usd_price(&self, symbol: &str, day: NaiveDate) -> Result<Decimal, PriceError>;
}

/// CoinGecko public API: simple price for today, daily history otherwise
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: HashMap<String, f64>,
}

impl CoinGeckoSource {
    pub fn new(client: Client, config: &PriceConfig) -> Self {
        Self {
            client,
            base_url: config.coingecko_url.trim_end_matches('/').to_string(),
        }
    }

    fn coin_id(symbol: &str) -> Option<&'static str> {
        match symbol.to_ascii_uppercase().as_str() {
            "BTC" => Some("bitcoin"),
            "ETH" => Some("ethereum"),
            "TRX" => Some("tron"),
            _ => None,
        }
    }

    fn to_decimal(value: Option<f64>, id: &str) -> Result<Decimal, PriceError> {
        value
            .and_then(Decimal::from_f64)
            .ok_or_else(|| PriceError::Missing(id.to_string()))
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn usd_price(&self, symbol: &str, day: NaiveDate) -> Result<Decimal, PriceError> {
        let id = Self::coin_id(symbol).ok_or_else(|| PriceError::UnsupportedSymbol(symbol.to_string()))?;

        let is_today = day >= Utc::now().date_naive();
        let response = if is_today {
            self.client
                .get(format!("{}/simple/price", self.base_url))
                .query(&[("ids", id), ("vs_currencies", "usd")])
                .send()
                .await?
        } else {
            let date = day.format("%d-%m-%Y").to_string();
            self.client
                .get(format!("{}/coins/{}/history", self.base_url, id))
                .query(&[("date", date.as_str()), ("localization", "false")])
                .send()
                .await?
        };

        let response = response.error_for_status()?;
        if is_today {
            let body: HashMap<String, HashMap<String, f64>> = response.json().await?;
            Self::to_decimal(body.get(id).and_then(|p| p.get("usd")).copied(), id)
        } else {
            let body: HistoryResponse = response.json().await?;
            Self::to_decimal(
                body.market_data.and_then(|m| m.current_price.get("usd").copied()),
                id,
            )
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Decimal,
    fetched_at: Instant,
}

/// Caching resolver shared by every wallet task of a run
pub struct PriceResolver {
    source: Arc<dyn PriceSource>,
    cache: RwLock<HashMap<(String, NaiveDate), CachedPrice>>,
    ttl: Duration,
}

impl PriceResolver {
    pub fn new(source: Arc<dyn PriceSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn is_stablecoin(symbol: &str) -> bool {
        STABLECOINS.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    fn cached(&self, key: &(String, NaiveDate)) -> Option<Decimal> {
        let cache = self.cache.read().ok()?;
        cache
            .get(key)
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.price)
    }

    /// Unit price of `symbol` at `at`
    pub async fn resolve_price(&self, symbol: &str, at: DateTime<Utc>) -> Result<Decimal, PriceError> {
        if Self::is_stablecoin(symbol) {
            return Ok(Decimal::ONE);
        }

        let key = (symbol.to_ascii_uppercase(), at.date_naive());
        if let Some(price) = self.cached(&key) {
            return Ok(price);
        }

        let price = self.source.usd_price(&key.0, key.1).await?;
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|_, c| c.fetched_at.elapsed() < self.ttl);
            cache.insert(
                key,
                CachedPrice {
                    price,
                    fetched_at: Instant::now(),
                },
            );
        }
        Ok(price)
    }

    /// USD value of `amount` units of `symbol` at `at`, never an error
    pub async fn usd_value(&self, symbol: &str, amount: Decimal, at: DateTime<Utc>) -> PriceResolution {
        match self.resolve_price(symbol, at).await {
            Ok(price) => match amount.checked_mul(price) {
                Some(value) => PriceResolution::Resolved(value.round_dp(USD_DECIMALS).normalize()),
                None => PriceResolution::Unresolved(format!("overflow pricing {} {}", amount, symbol)),
            },
            Err(e) => {
                tracing::debug!("Price unresolved for {} at {}: {}", symbol, at, e);
                PriceResolution::Unresolved(e.to_string())
            }
        }
    }
}
