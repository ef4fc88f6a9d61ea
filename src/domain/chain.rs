//! Supported chains and the fixed per-chain breakdown container

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three chains the scraper reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Bitcoin,
    Ethereum,
    Tron,
}

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Bitcoin, Chain::Ethereum, Chain::Tron];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bitcoin",
            Chain::Ethereum => "ethereum",
            Chain::Tron => "tron",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Chain::Bitcoin),
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "tron" | "trx" => Ok(Chain::Tron),
            other => Err(format!("unsupported chain: {}", other)),
        }
    }
}

/// Direction of a transfer relative to the monitored wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Incoming,
    Outgoing,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Incoming => "incoming",
            TransferType::Outgoing => "outgoing",
        }
    }
}

impl FromStr for TransferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incoming" => Ok(TransferType::Incoming),
            "outgoing" => Ok(TransferType::Outgoing),
            other => Err(format!("unsupported transfer type: {}", other)),
        }
    }
}

/// A value for each supported chain. Serializes as `{bitcoin, ethereum, tron}`,
/// which keeps breakdown keys fixed to the three chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerChain<T> {
    pub bitcoin: T,
    pub ethereum: T,
    pub tron: T,
}

impl<T> PerChain<T> {
    pub fn from_fn(mut f: impl FnMut(Chain) -> T) -> Self {
        Self {
            bitcoin: f(Chain::Bitcoin),
            ethereum: f(Chain::Ethereum),
            tron: f(Chain::Tron),
        }
    }

    pub fn get(&self, chain: Chain) -> &T {
        match chain {
            Chain::Bitcoin => &self.bitcoin,
            Chain::Ethereum => &self.ethereum,
            Chain::Tron => &self.tron,
        }
    }

    pub fn get_mut(&mut self, chain: Chain) -> &mut T {
        match chain {
            Chain::Bitcoin => &mut self.bitcoin,
            Chain::Ethereum => &mut self.ethereum,
            Chain::Tron => &mut self.tron,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Chain, &T)> {
        Chain::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}
