//! Canonical transfer records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::chain::{Chain, PerChain, TransferType};

/// A transfer as normalized by a chain adapter, before pricing and persistence
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransfer {
    pub transaction_hash: String,
    /// Position of the transfer inside its transaction (log index, event index or vout)
    pub log_index: i32,
    pub from_address: String,
    pub to_address: String,
    pub token: TokenInfo,
    /// Amount in whole chain-native units (BTC, not satoshis)
    pub amount: Decimal,
    pub block_number: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub transfer_type: TransferType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
}

impl TokenInfo {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }
}

/// Persisted transfer as exposed by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub chain: String,
    pub transaction_hash: String,
    pub log_index: i32,
    pub from_address: String,
    pub to_address: String,
    pub token: TokenInfo,
    pub amount: Decimal,
    pub usd_value: Option<Decimal>,
    pub transfer_type: String,
    pub block_number: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub network_id: String,
    pub wallet_address: String,
    pub data_source: String,
}

/// An active network and its configured wallet addresses, grouped per chain
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkWallets {
    pub id: String,
    pub name: String,
    pub wallets: PerChain<Vec<String>>,
}

impl NetworkWallets {
    pub fn wallet_count(&self) -> usize {
        self.wallets.iter().map(|(_, w)| w.len()).sum()
    }

    pub fn has_wallets(&self) -> bool {
        self.wallet_count() > 0
    }

    pub fn addresses(&self, chain: Chain) -> &[String] {
        self.wallets.get(chain)
    }
}
