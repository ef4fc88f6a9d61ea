//! SeaORM Entity for blockchain_transfers table.
//!
//! The composite primary key `(chain, transaction_hash, log_index, to_address)`
//! is the ingestion idempotency key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{TokenInfo, Transfer};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blockchain_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub chain: String,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub transaction_hash: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub log_index: i32,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub to_address: String,

    #[sea_orm(column_type = "Text")]
    pub from_address: String,
    #[sea_orm(column_type = "Text")]
    pub token_symbol: String,
    #[sea_orm(column_type = "Text")]
    pub token_name: String,
    #[sea_orm(column_type = "Decimal(Some((38, 18)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((38, 8)))", nullable)]
    pub usd_value: Option<Decimal>,
    #[sea_orm(column_type = "Text")]
    pub transfer_type: String,
    #[sea_orm(nullable)]
    pub block_number: Option<i64>,
    pub timestamp: DateTimeUtc,

    #[sea_orm(column_type = "Text")]
    pub network_id: String,
    #[sea_orm(column_type = "Text")]
    pub wallet_address: String,
    #[sea_orm(column_type = "Text")]
    pub data_source: String,
    pub scraped_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Transfer {
    fn from(m: Model) -> Self {
        Transfer {
            chain: m.chain,
            transaction_hash: m.transaction_hash,
            log_index: m.log_index,
            from_address: m.from_address,
            to_address: m.to_address,
            token: TokenInfo {
                symbol: m.token_symbol,
                name: m.token_name,
            },
            amount: m.amount,
            usd_value: m.usd_value,
            transfer_type: m.transfer_type,
            block_number: m.block_number,
            timestamp: m.timestamp,
            network_id: m.network_id,
            wallet_address: m.wallet_address,
            data_source: m.data_source,
        }
    }
}
