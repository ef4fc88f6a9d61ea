// Dedup & persistence store for canonical transfers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};

use crate::db::DbError;
use crate::entity::transfers;

/// Idempotency key of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferKey {
    pub chain: String,
    pub transaction_hash: String,
    pub log_index: i32,
    pub to_address: String,
}

impl From<&transfers::Model> for TransferKey {
    fn from(m: &transfers::Model) -> Self {
        Self {
            chain: m.chain.clone(),
            transaction_hash: m.transaction_hash.clone(),
            log_index: m.log_index,
            to_address: m.to_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Timestamp,
    Amount,
    UsdValue,
    Chain,
}

impl SortField {
    fn column(&self) -> transfers::Column {
        match self {
            SortField::Timestamp => transfers::Column::Timestamp,
            SortField::Amount => transfers::Column::Amount,
            SortField::UsdValue => transfers::Column::UsdValue,
            SortField::Chain => transfers::Column::Chain,
        }
    }
}

/// Row offset just past `page`, `None` when it exceeds what SQL can address
pub fn page_offset(page: u64, limit: u64) -> Option<u64> {
    page.checked_mul(limit).filter(|end| *end <= i64::MAX as u64)
}

/// Criteria for the paginated history query
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub chain: Option<String>,
    pub transfer_type: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    /// Case-insensitive substring of the token symbol
    pub token_symbol: Option<String>,
    /// Case-insensitive substring of the transaction hash
    pub search_hash: Option<String>,
    pub sort_by: SortField,
    pub descending: bool,
    pub page: u64,
    pub limit: u64,
}

impl Default for TransferFilter {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            chain: None,
            transfer_type: Some("incoming".to_string()),
            min_amount: None,
            max_amount: None,
            token_symbol: None,
            search_hash: None,
            sort_by: SortField::Timestamp,
            descending: true,
            page: 1,
            limit: 50,
        }
    }
}

fn contains_ci(column: transfers::Column, needle: &str) -> Condition {
    let pattern = format!("%{}%", needle.to_lowercase());
    Condition::all().add(Expr::expr(Func::lower(Expr::col(column))).like(pattern))
}

#[derive(Clone, Debug)]
pub struct TransferRepository {
    conn: DatabaseConnection,
}

impl TransferRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts the transfer unless its key already exists.
    /// Returns `true` only when a new row was written.
    pub async fn upsert(&self, transfer: transfers::Model) -> Result<bool, DbError> {
        let model = transfers::ActiveModel {
            chain: Set(transfer.chain),
            transaction_hash: Set(transfer.transaction_hash),
            log_index: Set(transfer.log_index),
            to_address: Set(transfer.to_address),
            from_address: Set(transfer.from_address),
            token_symbol: Set(transfer.token_symbol),
            token_name: Set(transfer.token_name),
            amount: Set(transfer.amount),
            usd_value: Set(transfer.usd_value),
            transfer_type: Set(transfer.transfer_type),
            block_number: Set(transfer.block_number),
            timestamp: Set(transfer.timestamp),
            network_id: Set(transfer.network_id),
            wallet_address: Set(transfer.wallet_address),
            data_source: Set(transfer.data_source),
            scraped_at: Set(transfer.scraped_at),
        };

        let rows = transfers::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    transfers::Column::Chain,
                    transfers::Column::TransactionHash,
                    transfers::Column::LogIndex,
                    transfers::Column::ToAddress,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(rows > 0)
    }

    /// Fills in a missing USD value. Rows that already carry a value are left untouched.
    pub async fn backfill_usd_value(
        &self,
        key: &TransferKey,
        usd_value: Decimal,
    ) -> Result<bool, DbError> {
        let result = transfers::Entity::update_many()
            .col_expr(transfers::Column::UsdValue, Expr::value(usd_value))
            .filter(transfers::Column::Chain.eq(key.chain.as_str()))
            .filter(transfers::Column::TransactionHash.eq(key.transaction_hash.as_str()))
            .filter(transfers::Column::LogIndex.eq(key.log_index))
            .filter(transfers::Column::ToAddress.eq(key.to_address.as_str()))
            .filter(transfers::Column::UsdValue.is_null())
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Transfers still waiting for a price, newest first
    pub async fn find_unpriced(
        &self,
        network_id: Option<&str>,
        limit: u64,
    ) -> Result<Vec<transfers::Model>, DbError> {
        let mut query = transfers::Entity::find().filter(transfers::Column::UsdValue.is_null());
        if let Some(network_id) = network_id {
            query = query.filter(transfers::Column::NetworkId.eq(network_id));
        }

        let results = query
            .order_by_desc(transfers::Column::Timestamp)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(results)
    }

    /// Incoming transfers inside `[start, end)`, newest first
    pub async fn find_in_window(
        &self,
        network_id: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<transfers::Model>, DbError> {
        let mut query = transfers::Entity::find()
            .filter(transfers::Column::TransferType.eq("incoming"));

        if let Some(network_id) = network_id {
            query = query.filter(transfers::Column::NetworkId.eq(network_id));
        }
        if let Some(start) = start {
            query = query.filter(transfers::Column::Timestamp.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(transfers::Column::Timestamp.lt(end));
        }

        let results = query
            .order_by_desc(transfers::Column::Timestamp)
            .order_by_asc(transfers::Column::TransactionHash)
            .order_by_asc(transfers::Column::LogIndex)
            .all(&self.conn)
            .await?;
        Ok(results)
    }

    /// Most recent incoming transfers across all networks
    pub async fn recent(&self, limit: u64) -> Result<Vec<transfers::Model>, DbError> {
        let results = transfers::Entity::find()
            .filter(transfers::Column::TransferType.eq("incoming"))
            .order_by_desc(transfers::Column::Timestamp)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(results)
    }

    fn filtered(&self, network_id: &str, filter: &TransferFilter) -> Select<transfers::Entity> {
        let mut query = transfers::Entity::find().filter(transfers::Column::NetworkId.eq(network_id));

        if let Some(start) = filter.start {
            query = query.filter(transfers::Column::Timestamp.gte(start));
        }
        if let Some(end) = filter.end {
            query = query.filter(transfers::Column::Timestamp.lte(end));
        }
        if let Some(chain) = &filter.chain {
            query = query.filter(transfers::Column::Chain.eq(chain.as_str()));
        }
        if let Some(transfer_type) = &filter.transfer_type {
            query = query.filter(transfers::Column::TransferType.eq(transfer_type.as_str()));
        }
        if let Some(min) = filter.min_amount {
            query = query.filter(transfers::Column::Amount.gte(min));
        }
        if let Some(max) = filter.max_amount {
            query = query.filter(transfers::Column::Amount.lte(max));
        }
        if let Some(symbol) = &filter.token_symbol {
            query = query.filter(contains_ci(transfers::Column::TokenSymbol, symbol));
        }
        if let Some(hash) = &filter.search_hash {
            query = query.filter(contains_ci(transfers::Column::TransactionHash, hash));
        }

        let column = filter.sort_by.column();
        query = if filter.descending {
            query.order_by_desc(column)
        } else {
            query.order_by_asc(column)
        };

        query
            .order_by_asc(transfers::Column::TransactionHash)
            .order_by_asc(transfers::Column::LogIndex)
    }

    /// Filtered history page for one network. Returns the page and the total match count.
    pub async fn search(
        &self,
        network_id: &str,
        filter: &TransferFilter,
    ) -> Result<(Vec<transfers::Model>, u64), DbError> {
        let limit = filter.limit.max(1);
        if page_offset(filter.page, limit).is_none() {
            return Err(DbError::QueryError(format!("page {} out of range", filter.page)));
        }
        let paginator = self.filtered(network_id, filter).paginate(&self.conn, limit);

        let total = paginator.num_items().await?;
        let page = paginator.fetch_page(filter.page.max(1) - 1).await?;
        Ok((page, total))
    }

    pub async fn count(&self) -> Result<u64, DbError> {
        let total = transfers::Entity::find().count(&self.conn).await?;
        Ok(total)
    }
}
