// Transfer history queries

use crate::db::repositories::TransferFilter;
use crate::db::{DbError, Repositories};
use crate::domain::Transfer;
use crate::models::Pagination;

/// One page of a network's filtered history
#[derive(Debug)]
pub struct HistoryPage {
    pub transactions: Vec<Transfer>,
    pub pagination: Pagination,
}

/// Filtered, paginated history for one network
pub async fn network_transactions(
    repositories: &Repositories,
    network_id: &str,
    filter: &TransferFilter,
) -> Result<HistoryPage, DbError> {
    let (rows, total) = repositories.transfers.search(network_id, filter).await?;

    Ok(HistoryPage {
        transactions: rows.into_iter().map(Transfer::from).collect(),
        pagination: Pagination::new(filter.page, filter.limit, total),
    })
}

/// Newest incoming transfers across all networks
pub async fn recent_transactions(
    repositories: &Repositories,
    limit: u64,
) -> Result<Vec<Transfer>, DbError> {
    let rows = repositories.transfers.recent(limit).await?;
    Ok(rows.into_iter().map(Transfer::from).collect())
}
