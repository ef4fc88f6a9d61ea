// API request/response models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::repositories::{page_offset, SortField, TransferFilter};
use crate::domain::{Chain, Transfer, TransferType};
use crate::services::aggregation::Window;

const MAX_PAGE_SIZE: u64 = 500;

/// Envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Parses an optional query value, treating blank strings as absent
fn parse_opt<T: FromStr>(value: &Option<String>, name: &str) -> Result<Option<T>, String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("invalid {}: {}", name, raw)),
    }
}

/// Accepts RFC 3339 timestamps or plain dates. A plain end date covers the whole day.
fn parse_date(value: &Option<String>, name: &str, end_of_day: bool) -> Result<Option<DateTime<Utc>>, String> {
    let Some(raw) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| format!("invalid {}: {}", name, raw))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    Ok(time.map(|t| t.and_utc()))
}

/// Query parameters for the summary endpoints
#[derive(Debug, Deserialize, Default)]
pub struct SummaryParams {
    pub days: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
}

impl SummaryParams {
    pub fn window(&self) -> Result<Window, String> {
        Window::from_params(
            parse_opt(&self.days, "days")?,
            parse_opt(&self.month, "month")?,
            parse_opt(&self.year, "year")?,
        )
    }
}

/// Query parameters for GET /blockchain/transactions
#[derive(Debug, Deserialize, Default)]
pub struct RecentParams {
    pub limit: Option<String>,
}

impl RecentParams {
    pub fn limit(&self) -> Result<u64, String> {
        Ok(parse_opt::<u64>(&self.limit, "limit")?
            .unwrap_or(50)
            .clamp(1, MAX_PAGE_SIZE))
    }
}

/// Query parameters for GET /blockchain/networks/{id}/transactions
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub blockchain: Option<String>,
    pub transfer_type: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub token_symbol: Option<String>,
    pub search_hash: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl HistoryParams {
    pub fn to_filter(&self) -> Result<TransferFilter, String> {
        let chain = match non_blank(&self.blockchain).as_deref() {
            None | Some("all") => None,
            Some(raw) => Some(raw.parse::<Chain>()?.as_str().to_string()),
        };
        let transfer_type = match non_blank(&self.transfer_type).as_deref() {
            None => Some(TransferType::Incoming.as_str().to_string()),
            Some("all") => None,
            Some(raw) => Some(raw.parse::<TransferType>()?.as_str().to_string()),
        };
        let sort_by = match non_blank(&self.sort_by).as_deref() {
            None | Some("timestamp") => SortField::Timestamp,
            Some("amount") => SortField::Amount,
            Some("usdValue") => SortField::UsdValue,
            Some("blockchain") | Some("chain") => SortField::Chain,
            Some(other) => return Err(format!("invalid sortBy: {}", other)),
        };
        let descending = match non_blank(&self.sort_order).as_deref() {
            None | Some("desc") => true,
            Some("asc") => false,
            Some(other) => return Err(format!("invalid sortOrder: {}", other)),
        };

        let page = parse_opt::<u64>(&self.page, "page")?.unwrap_or(1).max(1);
        let limit = parse_opt::<u64>(&self.limit, "limit")?
            .unwrap_or(50)
            .clamp(1, MAX_PAGE_SIZE);
        if page_offset(page, limit).is_none() {
            return Err(format!("page out of range: {}", page));
        }

        Ok(TransferFilter {
            start: parse_date(&self.start_date, "startDate", false)?,
            end: parse_date(&self.end_date, "endDate", true)?,
            chain,
            transfer_type,
            min_amount: parse_opt::<Decimal>(&self.min_amount, "minAmount")?,
            max_amount: parse_opt::<Decimal>(&self.max_amount, "maxAmount")?,
            token_symbol: non_blank(&self.token_symbol),
            search_hash: non_blank(&self.search_hash),
            sort_by,
            descending,
            page,
            limit,
        })
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub limit: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total_count: u64) -> Self {
        let total_pages = total_count.div_ceil(limit.max(1));
        Self {
            current_page: page,
            total_pages,
            total_count,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
            limit,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryResponse {
    pub transactions: Vec<Transfer>,
    pub pagination: Pagination,
    pub filters: HistoryParams,
    pub network_id: String,
}

#[derive(Debug, Serialize)]
pub struct RecentTransactionsResponse {
    pub transactions: Vec<Transfer>,
    pub count: usize,
    pub limit: u64,
}
