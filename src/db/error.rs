// Store errors surfaced by the repositories

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The store could not be reached or no pooled connection was available
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// A statement was rejected or its result could not be read
    #[error("Database query error: {0}")]
    QueryError(String),
}

impl From<DbErr> for DbError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => DbError::ConnectionError(err.to_string()),
            other => DbError::QueryError(other.to_string()),
        }
    }
}
