//! Error taxonomy for scraping runs

use thiserror::Error;

use super::run_state::StatusSnapshot;

/// Failure of a single chain adapter call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    /// Transport error, timeout or rate limit. Retryable.
    #[error("explorer unavailable: {0}")]
    Unavailable(String),

    /// Upstream answered with something we cannot interpret. Not retried this run.
    #[error("malformed explorer data: {0}")]
    Data(String),
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Unavailable(_))
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AdapterError::Data(err.to_string())
        } else {
            AdapterError::Unavailable(err.to_string())
        }
    }
}

/// Errors surfaced by the run coordinator
#[derive(Debug, Error)]
pub enum RunError {
    /// Another run holds the run lock; carries the status at rejection time
    #[error("a scraping run is already in progress")]
    Conflict(Box<StatusSnapshot>),

    #[error("network not found: {0}")]
    NetworkNotFound(String),

    /// Persistent store is unreachable; aborts the run
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("run state lock poisoned")]
    StateLock,

    /// The run reached the failed terminal state
    #[error("{0}")]
    Failed(String),
}

impl From<crate::db::DbError> for RunError {
    fn from(err: crate::db::DbError) -> Self {
        RunError::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(AdapterError::Unavailable("429".into()).is_retryable());
        assert!(!AdapterError::Data("bad json".into()).is_retryable());
    }
}
