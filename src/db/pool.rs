// Pooled sea-orm connection shared by the coordinator and the HTTP handlers

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::db::error::DbError;
use crate::db::repositories::Repositories;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Wait for a free connection before the caller sees a store error
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(8);
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

pub struct DbPool {
    pool: DatabaseConnection,
}

impl DbPool {
    /// Connects using the pool sizing from `DatabaseConfig`.
    /// Runs hold at most one connection per concurrent wallet task.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DbError> {
        let options = ConnectOptions::new(config.url.clone())
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .connect_timeout(CONNECT_TIMEOUT)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(IDLE_TIMEOUT)
            .sqlx_logging(false)
            .to_owned();

        let pool = Database::connect(options)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        tracing::debug!(
            max = config.max_connections,
            min = config.min_connections,
            "Database pool ready"
        );
        Ok(DbPool { pool })
    }

    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.pool
    }

    /// Repositories sharing this pool
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }
}
