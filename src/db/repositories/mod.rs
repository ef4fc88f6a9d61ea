// Database repository management

mod checkpoint_repository;
mod network_repository;
mod transfer_repository;

pub use checkpoint_repository::CheckpointRepository;
pub use network_repository::NetworkRepository;
pub use transfer_repository::{page_offset, SortField, TransferFilter, TransferKey, TransferRepository};

use sea_orm::DatabaseConnection;

/// Container for all database repositories
#[derive(Clone, Debug)]
pub struct Repositories {
    pub transfers: TransferRepository,
    pub networks: NetworkRepository,
    pub checkpoints: CheckpointRepository,
}

impl Repositories {
    /// Creates a new repositories container with database connection
    pub fn new(conn: DatabaseConnection) -> Self {
        Repositories {
            transfers: TransferRepository::new(conn.clone()),
            networks: NetworkRepository::new(conn.clone()),
            checkpoints: CheckpointRepository::new(conn),
        }
    }
}
