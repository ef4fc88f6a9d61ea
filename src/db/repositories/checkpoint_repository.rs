// Per (chain, address) scan checkpoints

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait};

use crate::db::DbError;
use crate::domain::Chain;
use crate::entity::scrape_checkpoints;

#[derive(Clone, Debug)]
pub struct CheckpointRepository {
    conn: DatabaseConnection,
}

impl CheckpointRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Last saved checkpoint; `None` means the address was never scanned
    pub async fn get(&self, chain: Chain, address: &str) -> Result<Option<i64>, DbError> {
        let row = scrape_checkpoints::Entity::find_by_id((
            chain.as_str().to_string(),
            address.to_string(),
        ))
        .one(&self.conn)
        .await?;
        Ok(row.map(|r| r.checkpoint))
    }

    /// Stores a checkpoint. Call only after every transfer up to it was persisted.
    pub async fn save(&self, chain: Chain, address: &str, checkpoint: i64) -> Result<(), DbError> {
        let model = scrape_checkpoints::ActiveModel {
            chain: Set(chain.as_str().to_string()),
            address: Set(address.to_string()),
            checkpoint: Set(checkpoint),
            updated_at: Set(Utc::now()),
        };

        scrape_checkpoints::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    scrape_checkpoints::Column::Chain,
                    scrape_checkpoints::Column::Address,
                ])
                .update_columns([
                    scrape_checkpoints::Column::Checkpoint,
                    scrape_checkpoints::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }
}
