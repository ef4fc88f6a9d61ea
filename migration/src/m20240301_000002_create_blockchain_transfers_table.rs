use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000002_create_blockchain_transfers_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // The composite primary key is the ingestion idempotency key
        manager
            .create_table(
                Table::create()
                    .table(BlockchainTransfers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BlockchainTransfers::Chain).text().not_null())
                    .col(
                        ColumnDef::new(BlockchainTransfers::TransactionHash)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BlockchainTransfers::LogIndex)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlockchainTransfers::ToAddress).text().not_null())
                    .col(
                        ColumnDef::new(BlockchainTransfers::FromAddress)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BlockchainTransfers::TokenSymbol)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlockchainTransfers::TokenName).text().not_null())
                    .col(
                        ColumnDef::new(BlockchainTransfers::Amount)
                            .decimal_len(38, 18)
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlockchainTransfers::UsdValue).decimal_len(38, 8))
                    .col(
                        ColumnDef::new(BlockchainTransfers::TransferType)
                            .text()
                            .not_null()
                            .default("incoming"),
                    )
                    .col(ColumnDef::new(BlockchainTransfers::BlockNumber).big_integer())
                    .col(
                        ColumnDef::new(BlockchainTransfers::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlockchainTransfers::NetworkId).text().not_null())
                    .col(
                        ColumnDef::new(BlockchainTransfers::WalletAddress)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlockchainTransfers::DataSource).text().not_null())
                    .col(
                        ColumnDef::new(BlockchainTransfers::ScrapedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_blockchain_transfers")
                            .col(BlockchainTransfers::Chain)
                            .col(BlockchainTransfers::TransactionHash)
                            .col(BlockchainTransfers::LogIndex)
                            .col(BlockchainTransfers::ToAddress),
                    )
                    .to_owned(),
            )
            .await?;

        // Summaries scan by network and window
        manager
            .create_index(
                Index::create()
                    .name("idx_blockchain_transfers_network_chain_ts")
                    .table(BlockchainTransfers::Table)
                    .col(BlockchainTransfers::NetworkId)
                    .col(BlockchainTransfers::Chain)
                    .col(BlockchainTransfers::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_blockchain_transfers_wallet_ts")
                    .table(BlockchainTransfers::Table)
                    .col(BlockchainTransfers::WalletAddress)
                    .col(BlockchainTransfers::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlockchainTransfers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum BlockchainTransfers {
    Table,
    Chain,
    TransactionHash,
    LogIndex,
    ToAddress,
    FromAddress,
    TokenSymbol,
    TokenName,
    Amount,
    UsdValue,
    TransferType,
    BlockNumber,
    Timestamp,
    NetworkId,
    WalletAddress,
    DataSource,
    ScrapedAt,
}
