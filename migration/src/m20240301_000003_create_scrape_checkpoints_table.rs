use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000003_create_scrape_checkpoints_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScrapeCheckpoints::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ScrapeCheckpoints::Chain).text().not_null())
                    .col(ColumnDef::new(ScrapeCheckpoints::Address).text().not_null())
                    .col(
                        ColumnDef::new(ScrapeCheckpoints::Checkpoint)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScrapeCheckpoints::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_scrape_checkpoints")
                            .col(ScrapeCheckpoints::Chain)
                            .col(ScrapeCheckpoints::Address),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScrapeCheckpoints::Table).to_owned())
            .await
    }
}

/// Last scanned position per (chain, address)
#[derive(Iden)]
enum ScrapeCheckpoints {
    Table,
    Chain,
    Address,
    Checkpoint,
    UpdatedAt,
}
