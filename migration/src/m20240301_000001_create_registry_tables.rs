use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000001_create_registry_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Networks are maintained by the back-office CRUD layer
        manager
            .create_table(
                Table::create()
                    .table(Networks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Networks::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Networks::Name).text().not_null())
                    .col(
                        ColumnDef::new(Networks::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WalletAddresses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WalletAddresses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WalletAddresses::NetworkId).text().not_null())
                    .col(ColumnDef::new(WalletAddresses::Chain).text().not_null())
                    .col(ColumnDef::new(WalletAddresses::Address).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_addresses_network")
                            .from(WalletAddresses::Table, WalletAddresses::NetworkId)
                            .to(Networks::Table, Networks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_wallet_addresses_network_chain")
                    .table(WalletAddresses::Table)
                    .col(WalletAddresses::NetworkId)
                    .col(WalletAddresses::Chain)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WalletAddresses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Networks::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Networks {
    Table,
    Id,
    Name,
    IsActive,
}

#[derive(Iden)]
enum WalletAddresses {
    Table,
    Id,
    NetworkId,
    Chain,
    Address,
}
