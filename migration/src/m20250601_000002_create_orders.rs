use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Orders::OrderId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::BusinessId).string_len(128).not_null())
                    .col(ColumnDef::new(Orders::PayAddress).string_len(128).not_null())
                    .col(ColumnDef::new(Orders::AlgorithmId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Amount).string_len(80).not_null())
                    .col(ColumnDef::new(Orders::PayTokenId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::PayStatus).integer().not_null())
                    .col(ColumnDef::new(Orders::OrderStatus).integer().not_null())
                    .col(ColumnDef::new(Orders::CreatedAtMs).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Backs the address/token/amount fallback lookup.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_address_token_amount")
                    .table(Orders::Table)
                    .col(Orders::PayAddress)
                    .col(Orders::PayTokenId)
                    .col(Orders::Amount)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    OrderId,
    BusinessId,
    PayAddress,
    AlgorithmId,
    Amount,
    PayTokenId,
    PayStatus,
    OrderStatus,
    CreatedAtMs,
}
