use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Payments::PayHash)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Payments::OrderId).string_len(64).not_null())
                    .col(ColumnDef::new(Payments::PayAddress).string_len(128).not_null())
                    .col(ColumnDef::new(Payments::AlgorithmId).big_integer().not_null())
                    .col(ColumnDef::new(Payments::Timestamp).big_integer().not_null())
                    .col(ColumnDef::new(Payments::Amount).string_len(80).not_null())
                    .col(ColumnDef::new(Payments::PayTokenId).big_integer().not_null())
                    .col(ColumnDef::new(Payments::PayHashStatus).integer().not_null())
                    .col(ColumnDef::new(Payments::RefundStatus).integer().not_null())
                    .col(
                        ColumnDef::new(Payments::RefundHash)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Payments::RefundNonce)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payments_order_id")
                    .table(Payments::Table)
                    .col(Payments::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    PayHash,
    OrderId,
    PayAddress,
    AlgorithmId,
    Timestamp,
    Amount,
    PayTokenId,
    PayHashStatus,
    RefundStatus,
    RefundHash,
    RefundNonce,
}
