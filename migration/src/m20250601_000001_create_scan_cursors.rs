use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScanCursors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ScanCursors::ChainId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ScanCursors::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScanCursors::BlockHash)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScanCursors::ParentHash)
                            .string_len(128)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ScanCursors::ChainId)
                            .col(ScanCursors::BlockNumber),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScanCursors::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ScanCursors {
    Table,
    ChainId,
    BlockNumber,
    BlockHash,
    ParentHash,
}
