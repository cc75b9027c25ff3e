use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_scan_logs_table::Migration)]
    }
}

mod m20240101_000001_create_scan_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_scan_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ScanLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ScanLogs::Id)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ScanLogs::Sku).string().not_null())
                        .col(ColumnDef::new(ScanLogs::LocationId).string().not_null())
                        .col(ColumnDef::new(ScanLogs::LocationName).string().not_null())
                        .col(ColumnDef::new(ScanLogs::ProductTitle).string().not_null())
                        .col(
                            ColumnDef::new(ScanLogs::PreviousQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ScanLogs::CurrentQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ScanLogs::Success).boolean().not_null())
                        .col(ColumnDef::new(ScanLogs::Message).string().not_null())
                        .col(ColumnDef::new(ScanLogs::Timestamp).timestamp().not_null())
                        .col(
                            ColumnDef::new(ScanLogs::Reverted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(ScanLogs::RevertedAt).timestamp().null())
                        .col(ColumnDef::new(ScanLogs::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(ScanLogs::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_scan_logs_timestamp", ScanLogs::Timestamp),
                ("idx_scan_logs_sku", ScanLogs::Sku),
                ("idx_scan_logs_location_id", ScanLogs::LocationId),
                ("idx_scan_logs_success", ScanLogs::Success),
                ("idx_scan_logs_reverted", ScanLogs::Reverted),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .name(name)
                            .table(ScanLogs::Table)
                            .col(column)
                            .if_not_exists()
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ScanLogs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden, Clone, Copy)]
    enum ScanLogs {
        Table,
        Id,
        Sku,
        LocationId,
        LocationName,
        ProductTitle,
        PreviousQuantity,
        CurrentQuantity,
        Success,
        Message,
        Timestamp,
        Reverted,
        RevertedAt,
        CreatedAt,
        UpdatedAt,
    }
}
