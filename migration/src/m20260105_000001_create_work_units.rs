use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkUnits::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkUnits::OwnerId).string().not_null())
                    .col(ColumnDef::new(WorkUnits::BatchId).uuid())
                    .col(ColumnDef::new(WorkUnits::ExternalRef).string().not_null())
                    .col(ColumnDef::new(WorkUnits::SourceLocator).string().not_null())
                    .col(ColumnDef::new(WorkUnits::Status).string().not_null())
                    .col(ColumnDef::new(WorkUnits::Progress).integer().not_null().default(0))
                    .col(ColumnDef::new(WorkUnits::Message).string())
                    .col(ColumnDef::new(WorkUnits::ErrorMessage).text())
                    .col(ColumnDef::new(WorkUnits::ExtractedFields).json())
                    .col(ColumnDef::new(WorkUnits::Warnings).json().not_null())
                    .col(
                        ColumnDef::new(WorkUnits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WorkUnits::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WorkUnits::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(WorkUnits::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_work_units_owner_locator")
                    .table(WorkUnits::Table)
                    .col(WorkUnits::OwnerId)
                    .col(WorkUnits::SourceLocator)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_work_units_batch")
                    .table(WorkUnits::Table)
                    .col(WorkUnits::BatchId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkUnits::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WorkUnits {
    Table,
    Id,
    OwnerId,
    BatchId,
    ExternalRef,
    SourceLocator,
    Status,
    Progress,
    Message,
    ErrorMessage,
    ExtractedFields,
    Warnings,
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
}
