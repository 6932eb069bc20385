use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BatchJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BatchJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BatchJobs::OwnerId).string().not_null())
                    .col(ColumnDef::new(BatchJobs::UnitIds).json().not_null())
                    .col(ColumnDef::new(BatchJobs::CompletedUnitIds).json().not_null())
                    .col(ColumnDef::new(BatchJobs::Status).string().not_null())
                    .col(
                        ColumnDef::new(BatchJobs::StopOnFirstFailure)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(BatchJobs::Submit)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(BatchJobs::ErrorMessage).text())
                    .col(
                        ColumnDef::new(BatchJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BatchJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(BatchJobs::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batch_jobs_owner_status")
                    .table(BatchJobs::Table)
                    .col(BatchJobs::OwnerId)
                    .col(BatchJobs::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BatchJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BatchJobs {
    Table,
    Id,
    OwnerId,
    UnitIds,
    CompletedUnitIds,
    Status,
    StopOnFirstFailure,
    Submit,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
}
