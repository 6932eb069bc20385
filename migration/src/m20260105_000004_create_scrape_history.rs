use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScrapeHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScrapeHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScrapeHistory::OwnerId).string().not_null())
                    .col(ColumnDef::new(ScrapeHistory::ScheduleId).uuid())
                    .col(ColumnDef::new(ScrapeHistory::BatchId).uuid())
                    .col(ColumnDef::new(ScrapeHistory::Trigger).string().not_null())
                    .col(
                        ColumnDef::new(ScrapeHistory::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScrapeHistory::FinishedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScrapeHistory::Success).boolean().not_null())
                    .col(
                        ColumnDef::new(ScrapeHistory::ItemCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ScrapeHistory::ErrorMessage).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scrape_history_owner_started")
                    .table(ScrapeHistory::Table)
                    .col(ScrapeHistory::OwnerId)
                    .col(ScrapeHistory::StartedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScrapeHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScrapeHistory {
    Table,
    Id,
    OwnerId,
    ScheduleId,
    BatchId,
    Trigger,
    StartedAt,
    FinishedAt,
    Success,
    ItemCount,
    ErrorMessage,
}
