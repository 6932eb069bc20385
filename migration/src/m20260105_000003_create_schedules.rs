use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Schedules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Schedules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Schedules::OwnerId).string().not_null())
                    .col(ColumnDef::new(Schedules::IntervalMinutes).integer().not_null())
                    // Minutes since local midnight
                    .col(ColumnDef::new(Schedules::ActiveStartMinute).integer())
                    .col(ColumnDef::new(Schedules::ActiveEndMinute).integer())
                    .col(
                        ColumnDef::new(Schedules::UtcOffsetMinutes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Schedules::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Schedules::ConsecutiveFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Schedules::LastRun).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Schedules::NextRun)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Schedules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Schedules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_schedules_enabled_next_run")
                    .table(Schedules::Table)
                    .col(Schedules::Enabled)
                    .col(Schedules::NextRun)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Schedules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Schedules {
    Table,
    Id,
    OwnerId,
    IntervalMinutes,
    ActiveStartMinute,
    ActiveEndMinute,
    UtcOffsetMinutes,
    Enabled,
    ConsecutiveFailures,
    LastRun,
    NextRun,
    CreatedAt,
    UpdatedAt,
}
