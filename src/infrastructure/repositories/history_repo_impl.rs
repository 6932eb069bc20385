// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::history::ScrapeHistoryEntry;
use crate::domain::repositories::history_repository::HistoryRepository;
use crate::domain::repositories::work_unit_repository::RepositoryError;
use crate::infrastructure::database::entities::scrape_history as history_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;

/// 运行历史仓库实现
#[derive(Clone)]
pub struct HistoryRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl HistoryRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<history_entity::Model> for ScrapeHistoryEntry {
    type Error = RepositoryError;

    fn try_from(model: history_entity::Model) -> Result<Self, Self::Error> {
        let trigger = model
            .trigger
            .parse()
            .map_err(|_| RepositoryError::Corrupt(format!("run trigger '{}'", model.trigger)))?;
        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            schedule_id: model.schedule_id,
            batch_id: model.batch_id,
            trigger,
            started_at: model.started_at,
            finished_at: model.finished_at,
            success: model.success,
            item_count: model.item_count.max(0) as u32,
            error_message: model.error_message,
        })
    }
}

#[async_trait]
impl HistoryRepository for HistoryRepositoryImpl {
    async fn append(&self, entry: &ScrapeHistoryEntry) -> Result<(), RepositoryError> {
        let model = history_entity::ActiveModel {
            id: Set(entry.id),
            owner_id: Set(entry.owner_id.clone()),
            schedule_id: Set(entry.schedule_id),
            batch_id: Set(entry.batch_id),
            trigger: Set(entry.trigger.to_string()),
            started_at: Set(entry.started_at),
            finished_at: Set(entry.finished_at),
            success: Set(entry.success),
            item_count: Set(entry.item_count.min(i32::MAX as u32) as i32),
            error_message: Set(entry.error_message.clone()),
        };
        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn list_recent(
        &self,
        owner_id: &str,
        limit: u64,
    ) -> Result<Vec<ScrapeHistoryEntry>, RepositoryError> {
        history_entity::Entity::find()
            .filter(history_entity::Column::OwnerId.eq(owner_id))
            .order_by_desc(history_entity::Column::StartedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(ScrapeHistoryEntry::try_from)
            .collect()
    }

    async fn last_run(&self, owner_id: &str) -> Result<Option<ScrapeHistoryEntry>, RepositoryError> {
        Ok(self.list_recent(owner_id, 1).await?.into_iter().next())
    }
}
