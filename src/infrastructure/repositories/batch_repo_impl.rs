// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::batch_job::{BatchJob, BatchOptions, BatchStatus};
use crate::domain::repositories::batch_repository::BatchRepository;
use crate::domain::repositories::work_unit_repository::RepositoryError;
use crate::infrastructure::database::entities::batch_job as batch_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 批次仓库实现
#[derive(Clone)]
pub struct BatchRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl BatchRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn decode_ids(value: serde_json::Value, column: &str) -> Result<Vec<Uuid>, RepositoryError> {
    serde_json::from_value(value).map_err(|e| RepositoryError::Corrupt(format!("{}: {}", column, e)))
}

fn encode_ids(ids: &[Uuid]) -> serde_json::Value {
    serde_json::Value::Array(
        ids.iter()
            .map(|id| serde_json::Value::String(id.to_string()))
            .collect(),
    )
}

impl TryFrom<batch_entity::Model> for BatchJob {
    type Error = RepositoryError;

    fn try_from(model: batch_entity::Model) -> Result<Self, Self::Error> {
        let status = model
            .status
            .parse()
            .map_err(|_| RepositoryError::Corrupt(format!("batch status '{}'", model.status)))?;

        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            unit_ids: decode_ids(model.unit_ids, "unit_ids")?,
            completed_unit_ids: decode_ids(model.completed_unit_ids, "completed_unit_ids")?,
            status,
            options: BatchOptions {
                stop_on_first_failure: model.stop_on_first_failure,
                submit: model.submit,
            },
            error_message: model.error_message,
            created_at: model.created_at,
            updated_at: model.updated_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
        })
    }
}

impl From<&BatchJob> for batch_entity::ActiveModel {
    fn from(batch: &BatchJob) -> Self {
        Self {
            id: Set(batch.id),
            owner_id: Set(batch.owner_id.clone()),
            unit_ids: Set(encode_ids(&batch.unit_ids)),
            completed_unit_ids: Set(encode_ids(&batch.completed_unit_ids)),
            status: Set(batch.status.to_string()),
            stop_on_first_failure: Set(batch.options.stop_on_first_failure),
            submit: Set(batch.options.submit),
            error_message: Set(batch.error_message.clone()),
            created_at: Set(batch.created_at),
            updated_at: Set(batch.updated_at),
            started_at: Set(batch.started_at),
            completed_at: Set(batch.completed_at),
        }
    }
}

#[async_trait]
impl BatchRepository for BatchRepositoryImpl {
    async fn create(&self, batch: &BatchJob) -> Result<BatchJob, RepositoryError> {
        let model: batch_entity::ActiveModel = batch.into();
        model.insert(self.db.as_ref()).await?;
        Ok(batch.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BatchJob>, RepositoryError> {
        batch_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(BatchJob::try_from)
            .transpose()
    }

    async fn update(&self, batch: &BatchJob) -> Result<BatchJob, RepositoryError> {
        let model: batch_entity::ActiveModel = batch.into();
        let updated = model.update(self.db.as_ref()).await?;
        BatchJob::try_from(updated)
    }

    async fn find_by_status(&self, status: BatchStatus) -> Result<Vec<BatchJob>, RepositoryError> {
        batch_entity::Entity::find()
            .filter(batch_entity::Column::Status.eq(status.to_string()))
            .order_by_asc(batch_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(BatchJob::try_from)
            .collect()
    }
}
