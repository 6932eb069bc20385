// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::work_unit::{UnitStatus, WorkUnit};
use crate::domain::repositories::work_unit_repository::{RepositoryError, WorkUnitRepository};
use crate::infrastructure::database::entities::work_unit as unit_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 工作单元仓库实现
///
/// 基于SeaORM实现的工作单元数据访问层
#[derive(Clone)]
pub struct WorkUnitRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl WorkUnitRepositoryImpl {
    /// 创建新的工作单元仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<unit_entity::Model> for WorkUnit {
    type Error = RepositoryError;

    fn try_from(model: unit_entity::Model) -> Result<Self, Self::Error> {
        let status = model
            .status
            .parse()
            .map_err(|_| RepositoryError::Corrupt(format!("unit status '{}'", model.status)))?;
        let extracted = model
            .extracted_fields
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| RepositoryError::Corrupt(format!("extracted fields: {}", e)))?;
        let warnings = serde_json::from_value(model.warnings)
            .map_err(|e| RepositoryError::Corrupt(format!("warnings: {}", e)))?;

        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            batch_id: model.batch_id,
            external_ref: model.external_ref,
            source_locator: model.source_locator,
            status,
            progress: model.progress.clamp(0, 100) as u8,
            message: model.message,
            error_message: model.error_message,
            extracted,
            warnings,
            created_at: model.created_at,
            updated_at: model.updated_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
        })
    }
}

impl From<&WorkUnit> for unit_entity::ActiveModel {
    fn from(unit: &WorkUnit) -> Self {
        Self {
            id: Set(unit.id),
            owner_id: Set(unit.owner_id.clone()),
            batch_id: Set(unit.batch_id),
            external_ref: Set(unit.external_ref.clone()),
            source_locator: Set(unit.source_locator.clone()),
            status: Set(unit.status.to_string()),
            progress: Set(i32::from(unit.progress)),
            message: Set(unit.message.clone()),
            error_message: Set(unit.error_message.clone()),
            extracted_fields: Set(unit
                .extracted
                .as_ref()
                .and_then(|e| serde_json::to_value(e).ok())),
            warnings: Set(serde_json::to_value(&unit.warnings)
                .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))),
            created_at: Set(unit.created_at),
            updated_at: Set(unit.updated_at),
            started_at: Set(unit.started_at),
            completed_at: Set(unit.completed_at),
        }
    }
}

#[async_trait]
impl WorkUnitRepository for WorkUnitRepositoryImpl {
    async fn create(&self, unit: &WorkUnit) -> Result<WorkUnit, RepositoryError> {
        let model: unit_entity::ActiveModel = unit.into();
        model.insert(self.db.as_ref()).await?;
        Ok(unit.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkUnit>, RepositoryError> {
        unit_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(WorkUnit::try_from)
            .transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<WorkUnit>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = unit_entity::Entity::find()
            .filter(unit_entity::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.as_ref())
            .await?;

        let mut by_id: HashMap<Uuid, unit_entity::Model> =
            models.into_iter().map(|m| (m.id, m)).collect();
        ids.iter()
            .filter_map(|id| by_id.remove(id))
            .map(WorkUnit::try_from)
            .collect()
    }

    async fn update(&self, unit: &WorkUnit) -> Result<WorkUnit, RepositoryError> {
        let model: unit_entity::ActiveModel = unit.into();
        let updated = model.update(self.db.as_ref()).await?;
        WorkUnit::try_from(updated)
    }

    async fn find_by_locator(
        &self,
        owner_id: &str,
        source_locator: &str,
    ) -> Result<Option<WorkUnit>, RepositoryError> {
        unit_entity::Entity::find()
            .filter(unit_entity::Column::OwnerId.eq(owner_id))
            .filter(unit_entity::Column::SourceLocator.eq(source_locator))
            .order_by_desc(unit_entity::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?
            .map(WorkUnit::try_from)
            .transpose()
    }

    async fn find_by_status(&self, status: UnitStatus) -> Result<Vec<WorkUnit>, RepositoryError> {
        unit_entity::Entity::find()
            .filter(unit_entity::Column::Status.eq(status.to_string()))
            .order_by_asc(unit_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(WorkUnit::try_from)
            .collect()
    }
}
