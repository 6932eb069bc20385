// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::schedule::{ActiveHours, Schedule};
use crate::domain::repositories::schedule_repository::ScheduleRepository;
use crate::domain::repositories::work_unit_repository::RepositoryError;
use crate::infrastructure::database::entities::schedule as schedule_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 调度仓库实现
#[derive(Clone)]
pub struct ScheduleRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl ScheduleRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<schedule_entity::Model> for Schedule {
    type Error = RepositoryError;

    fn try_from(model: schedule_entity::Model) -> Result<Self, Self::Error> {
        let active_hours = match (model.active_start_minute, model.active_end_minute) {
            (Some(start), Some(end)) => Some(ActiveHours::from_minutes(start, end).ok_or_else(|| {
                RepositoryError::Corrupt(format!("active hours {}..{}", start, end))
            })?),
            _ => None,
        };

        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            interval_minutes: model.interval_minutes.max(1) as u32,
            active_hours,
            utc_offset_minutes: model.utc_offset_minutes,
            enabled: model.enabled,
            consecutive_failures: model.consecutive_failures.max(0) as u32,
            last_run: model.last_run,
            next_run: model.next_run,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Schedule> for schedule_entity::ActiveModel {
    fn from(schedule: &Schedule) -> Self {
        let window = schedule.active_hours.map(|w| w.to_minutes());
        Self {
            id: Set(schedule.id),
            owner_id: Set(schedule.owner_id.clone()),
            interval_minutes: Set(schedule.interval_minutes.min(i32::MAX as u32) as i32),
            active_start_minute: Set(window.map(|(start, _)| start)),
            active_end_minute: Set(window.map(|(_, end)| end)),
            utc_offset_minutes: Set(schedule.utc_offset_minutes),
            enabled: Set(schedule.enabled),
            consecutive_failures: Set(schedule.consecutive_failures.min(i32::MAX as u32) as i32),
            last_run: Set(schedule.last_run),
            next_run: Set(schedule.next_run),
            created_at: Set(schedule.created_at),
            updated_at: Set(schedule.updated_at),
        }
    }
}

#[async_trait]
impl ScheduleRepository for ScheduleRepositoryImpl {
    async fn create(&self, schedule: &Schedule) -> Result<Schedule, RepositoryError> {
        let model: schedule_entity::ActiveModel = schedule.into();
        model.insert(self.db.as_ref()).await?;
        Ok(schedule.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>, RepositoryError> {
        schedule_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Schedule::try_from)
            .transpose()
    }

    async fn update(&self, schedule: &Schedule) -> Result<Schedule, RepositoryError> {
        let model: schedule_entity::ActiveModel = schedule.into();
        let updated = model.update(self.db.as_ref()).await?;
        Schedule::try_from(updated)
    }

    async fn find_enabled(&self) -> Result<Vec<Schedule>, RepositoryError> {
        schedule_entity::Entity::find()
            .filter(schedule_entity::Column::Enabled.eq(true))
            .order_by_asc(schedule_entity::Column::NextRun)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Schedule::try_from)
            .collect()
    }
}
