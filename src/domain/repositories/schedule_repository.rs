// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::schedule::Schedule;
use crate::domain::repositories::work_unit_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 调度仓库特质
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create(&self, schedule: &Schedule) -> Result<Schedule, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>, RepositoryError>;
    async fn update(&self, schedule: &Schedule) -> Result<Schedule, RepositoryError>;
    /// 所有已启用的调度
    async fn find_enabled(&self) -> Result<Vec<Schedule>, RepositoryError>;
}
