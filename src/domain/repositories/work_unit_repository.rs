// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::work_unit::{UnitStatus, WorkUnit};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 持久化的数据无法还原为领域对象
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// 工作单元仓库特质
///
/// 定义工作单元数据访问接口
#[async_trait]
pub trait WorkUnitRepository: Send + Sync {
    /// 创建新工作单元
    async fn create(&self, unit: &WorkUnit) -> Result<WorkUnit, RepositoryError>;
    /// 根据ID查找工作单元
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkUnit>, RepositoryError>;
    /// 按给定顺序批量查找，缺失的ID被忽略
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<WorkUnit>, RepositoryError>;
    /// 更新工作单元
    async fn update(&self, unit: &WorkUnit) -> Result<WorkUnit, RepositoryError>;
    /// 按用户和来源地址查找（用于发现阶段去重）
    async fn find_by_locator(
        &self,
        owner_id: &str,
        source_locator: &str,
    ) -> Result<Option<WorkUnit>, RepositoryError>;
    /// 查找指定状态的所有单元
    async fn find_by_status(&self, status: UnitStatus) -> Result<Vec<WorkUnit>, RepositoryError>;
}
