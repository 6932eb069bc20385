// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::batch_job::{BatchJob, BatchStatus};
use crate::domain::repositories::work_unit_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 批处理作业仓库特质
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// 创建批次
    async fn create(&self, batch: &BatchJob) -> Result<BatchJob, RepositoryError>;
    /// 根据ID查找批次
    async fn find_by_id(&self, id: Uuid) -> Result<Option<BatchJob>, RepositoryError>;
    /// 更新批次（包括检查点）
    async fn update(&self, batch: &BatchJob) -> Result<BatchJob, RepositoryError>;
    /// 查找指定状态的所有批次
    async fn find_by_status(&self, status: BatchStatus) -> Result<Vec<BatchJob>, RepositoryError>;
}
