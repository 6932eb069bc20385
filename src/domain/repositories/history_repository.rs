// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::history::ScrapeHistoryEntry;
use crate::domain::repositories::work_unit_repository::RepositoryError;
use async_trait::async_trait;

/// 运行历史仓库特质
///
/// 只追加，不提供更新接口
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// 写入一条历史记录
    async fn append(&self, entry: &ScrapeHistoryEntry) -> Result<(), RepositoryError>;
    /// 用户最近的历史记录，按开始时间倒序
    async fn list_recent(
        &self,
        owner_id: &str,
        limit: u64,
    ) -> Result<Vec<ScrapeHistoryEntry>, RepositoryError>;
    /// 用户最近一次运行
    async fn last_run(&self, owner_id: &str) -> Result<Option<ScrapeHistoryEntry>, RepositoryError>;
}
