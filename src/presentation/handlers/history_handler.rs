// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::{Extension, Json, Path, Query};
use std::sync::Arc;
use validator::Validate;

use crate::application::dto::run_request::HistoryQueryDto;
use crate::domain::models::history::ScrapeHistoryEntry;
use crate::domain::repositories::history_repository::HistoryRepository;
use crate::presentation::errors::AppError;

/// 查询用户最近的运行历史，按开始时间倒序
pub async fn list_history(
    Extension(history): Extension<Arc<dyn HistoryRepository>>,
    Path(owner_id): Path<String>,
    Query(query): Query<HistoryQueryDto>,
) -> Result<Json<Vec<ScrapeHistoryEntry>>, AppError> {
    query.validate()?;
    let entries = history.list_recent(&owner_id, query.limit()).await?;
    Ok(Json(entries))
}
