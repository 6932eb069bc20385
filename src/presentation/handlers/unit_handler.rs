// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::{Extension, Json, Path};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::use_cases::dispatch_run::RunDispatcher;
use crate::domain::models::status::StatusSnapshot;
use crate::domain::models::work_unit::{UnitStatus, WorkUnit};
use crate::domain::repositories::work_unit_repository::WorkUnitRepository;
use crate::presentation::errors::AppError;
use crate::workers::batch_orchestrator::BatchOrchestrator;

/// 查询单元快照
///
/// 运行中的单元返回运行上下文里的实时进度，其余情况返回持久化状态
pub async fn get_unit(
    Extension(dispatcher): Extension<Arc<RunDispatcher>>,
    Extension(units): Extension<Arc<dyn WorkUnitRepository>>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<StatusSnapshot>, AppError> {
    let live = dispatcher.registry().unit_snapshot(unit_id);
    let snapshot = match units.find_by_id(unit_id).await? {
        Some(unit) if unit.status == UnitStatus::Running => {
            live.unwrap_or_else(|| persisted_snapshot(&unit))
        }
        Some(unit) => persisted_snapshot(&unit),
        None => live.unwrap_or_else(StatusSnapshot::not_found),
    };
    Ok(Json(snapshot))
}

/// 将失败单元重置为待处理
pub async fn retry_unit(
    Extension(orchestrator): Extension<Arc<BatchOrchestrator>>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<StatusSnapshot>, AppError> {
    let unit = orchestrator.retry_unit(unit_id).await?;
    Ok(Json(persisted_snapshot(&unit)))
}

fn persisted_snapshot(unit: &WorkUnit) -> StatusSnapshot {
    StatusSnapshot {
        status: unit.status.into(),
        progress: f32::from(unit.progress),
        message: unit
            .message
            .clone()
            .unwrap_or_else(|| unit.status.to_string()),
        error: unit.error_message.clone(),
        warnings: (!unit.warnings.is_empty()).then(|| unit.warnings.clone()),
    }
}
