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

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    application::{
        dto::{
            run_request::TriggerRunRequestDto,
            run_response::{BatchSummaryDto, RunAcceptedDto},
        },
        use_cases::dispatch_run::{RunDispatcher, RunRequest, RunTarget},
    },
    config::settings::Settings,
    domain::models::{history::RunTrigger, status::StatusSnapshot},
    infrastructure::state::run_registry::{RunContext, RunId},
    presentation::errors::AppError,
    utils::errors::AutomationError,
    workers::batch_orchestrator::BatchOrchestrator,
};

/// 查询运行快照
///
/// 未知或已清理的运行返回 `not_found` 状态而不是404，轮询方据此停止
pub async fn get_run(
    Extension(dispatcher): Extension<Arc<RunDispatcher>>,
    Path(run_id): Path<String>,
) -> Json<StatusSnapshot> {
    let snapshot = match run_id.parse::<RunId>() {
        Ok(id) => dispatcher.registry().snapshot(id),
        Err(_) => StatusSnapshot::not_found(),
    };
    Json(snapshot)
}

/// 请求暂停运行，在当前单元结束后生效
pub async fn pause_run(
    Extension(dispatcher): Extension<Arc<RunDispatcher>>,
    Path(run_id): Path<String>,
) -> Result<Json<StatusSnapshot>, AppError> {
    let ctx = find_active_run(&dispatcher, &run_id)?;
    ctx.request_pause();
    info!(run_id = %ctx.id(), "Pause requested");
    Ok(Json(ctx.snapshot()))
}

/// 请求取消运行，在下一个步骤边界生效
pub async fn cancel_run(
    Extension(dispatcher): Extension<Arc<RunDispatcher>>,
    Path(run_id): Path<String>,
) -> Result<Json<StatusSnapshot>, AppError> {
    let ctx = find_active_run(&dispatcher, &run_id)?;
    ctx.request_cancel();
    info!(run_id = %ctx.id(), "Cancellation requested");
    Ok(Json(ctx.snapshot()))
}

/// 手动触发用户的运行
///
/// # 返回值
///
/// * `202` - 运行已开始
/// * `409` - 该用户已有进行中的运行
pub async fn trigger_run(
    Extension(dispatcher): Extension<Arc<RunDispatcher>>,
    Extension(settings): Extension<Arc<Settings>>,
    Path(owner_id): Path<String>,
    Json(payload): Json<TriggerRunRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if owner_id.trim().is_empty() {
        return Err(AutomationError::Validation("owner id cannot be empty".to_string()).into());
    }

    let submit = payload.submit.unwrap_or(settings.automation.manual_submit);
    let run = dispatcher.dispatch(RunRequest {
        owner_id: owner_id.clone(),
        trigger: RunTrigger::Manual,
        schedule_id: None,
        target: RunTarget::Discover { submit },
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAcceptedDto {
            success: true,
            run_id: run.run_id,
            owner_id,
        }),
    ))
}

/// 查询批次概要
pub async fn get_batch(
    Extension(orchestrator): Extension<Arc<BatchOrchestrator>>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchSummaryDto>, AppError> {
    let batch = orchestrator
        .find_batch(batch_id)
        .await?
        .ok_or_else(|| AutomationError::NotFound(format!("batch {}", batch_id)))?;
    Ok(Json(BatchSummaryDto::from(&batch)))
}

/// 恢复部分完成的批次
///
/// # 返回值
///
/// * `202` - 恢复运行已开始
/// * `404` - 批次不存在
/// * `409` - 批次不可恢复或用户已有进行中的运行
pub async fn resume_batch(
    Extension(dispatcher): Extension<Arc<RunDispatcher>>,
    Extension(orchestrator): Extension<Arc<BatchOrchestrator>>,
    Path(batch_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let batch = orchestrator
        .find_batch(batch_id)
        .await?
        .ok_or_else(|| AutomationError::NotFound(format!("batch {}", batch_id)))?;
    if !batch.is_resumable() {
        return Err(AutomationError::NotResumable(batch_id.to_string()).into());
    }

    let run = dispatcher.dispatch(RunRequest {
        owner_id: batch.owner_id.clone(),
        trigger: RunTrigger::Manual,
        schedule_id: None,
        target: RunTarget::Resume { batch_id },
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAcceptedDto {
            success: true,
            run_id: run.run_id,
            owner_id: batch.owner_id,
        }),
    ))
}

fn find_active_run(
    dispatcher: &RunDispatcher,
    run_id: &str,
) -> Result<Arc<RunContext>, AutomationError> {
    let id = run_id
        .parse::<RunId>()
        .map_err(|_| AutomationError::NotFound(format!("run {}", run_id)))?;
    let ctx = dispatcher
        .registry()
        .get(id)
        .ok_or_else(|| AutomationError::NotFound(format!("run {}", run_id)))?;
    if ctx.is_finished() {
        return Err(AutomationError::InvalidState(format!("run {} already finished", run_id)));
    }
    Ok(ctx)
}
