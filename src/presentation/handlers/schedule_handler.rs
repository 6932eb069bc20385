// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::schedule_request::CreateScheduleRequestDto;
use crate::domain::models::schedule::Schedule;
use crate::domain::repositories::schedule_repository::ScheduleRepository;
use crate::presentation::errors::AppError;
use crate::utils::errors::AutomationError;

/// 创建调度
///
/// 新调度立即到期，下一个调度周期即可派发
pub async fn create_schedule(
    Extension(schedules): Extension<Arc<dyn ScheduleRepository>>,
    Json(payload): Json<CreateScheduleRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let active_hours = payload.active_hours().map_err(AutomationError::Validation)?;
    let schedule = Schedule::new(
        payload.owner_id,
        payload.interval_minutes,
        active_hours,
        payload.utc_offset_minutes,
    )
    .map_err(AutomationError::from)?;

    let schedule = schedules.create(&schedule).await?;
    info!(schedule_id = %schedule.id, owner_id = %schedule.owner_id, "Schedule created");
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn get_schedule(
    Extension(schedules): Extension<Arc<dyn ScheduleRepository>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(load(schedules.as_ref(), schedule_id).await?))
}

/// 重新启用调度，清零失败计数并立即到期
pub async fn enable_schedule(
    Extension(schedules): Extension<Arc<dyn ScheduleRepository>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Schedule>, AppError> {
    let mut schedule = load(schedules.as_ref(), schedule_id).await?;
    schedule.enable(Utc::now());
    let schedule = schedules.update(&schedule).await?;
    info!(%schedule_id, "Schedule enabled");
    Ok(Json(schedule))
}

pub async fn disable_schedule(
    Extension(schedules): Extension<Arc<dyn ScheduleRepository>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Schedule>, AppError> {
    let mut schedule = load(schedules.as_ref(), schedule_id).await?;
    schedule.disable();
    let schedule = schedules.update(&schedule).await?;
    info!(%schedule_id, "Schedule disabled");
    Ok(Json(schedule))
}

async fn load(schedules: &dyn ScheduleRepository, schedule_id: Uuid) -> Result<Schedule, AutomationError> {
    schedules
        .find_by_id(schedule_id)
        .await?
        .ok_or_else(|| AutomationError::NotFound(format!("schedule {}", schedule_id)))
}
