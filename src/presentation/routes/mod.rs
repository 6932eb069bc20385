// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::use_cases::dispatch_run::RunDispatcher;
use crate::config::settings::Settings;
use crate::domain::repositories::history_repository::HistoryRepository;
use crate::domain::repositories::schedule_repository::ScheduleRepository;
use crate::domain::repositories::work_unit_repository::WorkUnitRepository;
use crate::presentation::handlers::{history_handler, run_handler, schedule_handler, unit_handler};
use crate::workers::batch_orchestrator::BatchOrchestrator;

/// 接口层依赖的组件
#[derive(Clone)]
pub struct ApiComponents {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<RunDispatcher>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub units: Arc<dyn WorkUnitRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub history: Arc<dyn HistoryRepository>,
}

/// 创建应用路由
///
/// # 返回值
///
/// 返回未注入依赖的路由
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        .route("/v1/runs/{run_id}", get(run_handler::get_run))
        .route("/v1/runs/{run_id}/pause", post(run_handler::pause_run))
        .route("/v1/runs/{run_id}/cancel", post(run_handler::cancel_run))
        .route("/v1/owners/{owner_id}/runs", post(run_handler::trigger_run))
        .route(
            "/v1/owners/{owner_id}/history",
            get(history_handler::list_history),
        )
        .route("/v1/batches/{batch_id}", get(run_handler::get_batch))
        .route(
            "/v1/batches/{batch_id}/resume",
            post(run_handler::resume_batch),
        )
        .route("/v1/units/{unit_id}", get(unit_handler::get_unit))
        .route("/v1/units/{unit_id}/retry", post(unit_handler::retry_unit))
        .route("/v1/schedules", post(schedule_handler::create_schedule))
        .route(
            "/v1/schedules/{schedule_id}",
            get(schedule_handler::get_schedule),
        )
        .route(
            "/v1/schedules/{schedule_id}/enable",
            post(schedule_handler::enable_schedule),
        )
        .route(
            "/v1/schedules/{schedule_id}/disable",
            post(schedule_handler::disable_schedule),
        );

    Router::new().merge(public_routes).merge(api_routes)
}

/// 创建注入了全部依赖的应用
///
/// # 参数
///
/// * `components` - 接口层依赖
///
/// # 返回值
///
/// 可直接交给 `axum::serve` 的路由
pub fn app(components: ApiComponents) -> Router {
    routes()
        .layer(Extension(components.settings))
        .layer(Extension(components.dispatcher))
        .layer(Extension(components.orchestrator))
        .layer(Extension(components.units))
        .layer(Extension(components.schedules))
        .layer(Extension(components.history))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
