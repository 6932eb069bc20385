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

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::domain::models::batch_job::{BatchOptions, BatchStatus};
use crate::domain::models::history::{RunAttempt, RunTrigger};
use crate::domain::models::status::SnapshotStatus;
use crate::domain::repositories::history_repository::HistoryRepository;
use crate::domain::repositories::schedule_repository::ScheduleRepository;
use crate::domain::services::credential_vault::CredentialVault;
use crate::engines::session::SessionFactory;
use crate::engines::traits::BrowserDriver;
use crate::infrastructure::observability::metrics;
use crate::infrastructure::state::in_flight::{InFlightGuard, InFlightRegistry};
use crate::infrastructure::state::run_registry::{RunContext, RunId, RunRegistry};
use crate::utils::errors::AutomationError;
use crate::workers::batch_orchestrator::{BatchOrchestrator, BatchReport};
use crate::workers::discovery::WorkOrderDiscovery;

/// 运行目标
#[derive(Debug, Clone)]
pub enum RunTarget {
    /// 发现工单并新建批次
    Discover { submit: bool },
    /// 恢复已有批次
    Resume { batch_id: Uuid },
}

/// 运行请求
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub owner_id: String,
    pub trigger: RunTrigger,
    pub schedule_id: Option<Uuid>,
    pub target: RunTarget,
}

/// 运行结束后的结论
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// 批次全部完成（或无事可做）
    Succeeded { completed_units: u32 },
    /// 运行失败，计入调度失败次数
    Failed { error: String },
    /// 运行被暂停或取消，不影响调度失败次数
    Interrupted { reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

/// 已派发的运行
pub struct DispatchedRun {
    pub run_id: RunId,
    pub handle: JoinHandle<RunOutcome>,
}

/// 运行派发器
///
/// 串联凭证保管库、会话工厂、工单发现与批处理编排器。
/// 每次派发在独立任务中执行，受用户互斥标记与运行总时限约束，
/// 无论结果如何（包括超时与 panic）都写入一条历史记录。
#[derive(Clone)]
pub struct RunDispatcher {
    vault: Arc<dyn CredentialVault>,
    sessions: Arc<dyn SessionFactory>,
    discovery: Arc<WorkOrderDiscovery>,
    orchestrator: Arc<BatchOrchestrator>,
    schedules: Arc<dyn ScheduleRepository>,
    history: Arc<dyn HistoryRepository>,
    registry: Arc<RunRegistry>,
    in_flight: InFlightRegistry,
    max_run_duration: Duration,
    stop_on_first_failure: bool,
}

impl RunDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vault: Arc<dyn CredentialVault>,
        sessions: Arc<dyn SessionFactory>,
        discovery: Arc<WorkOrderDiscovery>,
        orchestrator: Arc<BatchOrchestrator>,
        schedules: Arc<dyn ScheduleRepository>,
        history: Arc<dyn HistoryRepository>,
        registry: Arc<RunRegistry>,
        in_flight: InFlightRegistry,
        max_run_duration: Duration,
        stop_on_first_failure: bool,
    ) -> Self {
        Self {
            vault,
            sessions,
            discovery,
            orchestrator,
            schedules,
            history,
            registry,
            in_flight,
            max_run_duration,
            stop_on_first_failure,
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// 派发一次运行
    ///
    /// # 参数
    ///
    /// * `request` - 运行请求
    ///
    /// # 返回值
    ///
    /// * `Ok(DispatchedRun)` - 运行已在后台开始
    /// * `Err(AutomationError::OwnerBusy)` - 该用户已有进行中的运行
    pub fn dispatch(&self, request: RunRequest) -> Result<DispatchedRun, AutomationError> {
        let guard = self
            .in_flight
            .try_acquire(&request.owner_id)
            .ok_or_else(|| AutomationError::OwnerBusy(request.owner_id.clone()))?;
        Ok(self.dispatch_guarded(guard, request))
    }

    /// 使用调用方已取得的互斥标记派发运行
    ///
    /// guard 随运行任务结束一起释放
    pub fn dispatch_guarded(&self, guard: InFlightGuard, request: RunRequest) -> DispatchedRun {
        let ctx = self.registry.register(&request.owner_id, request.trigger);
        let run_id = ctx.id();
        metrics::record_run_started(&request.trigger.to_string());
        info!(%run_id, owner_id = %request.owner_id, trigger = %request.trigger, "Dispatching run");

        let this = self.clone();
        let span = tracing::info_span!("run", %run_id, owner_id = %request.owner_id);
        let handle = tokio::spawn(
            async move {
                let outcome = this.supervise(ctx, request).await;
                drop(guard);
                outcome
            }
            .instrument(span),
        );

        DispatchedRun { run_id, handle }
    }

    /// 执行并兜底一次运行：超时、panic 都收敛为失败结论
    async fn supervise(&self, ctx: Arc<RunContext>, request: RunRequest) -> RunOutcome {
        let started = Instant::now();
        let mut attempt = RunAttempt::begin(&request.owner_id, request.trigger, request.schedule_id);

        let pipeline = {
            let this = self.clone();
            let ctx = Arc::clone(&ctx);
            let target = request.target.clone();
            let limit = self.max_run_duration;
            tokio::spawn(
                async move { tokio::time::timeout(limit, this.execute(target, &ctx)).await }
                    .in_current_span(),
            )
        };

        let result = match pipeline.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(AutomationError::Timeout(self.max_run_duration.as_secs())),
            Err(join_error) => {
                error!(error = %join_error, "Run task aborted");
                Err(AutomationError::Internal(format!("run task aborted: {}", join_error)))
            }
        };

        if let Some(batch_id) = ctx.batch_id() {
            attempt.set_batch(batch_id);
        }

        let (outcome, items) = self.conclude(&ctx, result).await;
        let entry = match &outcome {
            RunOutcome::Succeeded { .. } => attempt.finish_success(items),
            RunOutcome::Failed { error } => attempt.finish_failure(items, error.clone()),
            RunOutcome::Interrupted { reason } => attempt.finish_failure(items, reason.clone()),
        };
        if let Err(e) = self.history.append(&entry).await {
            error!(error = %e, "Failed to write run history");
        }

        if let Some(schedule_id) = request.schedule_id {
            self.apply_schedule_outcome(schedule_id, &outcome).await;
        }

        metrics::record_run_finished(&request.trigger.to_string(), outcome.is_success(), started.elapsed());
        info!(?outcome, elapsed_ms = started.elapsed().as_millis() as u64, "Run finished");
        outcome
    }

    /// 将执行结果写入运行上下文，必要时强制失败批次
    async fn conclude(
        &self,
        ctx: &RunContext,
        result: Result<Option<BatchReport>, AutomationError>,
    ) -> (RunOutcome, u32) {
        match result {
            Ok(None) => {
                ctx.finish(SnapshotStatus::Completed, "no work orders to process", None);
                (RunOutcome::Succeeded { completed_units: 0 }, 0)
            }
            Ok(Some(report)) => {
                let items = report.completed_this_run;
                let batch = &report.batch;
                match batch.status {
                    BatchStatus::Completed => {
                        ctx.finish(SnapshotStatus::Completed, "batch completed", None);
                        (RunOutcome::Succeeded { completed_units: items }, items)
                    }
                    BatchStatus::Paused => {
                        ctx.finish(SnapshotStatus::Paused, "batch paused", None);
                        (RunOutcome::Interrupted { reason: "paused".to_string() }, items)
                    }
                    BatchStatus::Cancelled => {
                        ctx.finish(SnapshotStatus::Cancelled, "batch cancelled", None);
                        (RunOutcome::Interrupted { reason: "cancelled".to_string() }, items)
                    }
                    _ => {
                        let error = report
                            .fatal
                            .as_ref()
                            .map(|e| e.to_string())
                            .or_else(|| batch.error_message.clone())
                            .unwrap_or_else(|| "batch failed".to_string());
                        ctx.finish(SnapshotStatus::Failed, "batch failed", Some(error.clone()));
                        (RunOutcome::Failed { error }, items)
                    }
                }
            }
            Err(err) => {
                let error = err.to_string();
                if let Some(batch_id) = ctx.batch_id() {
                    if let Err(e) = self.orchestrator.force_fail(batch_id, &error).await {
                        error!(%batch_id, error = %e, "Failed to force-fail batch");
                    }
                }
                warn!(error = %error, "Run failed");
                ctx.finish(SnapshotStatus::Failed, "run failed", Some(error.clone()));
                let items = ctx.completed_units().min(u32::MAX as usize) as u32;
                (RunOutcome::Failed { error }, items)
            }
        }
    }

    #[instrument(skip(self, ctx), fields(owner_id = %ctx.owner_id()))]
    async fn execute(
        &self,
        target: RunTarget,
        ctx: &RunContext,
    ) -> Result<Option<BatchReport>, AutomationError> {
        ctx.set_phase(SnapshotStatus::Running, "retrieving credentials");
        let credential = self.vault.retrieve(ctx.owner_id()).await?;

        ctx.set_phase(SnapshotStatus::Running, "opening portal session");
        let driver = self.sessions.open(&credential).await?;
        drop(credential);
        if let Err(e) = self.vault.touch(ctx.owner_id()).await {
            warn!(error = %e, "Failed to update credential last-used time");
        }

        let result = self.drive(driver.as_ref(), target, ctx).await;
        if let Err(e) = driver.close().await {
            warn!(error = %e, "Failed to close browser session");
        }
        result
    }

    async fn drive(
        &self,
        driver: &dyn BrowserDriver,
        target: RunTarget,
        ctx: &RunContext,
    ) -> Result<Option<BatchReport>, AutomationError> {
        let batch_id = match target {
            RunTarget::Discover { submit } => {
                ctx.set_phase(SnapshotStatus::Running, "discovering work orders");
                let unit_ids = self.discovery.discover(driver, ctx.owner_id()).await?;
                if unit_ids.is_empty() {
                    return Ok(None);
                }
                let options = BatchOptions {
                    stop_on_first_failure: self.stop_on_first_failure,
                    submit,
                };
                self.orchestrator
                    .create_batch(ctx.owner_id(), &unit_ids, None, options)
                    .await?
                    .id
            }
            RunTarget::Resume { batch_id } => {
                let batch = self
                    .orchestrator
                    .find_batch(batch_id)
                    .await?
                    .ok_or_else(|| AutomationError::NotFound(format!("batch {}", batch_id)))?;
                if batch.owner_id != ctx.owner_id() {
                    return Err(AutomationError::Validation(format!(
                        "batch {} does not belong to {}",
                        batch_id,
                        ctx.owner_id()
                    )));
                }
                batch.id
            }
        };

        self.orchestrator.run(driver, batch_id, ctx).await.map(Some)
    }

    /// 根据运行结论更新调度的连续失败计数
    ///
    /// 在持有用户互斥标记期间执行，重新读取最新的调度记录
    async fn apply_schedule_outcome(&self, schedule_id: Uuid, outcome: &RunOutcome) {
        let mut schedule = match self.schedules.find_by_id(schedule_id).await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => {
                warn!(%schedule_id, "Schedule vanished before outcome could be recorded");
                return;
            }
            Err(e) => {
                error!(%schedule_id, error = %e, "Failed to load schedule");
                return;
            }
        };

        match outcome {
            RunOutcome::Succeeded { .. } => schedule.record_success(),
            RunOutcome::Failed { .. } => {
                if schedule.record_failure() {
                    warn!(
                        %schedule_id,
                        failures = schedule.consecutive_failures,
                        "Schedule auto-disabled after consecutive failures"
                    );
                    metrics::record_schedule_auto_disabled();
                }
            }
            RunOutcome::Interrupted { .. } => return,
        }

        if let Err(e) = self.schedules.update(&schedule).await {
            error!(%schedule_id, error = %e, "Failed to persist schedule outcome");
        }
    }
}
