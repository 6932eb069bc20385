// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::batch_job::{BatchJob, BatchOptions, BatchStatus};
use crate::domain::models::status::SnapshotStatus;
use crate::domain::models::work_unit::{UnitStatus, WorkUnit};
use crate::domain::repositories::batch_repository::BatchRepository;
use crate::domain::repositories::work_unit_repository::WorkUnitRepository;
use crate::engines::traits::BrowserDriver;
use crate::infrastructure::observability::metrics;
use crate::infrastructure::state::run_registry::RunContext;
use crate::utils::errors::AutomationError;
use crate::workers::unit_engine::{UnitEnd, UnitEngine};

/// 批次单次遍历的结果
#[derive(Debug)]
pub struct BatchReport {
    /// 遍历结束时的批次（Completed、Failed、Paused 或 Cancelled）
    pub batch: BatchJob,
    /// 本次遍历中完成的单元数
    pub completed_this_run: u32,
    /// 本次遍历中失败的单元数
    pub failed_this_run: u32,
    /// 终止整个批次的错误（例如登录失效）
    pub fatal: Option<AutomationError>,
}

/// 批处理编排器
///
/// 严格按顺序驱动批次中的单元，每完成一个单元即持久化检查点
pub struct BatchOrchestrator {
    units: Arc<dyn WorkUnitRepository>,
    batches: Arc<dyn BatchRepository>,
    engine: Arc<UnitEngine>,
}

impl BatchOrchestrator {
    pub fn new(
        units: Arc<dyn WorkUnitRepository>,
        batches: Arc<dyn BatchRepository>,
        engine: Arc<UnitEngine>,
    ) -> Self {
        Self {
            units,
            batches,
            engine,
        }
    }

    /// 从来源单元集合创建批次
    ///
    /// # 参数
    ///
    /// * `owner_id` - 用户ID
    /// * `source` - 来源单元ID，决定处理顺序
    /// * `selection` - 可选的显式子集，必须全部属于来源集合
    /// * `options` - 批次选项
    ///
    /// # 返回值
    ///
    /// * `Ok(BatchJob)` - 已持久化的批次
    /// * `Err(AutomationError::Validation)` - 子集中存在未知ID，或单元不存在、不属于该用户
    pub async fn create_batch(
        &self,
        owner_id: &str,
        source: &[Uuid],
        selection: Option<&[Uuid]>,
        options: BatchOptions,
    ) -> Result<BatchJob, AutomationError> {
        let unit_ids: Vec<Uuid> = match selection {
            Some(selected) => {
                let known: HashSet<&Uuid> = source.iter().collect();
                let unknown: Vec<String> = selected
                    .iter()
                    .filter(|id| !known.contains(id))
                    .map(|id| id.to_string())
                    .collect();
                if !unknown.is_empty() {
                    return Err(AutomationError::Validation(format!(
                        "unknown unit ids in selection: {}",
                        unknown.join(", ")
                    )));
                }
                let wanted: HashSet<&Uuid> = selected.iter().collect();
                source.iter().filter(|id| wanted.contains(id)).copied().collect()
            }
            None => source.to_vec(),
        };

        if unit_ids.is_empty() {
            return Err(AutomationError::Validation("batch has no units".to_string()));
        }

        let units = self.units.find_by_ids(&unit_ids).await?;
        let found: HashSet<Uuid> = units.iter().map(|u| u.id).collect();
        let missing: Vec<String> = unit_ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AutomationError::Validation(format!(
                "unknown unit ids: {}",
                missing.join(", ")
            )));
        }
        let foreign: Vec<String> = units
            .iter()
            .filter(|u| u.owner_id != owner_id)
            .map(|u| u.id.to_string())
            .collect();
        if !foreign.is_empty() {
            return Err(AutomationError::Validation(format!(
                "units not owned by {}: {}",
                owner_id,
                foreign.join(", ")
            )));
        }

        let batch = self
            .batches
            .create(&BatchJob::new(owner_id, unit_ids, options))
            .await?;

        for mut unit in units {
            unit.batch_id = Some(batch.id);
            self.units.update(&unit).await?;
        }

        info!(batch_id = %batch.id, owner_id, units = batch.total_count(), "Created batch");
        Ok(batch)
    }

    /// 执行或恢复批次
    ///
    /// Pending 批次从头开始，可恢复的 Failed/Paused 批次从第一个未完成单元继续。
    /// 暂停与取消标记在单元之间检查，尚无单元完成时的暂停按取消处理。
    ///
    /// # 参数
    ///
    /// * `driver` - 当前会话的浏览器驱动
    /// * `batch_id` - 批次ID
    /// * `ctx` - 运行上下文
    ///
    /// # 返回值
    ///
    /// * `Ok(BatchReport)` - 遍历结束，包含最终批次状态
    /// * `Err(AutomationError)` - 批次不存在、不可恢复或持久化失败
    #[instrument(skip(self, driver, ctx), fields(run_id = %ctx.id(), owner_id = %ctx.owner_id(), trigger = %ctx.trigger()))]
    pub async fn run(
        &self,
        driver: &dyn BrowserDriver,
        batch_id: Uuid,
        ctx: &RunContext,
    ) -> Result<BatchReport, AutomationError> {
        let batch = self.load_batch(batch_id).await?;
        let mut batch = match batch.status {
            BatchStatus::Pending => batch.start()?,
            BatchStatus::Failed | BatchStatus::Paused if batch.is_resumable() => {
                info!(
                    completed = batch.completed_count(),
                    total = batch.total_count(),
                    "Resuming batch from checkpoint"
                );
                batch.resume()?
            }
            _ => return Err(AutomationError::NotResumable(batch_id.to_string())),
        };
        self.batches.update(&batch).await?;
        ctx.attach_batch(batch.id, batch.total_count(), batch.completed_count());
        ctx.set_phase(SnapshotStatus::Running, "processing batch");

        let mut completed_this_run = 0u32;
        let mut failed_this_run = 0u32;

        for unit_id in batch.remaining_unit_ids() {
            if ctx.is_cancel_requested() {
                return self
                    .cancel_remaining(batch, completed_this_run, failed_this_run, "cancelled by request")
                    .await;
            }
            if ctx.is_pause_requested() {
                // a paused batch with nothing completed could never be resumed
                if batch.completed_count() == 0 {
                    info!("Pause requested before any unit completed, cancelling batch");
                    return self
                        .cancel_remaining(
                            batch,
                            completed_this_run,
                            failed_this_run,
                            "paused before any unit completed",
                        )
                        .await;
                }
                let batch = self.batches.update(&batch.pause()?).await?;
                info!(completed = batch.completed_count(), "Batch paused");
                return Ok(BatchReport {
                    batch,
                    completed_this_run,
                    failed_this_run,
                    fatal: None,
                });
            }

            let Some(unit) = self.prepare_unit(unit_id, &mut batch).await? else {
                continue;
            };
            let mut unit = self.units.update(&unit.start()?).await?;

            let end = self
                .engine
                .run(driver, &mut unit, batch.options.submit, ctx)
                .await;

            match end {
                UnitEnd::Completed => {
                    let unit = self.units.update(&unit.complete()?).await?;
                    batch.mark_unit_completed(unit.id);
                    batch = self.batches.update(&batch).await?;
                    ctx.record_unit_finished(&unit);
                    metrics::record_unit_completed();
                    completed_this_run += 1;
                }
                UnitEnd::Cancelled => {
                    let unit = self.units.update(&unit.cancel()?).await?;
                    ctx.record_unit_finished(&unit);
                    return self
                        .cancel_remaining(batch, completed_this_run, failed_this_run, "cancelled by request")
                        .await;
                }
                UnitEnd::Failed(err) => {
                    let unit = self.units.update(&unit.fail(err.to_string())?).await?;
                    ctx.record_unit_finished(&unit);
                    metrics::record_unit_failed();
                    failed_this_run += 1;

                    if err.is_fatal_to_run() {
                        error!(unit_id = %unit.id, error = %err, "Fatal unit error, aborting batch");
                        let batch = self.batches.update(&batch.fail(err.to_string())?).await?;
                        return Ok(BatchReport {
                            batch,
                            completed_this_run,
                            failed_this_run,
                            fatal: Some(err),
                        });
                    }
                    if batch.options.stop_on_first_failure {
                        warn!(unit_id = %unit.id, "Stopping batch on first failure");
                        let message = format!("stopped after unit {} failed: {}", unit.external_ref, err);
                        let batch = self.batches.update(&batch.fail(message)?).await?;
                        return Ok(BatchReport {
                            batch,
                            completed_this_run,
                            failed_this_run,
                            fatal: None,
                        });
                    }
                }
            }
        }

        let batch = self
            .batches
            .update(&batch.finish(failed_this_run as usize)?)
            .await?;
        info!(
            status = %batch.status,
            completed = batch.completed_count(),
            total = batch.total_count(),
            "Batch pass finished"
        );
        Ok(BatchReport {
            batch,
            completed_this_run,
            failed_this_run,
            fatal: None,
        })
    }

    /// 将失败单元重置为待处理
    ///
    /// # 返回值
    ///
    /// 单元不存在时返回 `NotFound`，不是 Failed 状态时返回内部状态转换错误
    pub async fn retry_unit(&self, unit_id: Uuid) -> Result<WorkUnit, AutomationError> {
        let unit = self
            .units
            .find_by_id(unit_id)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("unit {}", unit_id)))?;
        let unit = self.units.update(&unit.retry()?).await?;
        info!(unit_id = %unit.id, "Unit reset for retry");
        Ok(unit)
    }

    /// 启动时恢复被中断的运行
    ///
    /// 仍处于 Running 的批次与单元标记为失败，使其可以被恢复
    ///
    /// # 返回值
    ///
    /// 恢复的批次数
    pub async fn recover_interrupted(&self) -> Result<usize, AutomationError> {
        const REASON: &str = "interrupted by process restart";

        for unit in self.units.find_by_status(UnitStatus::Running).await? {
            let unit_id = unit.id;
            self.units.update(&unit.fail(REASON)?).await?;
            warn!(unit_id = %unit_id, "Marked interrupted unit as failed");
        }

        let batches = self.batches.find_by_status(BatchStatus::Running).await?;
        let count = batches.len();
        for batch in batches {
            let batch_id = batch.id;
            self.batches.update(&batch.fail(REASON)?).await?;
            warn!(batch_id = %batch_id, "Marked interrupted batch as failed");
        }
        Ok(count)
    }

    /// 强制将批次及其运行中的单元标记为失败
    ///
    /// 用于运行超时或运行任务异常退出，已处于终止状态的记录保持不变
    pub async fn force_fail(&self, batch_id: Uuid, reason: &str) -> Result<(), AutomationError> {
        let Some(batch) = self.batches.find_by_id(batch_id).await? else {
            return Ok(());
        };

        for unit in self.units.find_by_ids(&batch.unit_ids).await? {
            if unit.status == UnitStatus::Running {
                self.units.update(&unit.fail(reason)?).await?;
            }
        }

        if matches!(batch.status, BatchStatus::Running | BatchStatus::Paused) {
            self.batches.update(&batch.fail(reason)?).await?;
            warn!(batch_id = %batch_id, reason, "Batch force-failed");
        }
        Ok(())
    }

    pub async fn find_batch(&self, batch_id: Uuid) -> Result<Option<BatchJob>, AutomationError> {
        Ok(self.batches.find_by_id(batch_id).await?)
    }

    async fn load_batch(&self, batch_id: Uuid) -> Result<BatchJob, AutomationError> {
        self.batches
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("batch {}", batch_id)))
    }

    /// 取出待执行的单元并规整为 Pending
    ///
    /// 已完成但未进检查点的单元补记检查点后返回 `None`
    async fn prepare_unit(
        &self,
        unit_id: Uuid,
        batch: &mut BatchJob,
    ) -> Result<Option<WorkUnit>, AutomationError> {
        let unit = self
            .units
            .find_by_id(unit_id)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("unit {}", unit_id)))?;

        let unit = match unit.status {
            UnitStatus::Pending => unit,
            UnitStatus::Failed => self.units.update(&unit.retry()?).await?,
            UnitStatus::Running => {
                let unit = self.units.update(&unit.fail("interrupted")?).await?;
                self.units.update(&unit.retry()?).await?
            }
            UnitStatus::Completed => {
                batch.mark_unit_completed(unit.id);
                *batch = self.batches.update(batch).await?;
                return Ok(None);
            }
            UnitStatus::Cancelled => {
                warn!(unit_id = %unit.id, "Skipping cancelled unit");
                return Ok(None);
            }
        };
        Ok(Some(unit))
    }

    async fn cancel_remaining(
        &self,
        batch: BatchJob,
        completed_this_run: u32,
        failed_this_run: u32,
        reason: &str,
    ) -> Result<BatchReport, AutomationError> {
        for unit in self.units.find_by_ids(&batch.remaining_unit_ids()).await? {
            if unit.status == UnitStatus::Pending {
                self.units.update(&unit.cancel()?).await?;
            }
        }
        let batch = self.batches.update(&batch.cancel(reason)?).await?;
        info!(batch_id = %batch.id, completed = batch.completed_count(), "Batch cancelled");
        Ok(BatchReport {
            batch,
            completed_this_run,
            failed_this_run,
            fatal: None,
        })
    }
}
