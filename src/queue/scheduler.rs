// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace};

use crate::application::use_cases::dispatch_run::{
    DispatchedRun, RunDispatcher, RunRequest, RunTarget,
};
use crate::domain::models::history::RunTrigger;
use crate::domain::models::schedule::Eligibility;
use crate::domain::repositories::schedule_repository::ScheduleRepository;

/// 调度周期允许范围（秒）
pub const TICK_INTERVAL_RANGE_SECS: (u64, u64) = (30, 60);

/// 调度守护进程
///
/// 周期性评估已启用的调度，将符合条件的调度交给运行派发器。
/// 派发本身不等待运行结束，失败计数由运行任务在结束时更新。
pub struct SchedulerDaemon {
    schedules: Arc<dyn ScheduleRepository>,
    dispatcher: Arc<RunDispatcher>,
    tick_interval: Duration,
    retention: Duration,
}

impl SchedulerDaemon {
    /// 创建调度守护进程
    ///
    /// # 参数
    ///
    /// * `schedules` - 调度仓库
    /// * `dispatcher` - 运行派发器
    /// * `tick_interval_secs` - 调度周期，限制在30-60秒
    /// * `retention` - 已结束运行在注册表中的保留时间
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        dispatcher: Arc<RunDispatcher>,
        tick_interval_secs: u64,
        retention: Duration,
    ) -> Self {
        let (min, max) = TICK_INTERVAL_RANGE_SECS;
        Self {
            schedules,
            dispatcher,
            tick_interval: Duration::from_secs(tick_interval_secs.clamp(min, max)),
            retention,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// 启动调度器后台任务
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = self.tick_interval.as_secs(), "Scheduler daemon started");

            loop {
                ticker.tick().await;
                let dispatched = self.tick(Utc::now()).await;
                if !dispatched.is_empty() {
                    info!("Dispatched {} scheduled runs", dispatched.len());
                }
            }
        })
    }

    /// 执行一次调度评估
    ///
    /// # 参数
    ///
    /// * `now` - 评估时刻
    ///
    /// # 返回值
    ///
    /// 本次派发的运行，句柄可用于等待运行结束
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<DispatchedRun> {
        let schedules = match self.schedules.find_enabled().await {
            Ok(schedules) => schedules,
            Err(e) => {
                error!("Failed to load schedules: {}", e);
                return Vec::new();
            }
        };

        let in_flight = self.dispatcher.in_flight();
        let mut dispatched = Vec::new();

        for schedule in schedules {
            let eligibility = schedule.eligibility(now, in_flight.is_in_flight(&schedule.owner_id));
            if eligibility != Eligibility::Eligible {
                trace!(schedule_id = %schedule.id, ?eligibility, "Schedule not eligible");
                continue;
            }

            let Some(guard) = in_flight.try_acquire(&schedule.owner_id) else {
                debug!(schedule_id = %schedule.id, "Owner became busy, skipping");
                continue;
            };

            // Reload under the guard so a just-finished run's outcome is not overwritten.
            let mut schedule = match self.schedules.find_by_id(schedule.id).await {
                Ok(Some(fresh)) if fresh.enabled => fresh,
                Ok(_) => continue,
                Err(e) => {
                    error!(schedule_id = %schedule.id, "Failed to reload schedule: {}", e);
                    continue;
                }
            };

            schedule.mark_dispatched(now);
            if let Err(e) = self.schedules.update(&schedule).await {
                error!(schedule_id = %schedule.id, "Failed to persist dispatch time: {}", e);
                continue;
            }

            let run = self.dispatcher.dispatch_guarded(
                guard,
                RunRequest {
                    owner_id: schedule.owner_id.clone(),
                    trigger: RunTrigger::Scheduled,
                    schedule_id: Some(schedule.id),
                    target: RunTarget::Discover { submit: false },
                },
            );
            debug!(schedule_id = %schedule.id, run_id = %run.run_id, "Scheduled run dispatched");
            dispatched.push(run);
        }

        let pruned = self.dispatcher.registry().prune_finished(self.retention);
        if pruned > 0 {
            debug!("Pruned {} finished runs from registry", pruned);
        }
        if dispatched.is_empty() {
            trace!("Scheduler tick dispatched nothing");
        }
        dispatched
    }
}
