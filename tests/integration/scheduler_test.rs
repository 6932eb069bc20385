// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::time::Duration;

use super::helpers::{equipment_html, selectors, ScriptedDriver, TestApp};
use visitrs::application::use_cases::dispatch_run::{RunOutcome, RunRequest, RunTarget};
use visitrs::domain::models::history::RunTrigger;
use visitrs::domain::models::schedule::{ActiveHours, Schedule, FAILURE_THRESHOLD};
use visitrs::domain::repositories::history_repository::HistoryRepository;
use visitrs::domain::repositories::schedule_repository::ScheduleRepository;
use visitrs::queue::scheduler::SchedulerDaemon;

const OWNER: &str = "night-shift";

fn daemon(app: &TestApp) -> SchedulerDaemon {
    SchedulerDaemon::new(
        app.schedules.clone(),
        app.dispatcher.clone(),
        30,
        Duration::from_secs(3600),
    )
}

async fn create_schedule(app: &TestApp, interval_minutes: u32, window: Option<ActiveHours>) -> Schedule {
    let schedule = Schedule::new(OWNER, interval_minutes, window, 0).unwrap();
    app.schedules.create(&schedule).await.unwrap()
}

fn tomorrow_at(hour: u32, minute: u32) -> DateTime<Utc> {
    (Utc::now() + ChronoDuration::days(1))
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_utc()
}

/// 测试到期调度被派发，运行后更新下次运行时间并写入历史
#[tokio::test]
async fn test_tick_dispatches_due_schedule() {
    let app = TestApp::new(ScriptedDriver::new(selectors()).with_list(&[])).await;
    app.store_credential(OWNER, "hunter2").await;
    let schedule = create_schedule(&app, 60, None).await;
    let scheduler = daemon(&app);

    let now = Utc::now();
    let runs = scheduler.tick(now).await;
    assert_eq!(runs.len(), 1);
    for run in runs {
        assert_eq!(
            run.handle.await.unwrap(),
            RunOutcome::Succeeded { completed_units: 0 }
        );
    }

    let stored = app.schedules.find_by_id(schedule.id).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 0);
    assert!(stored.enabled);
    assert_eq!(
        stored.next_run.with_timezone(&Utc).timestamp(),
        (now + ChronoDuration::minutes(60)).timestamp()
    );

    let history = app.history.list_recent(OWNER, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].trigger, RunTrigger::Scheduled);
    assert_eq!(history[0].schedule_id, Some(schedule.id));
    assert!(history[0].success);

    // not due again until the interval has passed
    assert!(scheduler.tick(now + ChronoDuration::minutes(30)).await.is_empty());
}

/// 测试连续5次失败后调度自动禁用
#[tokio::test]
async fn test_schedule_auto_disables_after_consecutive_failures() {
    let app = TestApp::new(ScriptedDriver::new(selectors()).with_list(&[])).await;
    let schedule = create_schedule(&app, 15, None).await;
    let scheduler = daemon(&app);

    let mut now = Utc::now();
    for attempt in 1..=FAILURE_THRESHOLD {
        let runs = scheduler.tick(now).await;
        assert_eq!(runs.len(), 1, "attempt {} should dispatch", attempt);
        for run in runs {
            assert!(matches!(run.handle.await.unwrap(), RunOutcome::Failed { .. }));
        }
        let stored = app.schedules.find_by_id(schedule.id).await.unwrap().unwrap();
        assert_eq!(stored.consecutive_failures, attempt);
        assert_eq!(stored.enabled, attempt < FAILURE_THRESHOLD);
        now += ChronoDuration::minutes(16);
    }

    assert!(scheduler.tick(now).await.is_empty());
    let history = app.history.list_recent(OWNER, 50).await.unwrap();
    assert_eq!(history.len(), FAILURE_THRESHOLD as usize);
    assert!(history.iter().all(|h| !h.success));
}

/// 测试一次成功运行清零连续失败计数
#[tokio::test]
async fn test_success_resets_failure_count() {
    let app = TestApp::new(ScriptedDriver::new(selectors()).with_list(&[])).await;
    let schedule = create_schedule(&app, 15, None).await;
    let scheduler = daemon(&app);

    let mut now = Utc::now();
    for _ in 0..FAILURE_THRESHOLD - 1 {
        for run in scheduler.tick(now).await {
            run.handle.await.unwrap();
        }
        now += ChronoDuration::minutes(16);
    }
    let stored = app.schedules.find_by_id(schedule.id).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, FAILURE_THRESHOLD - 1);

    app.store_credential(OWNER, "hunter2").await;
    for run in scheduler.tick(now).await {
        assert!(run.handle.await.unwrap().is_success());
    }

    let stored = app.schedules.find_by_id(schedule.id).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 0);
    assert!(stored.enabled);
}

/// 测试活跃窗口之外不派发
#[tokio::test]
async fn test_schedule_outside_active_hours_is_skipped() {
    let app = TestApp::new(ScriptedDriver::new(selectors()).with_list(&[])).await;
    app.store_credential(OWNER, "hunter2").await;
    let window = ActiveHours::new(
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    );
    let schedule = create_schedule(&app, 30, Some(window)).await;
    let scheduler = daemon(&app);

    assert!(scheduler.tick(tomorrow_at(18, 0)).await.is_empty());
    let stored = app.schedules.find_by_id(schedule.id).await.unwrap().unwrap();
    assert!(stored.last_run.is_none());

    let runs = scheduler.tick(tomorrow_at(9, 0)).await;
    assert_eq!(runs.len(), 1);
    for run in runs {
        run.handle.await.unwrap();
    }
}

/// 测试用户已有运行时调度被跳过且不推迟下次运行
#[tokio::test]
async fn test_busy_owner_is_skipped() {
    let driver = ScriptedDriver::new(selectors())
        .with_list(&["17001"])
        .with_page("17001", equipment_html(&[&["Regular"]]));
    let app = TestApp::new(driver).await;
    app.store_credential(OWNER, "hunter2").await;
    let schedule = create_schedule(&app, 30, None).await;
    let scheduler = daemon(&app);

    let manual = app
        .dispatcher
        .dispatch(RunRequest {
            owner_id: OWNER.to_string(),
            trigger: RunTrigger::Manual,
            schedule_id: None,
            target: RunTarget::Discover { submit: false },
        })
        .unwrap();

    assert!(scheduler.tick(Utc::now()).await.is_empty());
    manual.handle.await.unwrap();

    let stored = app.schedules.find_by_id(schedule.id).await.unwrap().unwrap();
    assert!(stored.last_run.is_none());
    assert_eq!(scheduler.tick(Utc::now()).await.len(), 1);
}

/// 测试禁用的调度不派发，重新启用后立即到期
#[tokio::test]
async fn test_disabled_schedule_is_not_dispatched() {
    let app = TestApp::new(ScriptedDriver::new(selectors()).with_list(&[])).await;
    app.store_credential(OWNER, "hunter2").await;
    let mut schedule = create_schedule(&app, 30, None).await;
    schedule.disable();
    app.schedules.update(&schedule).await.unwrap();
    let scheduler = daemon(&app);

    assert!(scheduler.tick(Utc::now()).await.is_empty());

    schedule.enable(Utc::now());
    app.schedules.update(&schedule).await.unwrap();
    let runs = scheduler.tick(Utc::now()).await;
    assert_eq!(runs.len(), 1);
    for run in runs {
        run.handle.await.unwrap();
    }
}

/// 测试调度周期被限制在30-60秒
#[tokio::test]
async fn test_tick_interval_is_clamped() {
    let app = TestApp::new(ScriptedDriver::new(selectors())).await;
    let fast = SchedulerDaemon::new(app.schedules.clone(), app.dispatcher.clone(), 1, Duration::ZERO);
    let slow = SchedulerDaemon::new(app.schedules.clone(), app.dispatcher.clone(), 600, Duration::ZERO);
    assert_eq!(fast.tick_interval(), Duration::from_secs(30));
    assert_eq!(slow.tick_interval(), Duration::from_secs(60));
}
