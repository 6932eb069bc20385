// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use super::helpers::{equipment_html, selectors, ScriptedDriver, TestApp};
use visitrs::application::use_cases::dispatch_run::{RunOutcome, RunRequest, RunTarget};
use visitrs::domain::models::batch_job::BatchStatus;
use visitrs::domain::models::history::RunTrigger;
use visitrs::domain::models::status::SnapshotStatus;
use visitrs::domain::models::work_unit::UnitStatus;
use visitrs::domain::repositories::batch_repository::BatchRepository;
use visitrs::domain::repositories::history_repository::HistoryRepository;
use visitrs::domain::repositories::work_unit_repository::WorkUnitRepository;
use visitrs::utils::errors::AutomationError;

const OWNER: &str = "tech-42";

fn manual(owner_id: &str, target: RunTarget) -> RunRequest {
    RunRequest {
        owner_id: owner_id.to_string(),
        trigger: RunTrigger::Manual,
        schedule_id: None,
        target,
    }
}

fn portal_with(refs: &[&str]) -> ScriptedDriver {
    refs.iter()
        .fold(ScriptedDriver::new(selectors()).with_list(refs), |driver, r| {
            driver.with_page(r, equipment_html(&[&["Regular", "Diesel"]]))
        })
}

/// 测试完整运行：发现工单、处理批次、写入历史
#[tokio::test]
async fn test_discover_run_processes_work_orders_and_records_history() {
    let app = TestApp::new(portal_with(&["11001", "11002"])).await;
    app.store_credential(OWNER, "hunter2").await;

    let run = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    let run_id = run.run_id;
    let outcome = run.handle.await.unwrap();

    assert_eq!(outcome, RunOutcome::Succeeded { completed_units: 2 });

    let snapshot = app.dispatcher.registry().snapshot(run_id);
    assert_eq!(snapshot.status, SnapshotStatus::Completed);
    assert_eq!(snapshot.progress, 100.0);

    let ctx = app.dispatcher.registry().get(run_id).unwrap();
    let batch_id = ctx.batch_id().unwrap();
    let batch = app.batches.find_by_id(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.owner_id, OWNER);

    let history = app.history.list_recent(OWNER, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
    assert_eq!(history[0].item_count, 2);
    assert_eq!(history[0].batch_id, Some(batch_id));
    assert_eq!(history[0].trigger, RunTrigger::Manual);

    assert_eq!(app.driver.log().closed, 1);
    assert!(!app.dispatcher.in_flight().is_in_flight(OWNER));
}

/// 测试同一用户同一时间只能有一个运行
#[tokio::test]
async fn test_second_dispatch_for_busy_owner_is_rejected() {
    let app = TestApp::new(portal_with(&["12001"])).await;
    app.store_credential(OWNER, "hunter2").await;

    let first = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: false }))
        .unwrap();
    let second = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: false }));
    assert!(matches!(second, Err(AutomationError::OwnerBusy(_))));

    let other = app
        .dispatcher
        .dispatch(manual("another-tech", RunTarget::Discover { submit: false }))
        .unwrap();

    assert!(first.handle.await.unwrap().is_success());
    // no credential for the other owner
    assert!(!other.handle.await.unwrap().is_success());

    let third = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: false }))
        .unwrap();
    third.handle.await.unwrap();
}

/// 测试缺少凭证时运行失败并写入失败历史
#[tokio::test]
async fn test_missing_credential_fails_run() {
    let app = TestApp::new(portal_with(&["13001"])).await;

    let run = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: false }))
        .unwrap();
    let outcome = run.handle.await.unwrap();

    match outcome {
        RunOutcome::Failed { error } => assert!(error.contains("Authentication")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(app.sessions.opened(), 0);

    let last = app.history.last_run(OWNER).await.unwrap().unwrap();
    assert!(!last.success);
    assert_eq!(last.item_count, 0);
    assert!(last.batch_id.is_none());
    assert!(last.error_message.is_some());

    let snapshot = app.dispatcher.registry().snapshot(run.run_id);
    assert_eq!(snapshot.status, SnapshotStatus::Failed);
    assert!(snapshot.error.is_some());
}

/// 测试门户拒绝登录时运行失败
#[tokio::test]
async fn test_rejected_login_fails_run() {
    let app = TestApp::new(portal_with(&["14001"])).await;
    app.store_credential(OWNER, "wrong").await;

    let run = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: false }))
        .unwrap();
    let outcome = run.handle.await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert_eq!(app.sessions.opened(), 1);
    assert!(app.driver.log().navigations.is_empty());
}

/// 测试已完成的工单不会被重复发现
#[tokio::test]
async fn test_completed_work_orders_are_not_rediscovered() {
    let app = TestApp::new(portal_with(&["15001", "15002"])).await;
    app.store_credential(OWNER, "hunter2").await;

    let first = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    assert_eq!(
        first.handle.await.unwrap(),
        RunOutcome::Succeeded { completed_units: 2 }
    );

    let second = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    assert_eq!(
        second.handle.await.unwrap(),
        RunOutcome::Succeeded { completed_units: 0 }
    );
    assert_eq!(app.driver.navigations_to("15001"), 1);
    assert_eq!(app.driver.navigations_to("15002"), 1);

    let units = app.units.find_by_status(UnitStatus::Completed).await.unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(app.history.list_recent(OWNER, 10).await.unwrap().len(), 2);
}

/// 测试失败的工单不会被自动重新发现，显式重试后才会再次处理
#[tokio::test]
async fn test_failed_work_orders_wait_for_explicit_retry() {
    let app = TestApp::new(portal_with(&["17001", "17002"])).await;
    app.store_credential(OWNER, "hunter2").await;
    app.driver.fail_navigation_to("17002");

    let first = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    assert!(matches!(first.handle.await.unwrap(), RunOutcome::Failed { .. }));
    let failed = app.units.find_by_status(UnitStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    let failed_id = failed[0].id;

    app.driver.heal();
    let attempts = app.driver.navigations_to("17002");
    let second = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    assert_eq!(
        second.handle.await.unwrap(),
        RunOutcome::Succeeded { completed_units: 0 }
    );
    assert_eq!(app.driver.navigations_to("17002"), attempts);
    let unit = app.units.find_by_id(failed_id).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Failed);

    let retried = app.orchestrator.retry_unit(failed_id).await.unwrap();
    assert_eq!(retried.status, UnitStatus::Pending);
    let third = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    assert_eq!(
        third.handle.await.unwrap(),
        RunOutcome::Succeeded { completed_units: 1 }
    );
    assert_eq!(app.driver.navigations_to("17002"), attempts + 1);
    let unit = app.units.find_by_id(failed_id).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Completed);
}

/// 测试恢复运行：失败的批次通过派发器从断点继续
#[tokio::test]
async fn test_resume_target_continues_failed_batch() {
    let app = TestApp::new(portal_with(&["16001", "16002"])).await;
    app.store_credential(OWNER, "hunter2").await;
    app.driver.fail_navigation_to("16002");

    let run = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    let run_id = run.run_id;
    let outcome = run.handle.await.unwrap();
    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    let batch_id = app
        .dispatcher
        .registry()
        .get(run_id)
        .and_then(|ctx| ctx.batch_id())
        .unwrap();

    app.driver.heal();
    let err = app
        .dispatcher
        .dispatch(manual("intruder", RunTarget::Resume { batch_id }))
        .unwrap()
        .handle
        .await
        .unwrap();
    assert!(matches!(err, RunOutcome::Failed { .. }));

    let resumed = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Resume { batch_id }))
        .unwrap();
    assert_eq!(
        resumed.handle.await.unwrap(),
        RunOutcome::Succeeded { completed_units: 1 }
    );
    assert_eq!(app.driver.navigations_to("16001"), 1);

    let batch = app.batches.find_by_id(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
}

/// 测试超出运行时长上限时运行失败，批次与进行中的单元被标记失败
#[tokio::test]
async fn test_run_exceeding_wall_clock_limit_fails_batch() {
    // the equipment panel never shows up, so the first unit outlives the limit
    let driver = portal_with(&["18001", "18002"]).with_panel_after(Duration::from_secs(3600));
    let app = TestApp::with_run_limit(driver, Duration::from_secs(1)).await;
    app.store_credential(OWNER, "hunter2").await;

    let run = app
        .dispatcher
        .dispatch(manual(OWNER, RunTarget::Discover { submit: true }))
        .unwrap();
    let run_id = run.run_id;
    let outcome = run.handle.await.unwrap();

    match &outcome {
        RunOutcome::Failed { error } => assert!(error.contains("wall-clock limit of 1s"), "{}", error),
        other => panic!("expected timeout failure, got {:?}", other),
    }

    let snapshot = app.dispatcher.registry().snapshot(run_id);
    assert_eq!(snapshot.status, SnapshotStatus::Failed);
    assert!(snapshot.error.unwrap().contains("wall-clock"));

    let batch_id = app
        .dispatcher
        .registry()
        .get(run_id)
        .and_then(|ctx| ctx.batch_id())
        .unwrap();
    let batch = app.batches.find_by_id(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);
    assert!(batch.completed_unit_ids.is_empty());

    let failed = app.units.find_by_status(UnitStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].external_ref, "18001");
    assert!(app.units.find_by_status(UnitStatus::Running).await.unwrap().is_empty());
    assert_eq!(app.driver.navigations_to("18002"), 0);

    let history = app.history.list_recent(OWNER, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
}
