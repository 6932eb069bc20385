// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::helpers::{equipment_html, locator, selectors, ScriptedDriver, TestApp};
use visitrs::domain::models::batch_job::{BatchOptions, BatchStatus};
use visitrs::domain::models::history::RunTrigger;
use visitrs::domain::models::work_unit::UnitStatus;
use visitrs::domain::repositories::batch_repository::BatchRepository;
use visitrs::domain::repositories::work_unit_repository::WorkUnitRepository;
use visitrs::infrastructure::state::run_registry::RunRegistry;
use visitrs::utils::errors::AutomationError;

const OWNER: &str = "tech-17";

fn regular_portal(refs: &[&str]) -> ScriptedDriver {
    refs.iter().fold(ScriptedDriver::new(selectors()), |driver, r| {
        driver.with_page(r, equipment_html(&[&["Regular Unleaded"]]))
    })
}

fn options(stop_on_first_failure: bool, submit: bool) -> BatchOptions {
    BatchOptions {
        stop_on_first_failure,
        submit,
    }
}

/// 测试批次按顺序处理单元并填写配件数量
#[tokio::test]
async fn test_batch_processes_units_in_order_and_fills_parts() {
    let driver = ScriptedDriver::new(selectors())
        .with_page("10001", equipment_html(&[&["Regular", "Clear Diesel"]]))
        .with_page("10002", equipment_html(&[&["Premium", "Super"]]));
    let app = TestApp::new(driver).await;
    let ids: Vec<Uuid> = app
        .seed_units(OWNER, &["10001", "10002"])
        .await
        .iter()
        .map(|u| u.id)
        .collect();

    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap();
    let registry = RunRegistry::new();
    let ctx = registry.register(OWNER, RunTrigger::Manual);

    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    assert_eq!(report.batch.status, BatchStatus::Completed);
    assert_eq!(report.completed_this_run, 2);
    assert_eq!(report.failed_this_run, 0);

    let sel = selectors();
    let log = app.driver.log();
    assert_eq!(log.navigations, vec![locator("10001"), locator("10002")]);
    assert_eq!(
        log.fills,
        vec![
            (sel.gas_quantity_input.clone(), "1".to_string()),
            (sel.diesel_quantity_input.clone(), "1".to_string()),
            (sel.gas_quantity_input.clone(), "1".to_string()),
        ]
    );
    assert_eq!(
        log.clicks.iter().filter(|c| **c == sel.submit_button).count(),
        2
    );

    let first = app.units.find_by_id(ids[0]).await.unwrap().unwrap();
    assert_eq!(first.status, UnitStatus::Completed);
    assert_eq!(first.progress, 100);
    assert_eq!(first.batch_id, Some(batch.id));
    let extracted = first.extracted.unwrap();
    assert_eq!((extracted.gas_filters, extracted.diesel_filters), (1, 1));
}

/// 测试失败后恢复只处理未完成的单元
///
/// 5个单元中第3个失败并停止批次，恢复后只处理3、4、5
#[tokio::test]
async fn test_resume_processes_only_unfinished_units() {
    let refs = ["20001", "20002", "20003", "20004", "20005"];
    let app = TestApp::stopping_on_first_failure(regular_portal(&refs)).await;
    app.driver.fail_navigation_to("20003");
    let ids: Vec<Uuid> = app.seed_units(OWNER, &refs).await.iter().map(|u| u.id).collect();

    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(true, false))
        .await
        .unwrap();
    let registry = RunRegistry::new();

    let ctx = registry.register(OWNER, RunTrigger::Manual);
    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    assert_eq!(report.batch.status, BatchStatus::Failed);
    assert_eq!(report.batch.completed_unit_ids, vec![ids[0], ids[1]]);
    assert!(report.batch.is_resumable());
    assert!(report
        .batch
        .error_message
        .as_deref()
        .unwrap()
        .contains("20003"));
    assert_eq!(
        app.units.find_by_id(ids[2]).await.unwrap().unwrap().status,
        UnitStatus::Failed
    );
    assert_eq!(
        app.units.find_by_id(ids[3]).await.unwrap().unwrap().status,
        UnitStatus::Pending
    );

    app.driver.heal();
    app.driver.clear_log();

    let ctx = registry.register(OWNER, RunTrigger::Manual);
    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    assert_eq!(report.batch.status, BatchStatus::Completed);
    assert_eq!(report.completed_this_run, 3);
    assert_eq!(
        app.driver.log().navigations,
        vec![locator("20003"), locator("20004"), locator("20005")]
    );
    assert!(!app
        .driver
        .log()
        .clicks
        .contains(&selectors().submit_button));
}

/// 测试不停止时失败单元不影响后续单元
#[tokio::test]
async fn test_failed_unit_does_not_stop_batch_by_default() {
    let refs = ["30001", "30002", "30003"];
    let app = TestApp::new(regular_portal(&refs)).await;
    app.driver.fail_navigation_to("30002");
    let ids: Vec<Uuid> = app.seed_units(OWNER, &refs).await.iter().map(|u| u.id).collect();

    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap();
    let registry = RunRegistry::new();
    let ctx = registry.register(OWNER, RunTrigger::Manual);
    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    assert_eq!(report.batch.status, BatchStatus::Failed);
    assert_eq!(report.completed_this_run, 2);
    assert_eq!(report.failed_this_run, 1);
    assert!(report.fatal.is_none());
    assert_eq!(
        report.batch.error_message.as_deref(),
        Some("1 of 3 units failed")
    );

    let failed = app.units.find_by_id(ids[1]).await.unwrap().unwrap();
    assert_eq!(failed.status, UnitStatus::Failed);
    assert!(failed.error_message.unwrap().contains("Navigation"));
}

/// 测试会话失效是致命错误，剩余单元保持待处理
#[tokio::test]
async fn test_expired_session_aborts_batch() {
    let refs = ["40001", "40002", "40003"];
    let app = TestApp::new(regular_portal(&refs)).await;
    app.driver.expire_session_at("40002");
    let ids: Vec<Uuid> = app.seed_units(OWNER, &refs).await.iter().map(|u| u.id).collect();

    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap();
    let registry = RunRegistry::new();
    let ctx = registry.register(OWNER, RunTrigger::Manual);
    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    assert_eq!(report.batch.status, BatchStatus::Failed);
    assert!(matches!(report.fatal, Some(AutomationError::Authentication(_))));
    assert_eq!(
        app.units.find_by_id(ids[2]).await.unwrap().unwrap().status,
        UnitStatus::Pending
    );
    assert_eq!(app.driver.navigations_to("40003"), 0);
}

/// 测试显式选择的子集校验与顺序
#[tokio::test]
async fn test_selection_is_validated_and_keeps_source_order() {
    let refs = ["50001", "50002", "50003"];
    let app = TestApp::new(regular_portal(&refs)).await;
    let ids: Vec<Uuid> = app.seed_units(OWNER, &refs).await.iter().map(|u| u.id).collect();

    let unknown = Uuid::new_v4();
    let err = app
        .orchestrator
        .create_batch(OWNER, &ids, Some(&[ids[0], unknown]), options(false, true))
        .await
        .unwrap_err();
    match err {
        AutomationError::Validation(msg) => assert!(msg.contains(&unknown.to_string())),
        other => panic!("expected validation error, got {:?}", other),
    }

    let err = app
        .orchestrator
        .create_batch(OWNER, &ids, Some(&[]), options(false, true))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::Validation(_)));

    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, Some(&[ids[2], ids[0]]), options(false, true))
        .await
        .unwrap();
    assert_eq!(batch.unit_ids, vec![ids[0], ids[2]]);
    assert_eq!(batch.status, BatchStatus::Pending);
}

/// 测试不能把其他用户的单元放进批次
#[tokio::test]
async fn test_foreign_units_are_rejected() {
    let app = TestApp::new(regular_portal(&["60001"])).await;
    let ids: Vec<Uuid> = app
        .seed_units("someone-else", &["60001"])
        .await
        .iter()
        .map(|u| u.id)
        .collect();

    let err = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::Validation(_)));
}

/// 测试取消请求使剩余单元变为已取消
#[tokio::test]
async fn test_cancel_request_cancels_remaining_units() {
    let refs = ["70001", "70002"];
    let app = TestApp::new(regular_portal(&refs)).await;
    let ids: Vec<Uuid> = app.seed_units(OWNER, &refs).await.iter().map(|u| u.id).collect();
    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap();

    let registry = RunRegistry::new();
    let ctx = registry.register(OWNER, RunTrigger::Manual);
    ctx.request_cancel();
    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    assert_eq!(report.batch.status, BatchStatus::Cancelled);
    assert!(app.driver.log().navigations.is_empty());
    for id in ids {
        assert_eq!(
            app.units.find_by_id(id).await.unwrap().unwrap().status,
            UnitStatus::Cancelled
        );
    }
}

/// 测试第一个单元完成前暂停时批次被取消而不是停在不可恢复的暂停状态
#[tokio::test]
async fn test_pause_before_any_completion_cancels_batch() {
    let refs = ["75001", "75002"];
    let app = TestApp::new(regular_portal(&refs)).await;
    let ids: Vec<Uuid> = app.seed_units(OWNER, &refs).await.iter().map(|u| u.id).collect();
    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap();

    let registry = RunRegistry::new();
    let ctx = registry.register(OWNER, RunTrigger::Manual);
    ctx.request_pause();
    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    assert_eq!(report.batch.status, BatchStatus::Cancelled);
    assert_eq!(report.batch.completed_count(), 0);
    assert_eq!(
        report.batch.error_message.as_deref(),
        Some("paused before any unit completed")
    );
    assert!(app.driver.log().navigations.is_empty());

    let stored = app.batches.find_by_id(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BatchStatus::Cancelled);
    for id in ids {
        assert_eq!(
            app.units.find_by_id(id).await.unwrap().unwrap().status,
            UnitStatus::Cancelled
        );
    }
}

/// 测试暂停在单元边界生效且批次可以恢复
#[tokio::test]
async fn test_pause_takes_effect_between_units() {
    let refs = ["80001", "80002", "80003"];
    let app = TestApp::new(regular_portal(&refs)).await;
    let ids: Vec<Uuid> = app.seed_units(OWNER, &refs).await.iter().map(|u| u.id).collect();
    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, false))
        .await
        .unwrap();

    let registry = RunRegistry::new();
    let ctx = registry.register(OWNER, RunTrigger::Manual);
    let handle = {
        let orchestrator = app.orchestrator.clone();
        let driver = app.driver.clone();
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { orchestrator.run(driver.as_ref(), batch.id, &ctx).await })
    };

    while ctx.completed_units() < 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ctx.request_pause();

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.batch.status, BatchStatus::Paused);
    assert!(report.batch.completed_count() < 3);
    assert!(report.batch.is_resumable());

    let stored = app.batches.find_by_id(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BatchStatus::Paused);

    let ctx = registry.register(OWNER, RunTrigger::Manual);
    let report = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();
    assert_eq!(report.batch.status, BatchStatus::Completed);
    for r in refs {
        assert_eq!(app.driver.navigations_to(r), 1);
    }
}

/// 测试已完成的批次不能再次运行
#[tokio::test]
async fn test_completed_batch_is_not_resumable() {
    let app = TestApp::new(regular_portal(&["90001"])).await;
    let ids: Vec<Uuid> = app.seed_units(OWNER, &["90001"]).await.iter().map(|u| u.id).collect();
    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap();
    let registry = RunRegistry::new();

    let ctx = registry.register(OWNER, RunTrigger::Manual);
    app.orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap();

    let ctx = registry.register(OWNER, RunTrigger::Manual);
    let err = app
        .orchestrator
        .run(app.driver.as_ref(), batch.id, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::NotResumable(_)));
}

/// 测试失败单元的手动重试
#[tokio::test]
async fn test_retry_unit_resets_failed_unit_only() {
    let app = TestApp::new(ScriptedDriver::new(selectors())).await;
    let unit = app.seed_units(OWNER, &["91001"]).await.remove(0);

    let err = app.orchestrator.retry_unit(unit.id).await.unwrap_err();
    assert!(matches!(err, AutomationError::InvalidState(_)));

    let failed = unit.start().unwrap().fail("portal timeout").unwrap();
    app.units.update(&failed).await.unwrap();

    let retried = app.orchestrator.retry_unit(failed.id).await.unwrap();
    assert_eq!(retried.status, UnitStatus::Pending);
    assert!(retried.error_message.is_none());

    let err = app.orchestrator.retry_unit(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AutomationError::NotFound(_)));
}

/// 测试启动恢复将运行中的批次与单元标记为失败
#[tokio::test]
async fn test_recover_interrupted_fails_running_records() {
    let refs = ["92001", "92002"];
    let app = TestApp::new(regular_portal(&refs)).await;
    let units = app.seed_units(OWNER, &refs).await;
    let ids: Vec<Uuid> = units.iter().map(|u| u.id).collect();
    let batch = app
        .orchestrator
        .create_batch(OWNER, &ids, None, options(false, true))
        .await
        .unwrap();

    let mut running = batch.start().unwrap();
    running.mark_unit_completed(ids[0]);
    app.batches.update(&running).await.unwrap();
    let unit = app.units.find_by_id(ids[1]).await.unwrap().unwrap();
    app.units.update(&unit.start().unwrap()).await.unwrap();

    let recovered = app.orchestrator.recover_interrupted().await.unwrap();
    assert_eq!(recovered, 1);

    let stored = app.batches.find_by_id(running.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BatchStatus::Failed);
    assert!(stored.is_resumable());
    let unit = app.units.find_by_id(ids[1]).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Failed);
    assert_eq!(
        unit.error_message.as_deref(),
        Some("interrupted by process restart")
    );
}
