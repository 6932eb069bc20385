// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::helpers::{equipment_html, selectors, ScriptedDriver, TestApp};
use visitrs::domain::models::batch_job::{BatchJob, BatchOptions};
use visitrs::domain::models::work_unit::UnitStatus;
use visitrs::domain::repositories::batch_repository::BatchRepository;
use visitrs::domain::repositories::work_unit_repository::WorkUnitRepository;
use visitrs::presentation::routes;

const OWNER: &str = "tech-api";

async fn setup(refs: &[&str]) -> (TestApp, TestServer) {
    let driver = refs
        .iter()
        .fold(ScriptedDriver::new(selectors()).with_list(refs), |driver, r| {
            driver.with_page(r, equipment_html(&[&["Regular", "Premium", "Super"]]))
        });
    let app = TestApp::new(driver).await;
    let server = TestServer::new(routes::app(app.api())).unwrap();
    (app, server)
}

fn run_id_of(body: &Value) -> String {
    match &body["run_id"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 轮询运行快照直到进入终止状态
async fn wait_for_run(server: &TestServer, run_id: &str) -> Value {
    for _ in 0..200 {
        let snapshot: Value = server.get(&format!("/v1/runs/{}", run_id)).await.json();
        let status = snapshot["status"].as_str().unwrap_or_default().to_string();
        if matches!(status.as_str(), "completed" | "failed" | "cancelled" | "paused") {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("run {} did not finish", run_id);
}

/// 测试健康检查端点
#[tokio::test]
async fn test_health_check() {
    let (_app, server) = setup(&[]).await;
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");
}

/// 测试手动触发运行并通过轮询接口观察结果
#[tokio::test]
async fn test_trigger_run_and_poll_status() {
    let (app, server) = setup(&["21001"]).await;
    app.store_credential(OWNER, "hunter2").await;

    let response = server
        .post(&format!("/v1/owners/{}/runs", OWNER))
        .json(&json!({ "submit": true }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["owner_id"], OWNER);

    let snapshot = wait_for_run(&server, &run_id_of(&body)).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["progress"], 100.0);

    let history: Value = server
        .get(&format!("/v1/owners/{}/history", OWNER))
        .await
        .json();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["success"], true);
    assert_eq!(entries[0]["item_count"], 1);
    assert_eq!(entries[0]["trigger"], "manual");

    let batch_id = entries[0]["batch_id"].as_str().unwrap().to_string();
    let batch: Value = server.get(&format!("/v1/batches/{}", batch_id)).await.json();
    assert_eq!(batch["status"], "completed");
    assert_eq!(batch["completed_units"], 1);
    assert_eq!(batch["resumable"], false);

    let unit = app
        .units
        .find_by_status(UnitStatus::Completed)
        .await
        .unwrap()
        .remove(0);
    let response = server.get(&format!("/v1/units/{}", unit.id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let snapshot: Value = response.json();
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["progress"], 100.0);
}

/// 测试同一用户重复触发返回409
#[tokio::test]
async fn test_trigger_run_while_busy_conflicts() {
    let (app, server) = setup(&["22001"]).await;
    app.store_credential(OWNER, "hunter2").await;

    let first = server
        .post(&format!("/v1/owners/{}/runs", OWNER))
        .json(&json!({}))
        .await;
    assert_eq!(first.status_code(), StatusCode::ACCEPTED);

    let second = server
        .post(&format!("/v1/owners/{}/runs", OWNER))
        .json(&json!({}))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    let body: Value = second.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains(OWNER));

    wait_for_run(&server, &run_id_of(&first.json())).await;
}

/// 测试未知运行返回 not_found 快照，取消未知运行返回404
#[tokio::test]
async fn test_unknown_run_lookups() {
    let (_app, server) = setup(&[]).await;

    let response = server.get("/v1/runs/999999").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let snapshot: Value = response.json();
    assert_eq!(snapshot["status"], "not_found");

    let snapshot: Value = server.get("/v1/runs/not-a-run").await.json();
    assert_eq!(snapshot["status"], "not_found");

    let response = server.post("/v1/runs/999999/cancel").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let response = server.post("/v1/runs/999999/pause").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

/// 测试已结束的运行不能再取消
#[tokio::test]
async fn test_cancel_finished_run_conflicts() {
    let (app, server) = setup(&[]).await;
    app.store_credential(OWNER, "hunter2").await;

    let body: Value = server
        .post(&format!("/v1/owners/{}/runs", OWNER))
        .json(&json!({}))
        .await
        .json();
    let run_id = run_id_of(&body);
    wait_for_run(&server, &run_id).await;

    let response = server.post(&format!("/v1/runs/{}/cancel", run_id)).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

/// 测试调度的创建、查询、禁用与启用
#[tokio::test]
async fn test_schedule_lifecycle() {
    let (_app, server) = setup(&[]).await;

    let response = server
        .post("/v1/schedules")
        .json(&json!({
            "owner_id": OWNER,
            "interval_minutes": 60,
            "active_start": "08:00",
            "active_end": "17:30",
            "utc_offset_minutes": -300
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["enabled"], true);
    assert_eq!(created["consecutive_failures"], 0);
    let id = created["id"].as_str().unwrap().to_string();

    let fetched: Value = server.get(&format!("/v1/schedules/{}", id)).await.json();
    assert_eq!(fetched["owner_id"], OWNER);
    assert_eq!(fetched["interval_minutes"], 60);

    let disabled: Value = server
        .post(&format!("/v1/schedules/{}/disable", id))
        .await
        .json();
    assert_eq!(disabled["enabled"], false);

    let enabled: Value = server
        .post(&format!("/v1/schedules/{}/enable", id))
        .await
        .json();
    assert_eq!(enabled["enabled"], true);

    let response = server.get(&format!("/v1/schedules/{}", Uuid::new_v4())).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

/// 测试非法的调度请求返回422
#[tokio::test]
async fn test_invalid_schedule_requests_are_rejected() {
    let (_app, server) = setup(&[]).await;

    let response = server
        .post("/v1/schedules")
        .json(&json!({ "owner_id": OWNER, "interval_minutes": 0 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .post("/v1/schedules")
        .json(&json!({
            "owner_id": OWNER,
            "interval_minutes": 30,
            "active_start": "25:00",
            "active_end": "17:00"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .post("/v1/schedules")
        .json(&json!({ "owner_id": "", "interval_minutes": 30 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    // empty window
    let response = server
        .post("/v1/schedules")
        .json(&json!({
            "owner_id": OWNER,
            "interval_minutes": 30,
            "active_start": "09:00",
            "active_end": "09:00"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

/// 测试批次恢复接口的错误分支
#[tokio::test]
async fn test_resume_batch_errors() {
    let (app, server) = setup(&["23001"]).await;

    let response = server
        .post(&format!("/v1/batches/{}/resume", Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let unit = app.seed_units(OWNER, &["23001"]).await.remove(0);
    let batch = app
        .batches
        .create(&BatchJob::new(OWNER, vec![unit.id], BatchOptions::default()))
        .await
        .unwrap();
    let response = server.post(&format!("/v1/batches/{}/resume", batch.id)).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

/// 测试单元重试接口
#[tokio::test]
async fn test_retry_unit_endpoint() {
    let (app, server) = setup(&[]).await;
    let unit = app.seed_units(OWNER, &["24001"]).await.remove(0);

    let response = server.post(&format!("/v1/units/{}/retry", unit.id)).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let failed = unit.start().unwrap().fail("navigation timeout").unwrap();
    app.units.update(&failed).await.unwrap();

    let persisted: Value = server.get(&format!("/v1/units/{}", failed.id)).await.json();
    assert_eq!(persisted["status"], "failed");
    assert_eq!(persisted["error"], "navigation timeout");

    let response = server.post(&format!("/v1/units/{}/retry", failed.id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let snapshot: Value = response.json();
    assert_eq!(snapshot["status"], "pending");

    let missing: Value = server.get(&format!("/v1/units/{}", Uuid::new_v4())).await.json();
    assert_eq!(missing["status"], "not_found");
}

/// 测试历史查询的数量限制校验
#[tokio::test]
async fn test_history_limit_is_validated() {
    let (_app, server) = setup(&[]).await;
    let response = server
        .get(&format!("/v1/owners/{}/history?limit=0", OWNER))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .get(&format!("/v1/owners/{}/history?limit=5", OWNER))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let entries: Value = response.json();
    assert!(entries.as_array().unwrap().is_empty());
}
