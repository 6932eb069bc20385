// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

pub const RUNS_TOTAL: &str = "visit_runs_total";
pub const RUNS_FAILED_TOTAL: &str = "visit_runs_failed_total";
pub const UNITS_COMPLETED_TOTAL: &str = "visit_units_completed_total";
pub const UNITS_FAILED_TOTAL: &str = "visit_units_failed_total";
pub const READINESS_TIMEOUTS_TOTAL: &str = "readiness_timeouts_total";
pub const SCHEDULES_AUTO_DISABLED_TOTAL: &str = "schedules_auto_disabled_total";
pub const RUN_DURATION_SECONDS: &str = "visit_run_duration_seconds";

/// 初始化指标系统
///
/// 安装 Prometheus 记录器并在指定地址暴露抓取端点，随后注册各类指标的描述
///
/// # 参数
///
/// * `listen` - Prometheus 抓取端点监听地址
pub fn init_metrics(listen: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(RUNS_TOTAL, "Total number of runs dispatched");
    describe_counter!(RUNS_FAILED_TOTAL, "Total number of runs that ended in failure");
    describe_counter!(
        UNITS_COMPLETED_TOTAL,
        "Total number of work units completed"
    );
    describe_counter!(UNITS_FAILED_TOTAL, "Total number of work units failed");
    describe_counter!(
        READINESS_TIMEOUTS_TOTAL,
        "Total number of readiness waits that timed out"
    );
    describe_counter!(
        SCHEDULES_AUTO_DISABLED_TOTAL,
        "Total number of schedules disabled after repeated failures"
    );
    describe_histogram!(
        RUN_DURATION_SECONDS,
        "Duration of runs in seconds"
    );
}

pub fn record_run_started(trigger: &str) {
    counter!(RUNS_TOTAL, "trigger" => trigger.to_string()).increment(1);
}

pub fn record_run_finished(trigger: &str, success: bool, elapsed: Duration) {
    if !success {
        counter!(RUNS_FAILED_TOTAL, "trigger" => trigger.to_string()).increment(1);
    }
    histogram!(RUN_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_unit_completed() {
    counter!(UNITS_COMPLETED_TOTAL).increment(1);
}

pub fn record_unit_failed() {
    counter!(UNITS_FAILED_TOTAL).increment(1);
}

pub fn record_readiness_timeout(condition: &'static str) {
    counter!(READINESS_TIMEOUTS_TOTAL, "condition" => condition).increment(1);
}

pub fn record_schedule_auto_disabled() {
    counter!(SCHEDULES_AUTO_DISABLED_TOTAL).increment(1);
}
