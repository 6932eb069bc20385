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

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use visitrs::application::use_cases::dispatch_run::RunDispatcher;
use visitrs::config::settings::Settings;
use visitrs::domain::services::extraction_service::ExtractionService;
use visitrs::engines::readiness::{ReadinessConfig, ReadinessDetector};
use visitrs::engines::session::ChromiumSessionFactory;
use visitrs::infrastructure::database::connection;
use visitrs::infrastructure::observability::metrics;
use visitrs::infrastructure::repositories::batch_repo_impl::BatchRepositoryImpl;
use visitrs::infrastructure::repositories::history_repo_impl::HistoryRepositoryImpl;
use visitrs::infrastructure::repositories::schedule_repo_impl::ScheduleRepositoryImpl;
use visitrs::infrastructure::repositories::work_unit_repo_impl::WorkUnitRepositoryImpl;
use visitrs::infrastructure::state::in_flight::InFlightRegistry;
use visitrs::infrastructure::state::run_registry::RunRegistry;
use visitrs::infrastructure::vault::database_vault::DatabaseVault;
use visitrs::infrastructure::vault::secret_opener::AesGcmSecretOpener;
use visitrs::presentation::routes::{self, ApiComponents};
use visitrs::queue::scheduler::SchedulerDaemon;
use visitrs::utils::telemetry;
use visitrs::workers::batch_orchestrator::BatchOrchestrator;
use visitrs::workers::discovery::WorkOrderDiscovery;
use visitrs::workers::unit_engine::UnitEngine;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration and initialize logging
    let settings = Arc::new(Settings::new()?);
    telemetry::init_telemetry(&settings.logging);
    info!("Starting visitrs...");

    if settings.metrics.enabled {
        let listen: SocketAddr = settings
            .metrics
            .listen
            .parse()
            .with_context(|| format!("invalid metrics listen address {}", settings.metrics.listen))?;
        metrics::init_metrics(listen)?;
        info!(%listen, "Prometheus exporter listening");
    }

    // 2. Connect to database and run migrations
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);

    // 3. Initialize Components
    let units = Arc::new(WorkUnitRepositoryImpl::new(db.clone()));
    let batches = Arc::new(BatchRepositoryImpl::new(db.clone()));
    let schedules = Arc::new(ScheduleRepositoryImpl::new(db.clone()));
    let history = Arc::new(HistoryRepositoryImpl::new(db.clone()));

    if settings.vault.sealing_key == "change-me-sealing-key" {
        warn!("Using the built-in vault sealing key; set VISITRS__VAULT__SEALING_KEY in production");
    }
    let opener = Arc::new(AesGcmSecretOpener::new(&settings.vault.sealing_key)?);
    let vault = Arc::new(DatabaseVault::new(db.clone(), opener));

    let readiness = ReadinessDetector::new(ReadinessConfig::new(
        settings.readiness.poll_interval_ms,
        settings.readiness.quiet_period_ms,
        settings.readiness.timeout_ms,
    ));
    let selectors = settings.portal.selectors.clone();
    let extraction = ExtractionService::new(&selectors.equipment_record, &selectors.grade_item)?;
    let engine = Arc::new(UnitEngine::new(
        readiness.clone(),
        extraction,
        selectors,
        settings.portal.confirmation_text.clone(),
        Duration::from_millis(settings.automation.inter_step_delay_ms),
    ));
    let orchestrator = Arc::new(BatchOrchestrator::new(units.clone(), batches.clone(), engine));
    let discovery = Arc::new(WorkOrderDiscovery::new(
        settings.portal.clone(),
        readiness.clone(),
        units.clone(),
    )?);
    let sessions = Arc::new(ChromiumSessionFactory::new(
        settings.browser.clone(),
        settings.portal.clone(),
        readiness,
    ));

    let dispatcher = Arc::new(RunDispatcher::new(
        vault,
        sessions,
        discovery,
        orchestrator.clone(),
        schedules.clone(),
        history.clone(),
        Arc::new(RunRegistry::new()),
        InFlightRegistry::new(),
        Duration::from_secs(settings.automation.max_run_duration_secs),
        settings.automation.stop_on_first_failure,
    ));

    // 4. Recover runs interrupted by a previous crash
    let recovered = orchestrator.recover_interrupted().await?;
    if recovered > 0 {
        warn!("Recovered {} interrupted batches", recovered);
    }

    // 5. Start scheduler
    if settings.scheduler.enabled {
        let scheduler = Arc::new(SchedulerDaemon::new(
            schedules.clone(),
            dispatcher.clone(),
            settings.scheduler.tick_interval_secs,
            Duration::from_secs(settings.automation.finished_run_retention_secs),
        ));
        scheduler.start();
    } else {
        info!("Scheduler disabled by configuration");
    }

    // 6. Start HTTP server
    let app = routes::app(ApiComponents {
        settings: settings.clone(),
        dispatcher,
        orchestrator,
        units,
        schedules,
        history,
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
