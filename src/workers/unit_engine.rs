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

use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::settings::PortalSelectors;
use crate::domain::models::extraction::GradeCategory;
use crate::domain::models::work_unit::WorkUnit;
use crate::domain::services::extraction_service::ExtractionService;
use crate::domain::services::warning_severity;
use crate::engines::readiness::{ReadinessDetector, ReadyCondition};
use crate::engines::traits::{BrowserDriver, DriverError};
use crate::infrastructure::state::run_registry::RunContext;
use crate::utils::errors::AutomationError;

/// 单元自动化步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStep {
    Navigating,
    Detecting,
    Extracting,
    Filling,
    Submitting,
    Completed,
}

impl UnitStep {
    /// 固定的步骤顺序
    pub const SEQUENCE: [UnitStep; 6] = [
        UnitStep::Navigating,
        UnitStep::Detecting,
        UnitStep::Extracting,
        UnitStep::Filling,
        UnitStep::Submitting,
        UnitStep::Completed,
    ];

    /// 进入该步骤时的进度百分比
    pub fn progress(&self) -> u8 {
        match self {
            UnitStep::Navigating => 10,
            UnitStep::Detecting => 25,
            UnitStep::Extracting => 45,
            UnitStep::Filling => 65,
            UnitStep::Submitting => 85,
            UnitStep::Completed => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitStep::Navigating => "navigating to work order",
            UnitStep::Detecting => "waiting for equipment panel",
            UnitStep::Extracting => "extracting equipment grades",
            UnitStep::Filling => "filling filter quantities",
            UnitStep::Submitting => "submitting visit",
            UnitStep::Completed => "completed",
        }
    }
}

/// 单元执行结果
///
/// 引擎只负责驱动页面并写入进度、抽取结果和警告，
/// 终止状态转换由批处理编排器完成
#[derive(Debug)]
pub enum UnitEnd {
    Completed,
    Failed(AutomationError),
    Cancelled,
}

/// 单元自动化引擎
pub struct UnitEngine {
    readiness: ReadinessDetector,
    extraction: ExtractionService,
    selectors: PortalSelectors,
    confirmation_text: String,
    inter_step_delay: Duration,
}

impl UnitEngine {
    /// 创建单元自动化引擎
    ///
    /// # 参数
    ///
    /// * `readiness` - 就绪检测器
    /// * `extraction` - 字段抽取服务
    /// * `selectors` - 门户页面选择器
    /// * `confirmation_text` - 提交成功后出现的提示文本
    /// * `inter_step_delay` - 步骤之间的间隔，为0时不等待
    pub fn new(
        readiness: ReadinessDetector,
        extraction: ExtractionService,
        selectors: PortalSelectors,
        confirmation_text: impl Into<String>,
        inter_step_delay: Duration,
    ) -> Self {
        Self {
            readiness,
            extraction,
            selectors,
            confirmation_text: confirmation_text.into(),
            inter_step_delay,
        }
    }

    /// 驱动单个工作单元完成全部步骤
    ///
    /// 调用前单元必须已处于 Running 状态。取消标记只在步骤之间检查。
    ///
    /// # 参数
    ///
    /// * `driver` - 当前会话独占的浏览器驱动
    /// * `unit` - 运行中的工作单元，进度、抽取结果与警告会写回
    /// * `submit` - 是否执行提交步骤
    /// * `ctx` - 运行上下文，用于发布进度和读取取消标记
    ///
    /// # 返回值
    ///
    /// 单元执行结果
    #[instrument(skip(self, driver, unit, ctx), fields(run_id = %ctx.id(), unit_id = %unit.id, external_ref = %unit.external_ref))]
    pub async fn run(
        &self,
        driver: &dyn BrowserDriver,
        unit: &mut WorkUnit,
        submit: bool,
        ctx: &RunContext,
    ) -> UnitEnd {
        for (index, step) in UnitStep::SEQUENCE.iter().enumerate() {
            if ctx.is_cancel_requested() {
                info!(step = ?step, "Cancellation requested, stopping unit");
                return UnitEnd::Cancelled;
            }

            if index > 0 && !self.inter_step_delay.is_zero() {
                tokio::time::sleep(self.inter_step_delay).await;
            }

            unit.set_progress(step.progress(), step.label());
            ctx.record_unit_step(unit.id, step.progress(), step.label());
            debug!(step = ?step, progress = step.progress(), "Entering unit step");

            let result = match step {
                UnitStep::Navigating => self.navigate(driver, unit).await,
                UnitStep::Detecting => self.detect(driver, unit).await,
                UnitStep::Extracting => {
                    self.extract(driver, unit).await;
                    Ok(())
                }
                UnitStep::Filling => self.fill(driver, unit).await,
                UnitStep::Submitting if submit => self.submit(driver, unit).await,
                UnitStep::Submitting => {
                    unit.set_progress(step.progress(), "filled; awaiting manual submission");
                    Ok(())
                }
                UnitStep::Completed => Ok(()),
            };

            if let Err(e) = result {
                warn!(step = ?step, error = %e, "Unit step failed");
                return UnitEnd::Failed(e);
            }
        }

        info!(warnings = unit.warnings.len(), "Unit automation completed");
        UnitEnd::Completed
    }

    async fn navigate(&self, driver: &dyn BrowserDriver, unit: &WorkUnit) -> Result<(), AutomationError> {
        driver
            .navigate(&unit.source_locator)
            .await
            .map_err(|e| match e {
                DriverError::Authentication(msg) => AutomationError::Authentication(msg),
                other => AutomationError::Navigation(other.to_string()),
            })
    }

    async fn detect(&self, driver: &dyn BrowserDriver, unit: &mut WorkUnit) -> Result<(), AutomationError> {
        let loader = ReadyCondition::loader_hidden(&self.selectors.loader);
        if !self.readiness.wait(driver, &loader).await.is_ready() {
            push_warning(unit, "Page loader still visible after timeout; data may be inconsistent");
        }

        // The portal bounces expired sessions back to its login form.
        if let Ok(state) = driver.query(&self.selectors.username_input).await {
            if state.count > 0 && state.visible {
                return Err(AutomationError::Authentication(
                    "portal session expired; login form shown".to_string(),
                ));
            }
        }

        let panel = ReadyCondition::visible_and_stable(&self.selectors.equipment_panel);
        if !self.readiness.wait(driver, &panel).await.is_ready() {
            push_warning(unit, "Equipment panel did not settle before timeout; verify extracted grades");
        }
        Ok(())
    }

    async fn extract(&self, driver: &dyn BrowserDriver, unit: &mut WorkUnit) {
        let markup = match driver.read_html(&self.selectors.equipment_panel).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!(error = %e, "Could not read equipment panel, extracting from empty markup");
                String::new()
            }
        };

        let extraction = self.extraction.extract_unit(&markup);
        debug!(
            entities = extraction.entities.len(),
            gas_filters = extraction.gas_filters,
            diesel_filters = extraction.diesel_filters,
            "Extracted equipment grades"
        );
        unit.warnings.extend(extraction.warnings());
        unit.extracted = Some(extraction);
    }

    async fn fill(&self, driver: &dyn BrowserDriver, unit: &mut WorkUnit) -> Result<(), AutomationError> {
        let (gas, diesel) = unit
            .extracted
            .as_ref()
            .map(|e| (e.gas_filters, e.diesel_filters))
            .unwrap_or_default();

        for (category, count, input) in [
            (GradeCategory::Gas, gas, &self.selectors.gas_quantity_input),
            (GradeCategory::Diesel, diesel, &self.selectors.diesel_quantity_input),
        ] {
            if count == 0 {
                continue;
            }

            let baseline = self
                .readiness
                .snapshot_count(driver, &self.selectors.part_row)
                .await;
            if let Err(e) = driver.click(&self.selectors.add_part_button).await {
                self.degrade_or_fail(unit, e, &format!("Could not add {:?} filter row; verify parts manually", category))?;
                continue;
            }

            let added = ReadyCondition::count_increased(&self.selectors.part_row, baseline);
            if !self.readiness.wait(driver, &added).await.is_ready() {
                push_warning(unit, &format!("{:?} filter row did not appear; verify parts manually", category));
            }

            if let Err(e) = driver.fill(input, &count.to_string()).await {
                self.degrade_or_fail(unit, e, &format!("Could not fill {:?} filter quantity; verify parts manually", category))?;
            }
        }
        Ok(())
    }

    async fn submit(&self, driver: &dyn BrowserDriver, unit: &mut WorkUnit) -> Result<(), AutomationError> {
        if let Err(e) = driver.click(&self.selectors.submit_button).await {
            self.degrade_or_fail(unit, e, "Submit button unavailable; verify submission manually")?;
            return Ok(());
        }

        let confirmed = ReadyCondition::text_appeared(
            &self.confirmation_text,
            &self.selectors.confirmation_scope,
        );
        if !self.readiness.wait(driver, &confirmed).await.is_ready() {
            push_warning(unit, "Submission confirmation not detected; verify submission manually");
        }
        Ok(())
    }

    /// 瞬时驱动错误降级为警告，其余错误使单元失败
    fn degrade_or_fail(
        &self,
        unit: &mut WorkUnit,
        error: DriverError,
        message: &str,
    ) -> Result<(), AutomationError> {
        if error.is_transient() {
            debug!(error = %error, "Transient driver error, continuing");
            push_warning(unit, message);
            Ok(())
        } else {
            Err(AutomationError::from(error))
        }
    }
}

fn push_warning(unit: &mut WorkUnit, message: &str) {
    unit.warnings.push(warning_severity::warning(message, Vec::new()));
}
