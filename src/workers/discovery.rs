// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::settings::PortalSettings;
use crate::domain::models::work_unit::{UnitStatus, WorkUnit};
use crate::domain::repositories::work_unit_repository::WorkUnitRepository;
use crate::engines::readiness::{ReadinessDetector, ReadyCondition};
use crate::engines::traits::BrowserDriver;
use crate::utils::errors::AutomationError;

/// 工单发现
///
/// 读取用户的工单列表，按工单号生成来源地址并与已有单元去重
pub struct WorkOrderDiscovery {
    portal: PortalSettings,
    readiness: ReadinessDetector,
    ref_pattern: Regex,
    units: Arc<dyn WorkUnitRepository>,
}

impl WorkOrderDiscovery {
    /// 创建工单发现服务
    ///
    /// # 返回值
    ///
    /// 工单号正则无法编译时返回 `Validation`
    pub fn new(
        portal: PortalSettings,
        readiness: ReadinessDetector,
        units: Arc<dyn WorkUnitRepository>,
    ) -> Result<Self, AutomationError> {
        let ref_pattern = Regex::new(&portal.work_order_ref_pattern).map_err(|e| {
            AutomationError::Validation(format!("invalid work order pattern: {}", e))
        })?;
        Ok(Self {
            portal,
            readiness,
            ref_pattern,
            units,
        })
    }

    /// 发现需要处理的单元
    ///
    /// 新工单创建为 Pending 单元；已有的 Pending 单元直接纳入；
    /// Failed 单元经重试转换后纳入；已完成、已取消或运行中的单元跳过。
    ///
    /// # 参数
    ///
    /// * `driver` - 已登录的浏览器驱动
    /// * `owner_id` - 用户ID
    ///
    /// # 返回值
    ///
    /// 按列表顺序排列的单元ID
    #[instrument(skip(self, driver))]
    pub async fn discover(
        &self,
        driver: &dyn BrowserDriver,
        owner_id: &str,
    ) -> Result<Vec<Uuid>, AutomationError> {
        let selectors = &self.portal.selectors;
        driver
            .navigate(&self.portal.work_order_list_url)
            .await
            .map_err(|e| AutomationError::Navigation(e.to_string()))?;

        let loader = ReadyCondition::loader_hidden(&selectors.loader);
        self.readiness.wait(driver, &loader).await;
        let list = ReadyCondition::visible_and_stable(&selectors.work_order_list);
        if !self.readiness.wait(driver, &list).await.is_ready() {
            warn!("Work order list did not settle, reading it anyway");
        }

        let markup = driver.read_html(&selectors.work_order_list).await?;
        let refs = self.extract_refs(&markup);
        debug!(found = refs.len(), "Extracted work order references");

        let mut unit_ids = Vec::with_capacity(refs.len());
        for external_ref in refs {
            let locator = self.locator_for(&external_ref);
            if let Err(e) = Url::parse(&locator) {
                warn!(external_ref, locator, error = %e, "Skipping work order with invalid locator");
                continue;
            }

            match self.units.find_by_locator(owner_id, &locator).await? {
                None => {
                    let unit = self
                        .units
                        .create(&WorkUnit::new(owner_id, external_ref, locator))
                        .await?;
                    unit_ids.push(unit.id);
                }
                Some(unit) => match unit.status {
                    UnitStatus::Pending => unit_ids.push(unit.id),
                    // failed units come back only through an explicit retry
                    UnitStatus::Failed
                    | UnitStatus::Completed
                    | UnitStatus::Cancelled
                    | UnitStatus::Running => {
                        debug!(unit_id = %unit.id, status = %unit.status, "Skipping known work order");
                    }
                },
            }
        }

        info!(units = unit_ids.len(), "Discovery finished");
        Ok(unit_ids)
    }

    /// 从列表HTML中提取工单号，去重并保持出现顺序
    ///
    /// 模式含捕获组时取第一个捕获组，否则取整个匹配
    pub fn extract_refs(&self, markup: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.ref_pattern
            .captures_iter(markup)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().to_string())
            .filter(|r| seen.insert(r.clone()))
            .collect()
    }

    pub fn locator_for(&self, external_ref: &str) -> String {
        self.portal.work_order_url_template.replace("{id}", external_ref)
    }
}
