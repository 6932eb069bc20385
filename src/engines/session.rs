// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::settings::{BrowserSettings, PortalSettings};
use crate::domain::models::credential::Credential;
use crate::engines::chromium_driver::ChromiumDriver;
use crate::engines::readiness::{ReadinessDetector, ReadyCondition};
use crate::engines::traits::{BrowserDriver, DriverError};

/// 会话工厂特质
///
/// 打开一个已登录的浏览器会话；凭证无效时返回 `DriverError::Authentication`
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, credential: &Credential) -> Result<Arc<dyn BrowserDriver>, DriverError>;
}

/// 在已打开的驱动上执行门户登录
///
/// # 参数
///
/// * `driver` - 浏览器驱动
/// * `portal` - 门户配置
/// * `readiness` - 就绪检测器
/// * `credential` - 登录凭证
///
/// # 返回值
///
/// 登录成功标记出现时返回 `Ok(())`；出现错误提示或标记始终未出现时返回认证错误
#[instrument(skip_all, fields(owner_id = %credential.owner_id))]
pub async fn login(
    driver: &dyn BrowserDriver,
    portal: &PortalSettings,
    readiness: &ReadinessDetector,
    credential: &Credential,
) -> Result<(), DriverError> {
    let selectors = &portal.selectors;

    driver
        .navigate(&portal.login_url)
        .await
        .map_err(|e| DriverError::Authentication(format!("login page unreachable: {}", e)))?;

    readiness
        .wait(driver, &ReadyCondition::loader_hidden(&selectors.loader))
        .await;
    readiness
        .wait(driver, &ReadyCondition::visible_and_stable(&selectors.username_input))
        .await;

    driver.fill(&selectors.username_input, &credential.username).await?;
    driver.fill(&selectors.password_input, credential.secret()).await?;
    driver.click(&selectors.login_button).await?;

    let outcome = readiness
        .wait(driver, &ReadyCondition::visible_and_stable(&selectors.logged_in_marker))
        .await;
    if outcome.is_ready() {
        info!("Logged in to portal");
        return Ok(());
    }

    let error_state = driver.query(&selectors.login_error).await.unwrap_or_default();
    if error_state.count > 0 && error_state.visible {
        let reason = driver
            .read_text(&selectors.login_error)
            .await
            .unwrap_or_else(|_| "invalid credentials".to_string());
        warn!("Portal rejected credentials: {}", reason.trim());
        return Err(DriverError::Authentication(reason.trim().to_string()));
    }

    Err(DriverError::Authentication(
        "login did not complete before timeout".to_string(),
    ))
}

/// 基于 chromiumoxide 的会话工厂
pub struct ChromiumSessionFactory {
    browser: BrowserSettings,
    portal: PortalSettings,
    readiness: ReadinessDetector,
}

impl ChromiumSessionFactory {
    pub fn new(browser: BrowserSettings, portal: PortalSettings, readiness: ReadinessDetector) -> Self {
        Self {
            browser,
            portal,
            readiness,
        }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self, credential: &Credential) -> Result<Arc<dyn BrowserDriver>, DriverError> {
        let driver = ChromiumDriver::launch(&self.browser).await?;
        if let Err(e) = login(&driver, &self.portal, &self.readiness, credential).await {
            let _ = driver.close().await;
            return Err(e);
        }
        Ok(Arc::new(driver))
    }
}
