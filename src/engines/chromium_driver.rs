// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::settings::BrowserSettings;
use crate::engines::traits::{BrowserDriver, DriverError, ElementState};

/// 基于 chromiumoxide 的浏览器驱动
///
/// 每个会话独占一个浏览器实例和一个页面，关闭时一并释放
pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// 启动或连接浏览器并打开空白页
    ///
    /// # 参数
    ///
    /// * `settings` - 浏览器配置
    ///
    /// # 返回值
    ///
    /// * `Ok(ChromiumDriver)` - 可用的驱动
    /// * `Err(DriverError::Session)` - 浏览器无法启动或连接
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, DriverError> {
        let (browser, mut handler) = if let Some(ref url) = settings.remote_debugging_url {
            info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url)
                .await
                .map_err(|e| DriverError::Session(format!("Failed to connect to remote Chrome: {}", e)))?
        } else {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(Duration::from_secs(settings.request_timeout_secs))
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage");
            if !settings.headless {
                builder = builder.with_head();
            }
            if let Some(ref path) = settings.chrome_executable {
                builder = builder.chrome_executable(path);
            }

            Browser::launch(builder.build().map_err(DriverError::Session)?)
                .await
                .map_err(|e| DriverError::Session(e.to_string()))?
        };

        // Spawn a handler to process browser events
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(DriverError::Session(e.to_string()));
            }
        };

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
        })
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, DriverError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| classify_cdp_error(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| DriverError::Protocol(format!("Unexpected script result: {}", e)))
    }
}

/// 将选择器编码为 JS 字符串字面量
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn classify_cdp_error(message: String) -> DriverError {
    let lowered = message.to_lowercase();
    if lowered.contains("no node") || lowered.contains("could not find node") {
        DriverError::StaleElement(message)
    } else {
        DriverError::Protocol(message)
    }
}

fn query_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            const els = document.querySelectorAll({sel});
            if (els.length === 0) return {{ count: 0, visible: false, bounds: null }};
            const el = els[0];
            const style = window.getComputedStyle(el);
            const r = el.getBoundingClientRect();
            const visible = style.display !== 'none'
                && style.visibility !== 'hidden'
                && parseFloat(style.opacity || '1') > 0
                && r.width > 0 && r.height > 0;
            return {{
                count: els.length,
                visible: visible,
                bounds: {{ x: r.x, y: r.y, width: r.width, height: r.height }}
            }};
        }})()"#,
        sel = js_string(selector)
    )
}

fn fill_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.focus();
            el.value = {val};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = js_string(selector),
        val = js_string(value)
    )
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        debug!(url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<ElementState, DriverError> {
        self.evaluate(query_script(selector)).await
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| classify_cdp_error(format!("Click on {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn read_text(&self, selector: &str) -> Result<String, DriverError> {
        let text = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::ElementNotFound(format!("{}: {}", selector, e)))?
            .inner_text()
            .await
            .map_err(|e| classify_cdp_error(e.to_string()))?;
        Ok(text.unwrap_or_default())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let filled: bool = self.evaluate(fill_script(selector, value)).await?;
        if filled {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }

    async fn read_html(&self, selector: &str) -> Result<String, DriverError> {
        let html = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::ElementNotFound(format!("{}: {}", selector, e)))?
            .outer_html()
            .await
            .map_err(|e| classify_cdp_error(e.to_string()))?;
        Ok(html.unwrap_or_default())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            let _ = browser.wait().await;
        }
        self.handler.abort();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
