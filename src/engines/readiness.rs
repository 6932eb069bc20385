// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::engines::traits::{Bounds, BrowserDriver};
use crate::infrastructure::observability::metrics;

/// 轮询间隔允许范围（毫秒）
pub const POLL_INTERVAL_RANGE_MS: (u64, u64) = (100, 150);
/// 稳定期允许范围（毫秒）
pub const QUIET_PERIOD_RANGE_MS: (u64, u64) = (300, 500);

/// 页面就绪条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyCondition {
    /// 加载遮罩不存在或已隐藏
    LoaderHidden { selector: String },
    /// 容器数量超过触发前的基线
    ContainerCountIncreased { selector: String, baseline: usize },
    /// 元素可见且在稳定期内位置和可见性不变
    ElementVisibleAndStable { selector: String },
    /// `scope` 的文本中出现子串（不区分大小写）
    TextAppeared { text: String, scope: String },
}

impl ReadyCondition {
    pub fn loader_hidden(selector: impl Into<String>) -> Self {
        ReadyCondition::LoaderHidden { selector: selector.into() }
    }

    pub fn count_increased(selector: impl Into<String>, baseline: usize) -> Self {
        ReadyCondition::ContainerCountIncreased { selector: selector.into(), baseline }
    }

    pub fn visible_and_stable(selector: impl Into<String>) -> Self {
        ReadyCondition::ElementVisibleAndStable { selector: selector.into() }
    }

    pub fn text_appeared(text: impl Into<String>, scope: impl Into<String>) -> Self {
        ReadyCondition::TextAppeared { text: text.into(), scope: scope.into() }
    }

    /// 用于日志和指标标签的条件名称
    pub fn kind(&self) -> &'static str {
        match self {
            ReadyCondition::LoaderHidden { .. } => "loader_hidden",
            ReadyCondition::ContainerCountIncreased { .. } => "container_count_increased",
            ReadyCondition::ElementVisibleAndStable { .. } => "element_visible_and_stable",
            ReadyCondition::TextAppeared { .. } => "text_appeared",
        }
    }
}

/// 等待结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// 就绪检测配置
#[derive(Debug, Clone, Copy)]
pub struct ReadinessConfig {
    pub poll_interval: Duration,
    pub quiet_period: Duration,
    pub timeout: Duration,
}

impl ReadinessConfig {
    /// 创建配置，轮询间隔和稳定期被限制在允许范围内
    pub fn new(poll_interval_ms: u64, quiet_period_ms: u64, timeout_ms: u64) -> Self {
        Self {
            poll_interval: Duration::from_millis(
                poll_interval_ms.clamp(POLL_INTERVAL_RANGE_MS.0, POLL_INTERVAL_RANGE_MS.1),
            ),
            quiet_period: Duration::from_millis(
                quiet_period_ms.clamp(QUIET_PERIOD_RANGE_MS.0, QUIET_PERIOD_RANGE_MS.1),
            ),
            timeout: Duration::from_millis(timeout_ms.max(1)),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self::new(125, 400, 15_000)
    }
}

/// 稳定性跟踪：记录上一次观察到的包围盒及其开始时间
#[derive(Debug, Default)]
struct StabilityTracker {
    observed: Option<(Option<Bounds>, Instant)>,
}

impl StabilityTracker {
    fn observe(&mut self, bounds: Option<Bounds>, now: Instant, quiet: Duration) -> bool {
        match self.observed {
            Some((prev, since)) if prev == bounds => now.duration_since(since) >= quiet,
            _ => {
                self.observed = Some((bounds, now));
                false
            }
        }
    }

    fn reset(&mut self) {
        self.observed = None;
    }
}

/// 就绪检测器
///
/// 以固定间隔轮询驱动，直到条件满足或超时。
/// 轮询期间的驱动错误视为"尚未就绪"，单次驱动调用同样受截止时间约束。超时不是致命错误：
/// 记录警告、计数后返回 `TimedOut`，由调用方走降级路径。
#[derive(Debug, Clone, Default)]
pub struct ReadinessDetector {
    config: ReadinessConfig,
}

impl ReadinessDetector {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// 使用默认超时等待条件
    pub async fn wait(&self, driver: &dyn BrowserDriver, condition: &ReadyCondition) -> Readiness {
        self.wait_with_timeout(driver, condition, self.config.timeout).await
    }

    /// 等待条件满足
    ///
    /// # 参数
    ///
    /// * `driver` - 浏览器驱动
    /// * `condition` - 就绪条件
    /// * `timeout` - 最长等待时间
    ///
    /// # 返回值
    ///
    /// `Ready` 或 `TimedOut`，不会返回错误
    pub async fn wait_with_timeout(
        &self,
        driver: &dyn BrowserDriver,
        condition: &ReadyCondition,
        timeout: Duration,
    ) -> Readiness {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut tracker = StabilityTracker::default();

        loop {
            // A stalled driver call must not outlive the deadline.
            let remaining = deadline.saturating_duration_since(Instant::now());
            let probed = tokio::time::timeout(remaining, self.probe(driver, condition, &mut tracker)).await;
            if probed.is_err() {
                debug!(condition = condition.kind(), "Driver probe did not return before deadline");
            }
            if probed.unwrap_or(false) {
                debug!(
                    condition = condition.kind(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Page condition satisfied"
                );
                return Readiness::Ready;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    condition = condition.kind(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for page condition, continuing on degraded path"
                );
                metrics::record_readiness_timeout(condition.kind());
                return Readiness::TimedOut;
            }

            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// 记录选择器当前的匹配数量，作为 `ContainerCountIncreased` 的基线
    ///
    /// 查询失败时返回0
    pub async fn snapshot_count(&self, driver: &dyn BrowserDriver, selector: &str) -> usize {
        match driver.query(selector).await {
            Ok(state) => state.count,
            Err(e) => {
                debug!(selector, error = %e, "Baseline snapshot failed, assuming zero");
                0
            }
        }
    }

    async fn probe(
        &self,
        driver: &dyn BrowserDriver,
        condition: &ReadyCondition,
        tracker: &mut StabilityTracker,
    ) -> bool {
        let result = match condition {
            ReadyCondition::LoaderHidden { selector } => driver
                .query(selector)
                .await
                .map(|state| state.count == 0 || !state.visible),
            ReadyCondition::ContainerCountIncreased { selector, baseline } => driver
                .query(selector)
                .await
                .map(|state| state.count > *baseline),
            ReadyCondition::ElementVisibleAndStable { selector } => {
                driver.query(selector).await.map(|state| {
                    if state.count > 0 && state.visible {
                        tracker.observe(state.bounds, Instant::now(), self.config.quiet_period)
                    } else {
                        tracker.reset();
                        false
                    }
                })
            }
            ReadyCondition::TextAppeared { text, scope } => driver
                .read_text(scope)
                .await
                .map(|content| content.to_lowercase().contains(&text.to_lowercase())),
        };

        match result {
            Ok(ready) => ready,
            Err(e) => {
                debug!(condition = condition.kind(), error = %e, "Probe failed, treating as not ready");
                if matches!(condition, ReadyCondition::ElementVisibleAndStable { .. }) {
                    tracker.reset();
                }
                false
            }
        }
    }
}
