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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 驱动错误类型
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// 导航失败
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// 元素不存在
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    /// 元素引用已失效
    #[error("Stale element reference: {0}")]
    StaleElement(String),
    /// 浏览器协议错误
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// 登录失败
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// 会话已关闭或无法建立
    #[error("Session error: {0}")]
    Session(String),
}

impl DriverError {
    /// 判断错误是否为瞬时错误
    ///
    /// # 返回值
    ///
    /// 失效引用和协议错误在页面重新渲染后可能自行恢复，返回true
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::StaleElement(_) | DriverError::Protocol(_)
        )
    }
}

/// 元素包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 选择器查询结果
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementState {
    /// 匹配元素数量
    pub count: usize,
    /// 首个匹配元素是否可见
    pub visible: bool,
    /// 首个匹配元素的包围盒
    pub bounds: Option<Bounds>,
}

impl ElementState {
    pub fn absent() -> Self {
        Self::default()
    }
}

/// 浏览器驱动特质
///
/// 自动化引擎只通过这组窄接口操作页面，
/// 每个会话独占一个驱动实例
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 导航到指定URL
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// 查询选择器的当前状态，不存在时返回 `count = 0`
    async fn query(&self, selector: &str) -> Result<ElementState, DriverError>;

    /// 点击首个匹配元素
    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// 读取首个匹配元素的文本
    async fn read_text(&self, selector: &str) -> Result<String, DriverError>;

    /// 向输入框写入值（覆盖原值）
    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    /// 读取首个匹配元素的外部HTML
    async fn read_html(&self, selector: &str) -> Result<String, DriverError>;

    /// 关闭会话
    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }

    /// 驱动名称
    fn name(&self) -> &'static str;
}
