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

use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、服务器、指标、日志、浏览器、工单门户、就绪检测、
/// 自动化、调度和凭证保管库等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 指标导出配置
    pub metrics: MetricsSettings,
    /// 日志配置
    pub logging: LoggingSettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 工单门户配置
    pub portal: PortalSettings,
    /// 就绪检测配置
    pub readiness: ReadinessSettings,
    /// 自动化运行配置
    pub automation: AutomationSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 凭证保管库配置
    pub vault: VaultSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 指标导出配置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 导出端点监听地址，例如 `0.0.0.0:9000`
    pub listen: String,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 是否输出JSON格式日志
    pub json: bool,
    /// 默认过滤指令，`RUST_LOG` 优先
    pub filter: String,
}

/// 浏览器配置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 是否无头模式
    pub headless: bool,
    /// 远程 Chrome 调试地址，设置后不再本地启动浏览器
    pub remote_debugging_url: Option<String>,
    /// Chrome 可执行文件路径
    pub chrome_executable: Option<String>,
    /// 单个协议请求超时（秒）
    pub request_timeout_secs: u64,
}

/// 工单门户配置
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSettings {
    /// 登录页URL
    pub login_url: String,
    /// 工单列表页URL
    pub work_order_list_url: String,
    /// 工单详情页URL模板，`{id}` 替换为工单编号
    pub work_order_url_template: String,
    /// 从列表页提取工单编号的正则，存在捕获组时取第一个捕获组
    pub work_order_ref_pattern: String,
    /// 提交成功后出现的确认文本
    pub confirmation_text: String,
    /// 页面元素选择器
    pub selectors: PortalSelectors,
}

/// 门户页面选择器
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSelectors {
    pub username_input: String,
    pub password_input: String,
    pub login_button: String,
    /// 登录成功后出现的元素
    pub logged_in_marker: String,
    /// 登录失败提示
    pub login_error: String,
    /// 加载遮罩
    pub loader: String,
    /// 工单列表容器
    pub work_order_list: String,
    /// 设备面板
    pub equipment_panel: String,
    /// 面板中的单条设备记录
    pub equipment_record: String,
    /// 记录中的结构化油品元素
    pub grade_item: String,
    pub add_part_button: String,
    /// 配件行，点击添加后数量增加
    pub part_row: String,
    pub gas_quantity_input: String,
    pub diesel_quantity_input: String,
    pub submit_button: String,
    /// 查找确认文本的范围
    pub confirmation_scope: String,
}

/// 就绪检测配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessSettings {
    /// 轮询间隔（毫秒，100-150）
    pub poll_interval_ms: u64,
    /// 稳定期（毫秒，300-500）
    pub quiet_period_ms: u64,
    /// 单次等待超时（毫秒）
    pub timeout_ms: u64,
}

/// 自动化运行配置
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationSettings {
    /// 步骤之间的延迟（毫秒）
    pub inter_step_delay_ms: u64,
    /// 单次运行的绝对时限（秒）
    pub max_run_duration_secs: u64,
    /// 首个单元失败时终止批次
    pub stop_on_first_failure: bool,
    /// 手动触发的运行默认是否提交表单
    pub manual_submit: bool,
    /// 运行结束后在注册表中保留的时间（秒）
    pub finished_run_retention_secs: u64,
}

/// 调度器配置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// 是否启动调度守护任务
    pub enabled: bool,
    /// 调度检查间隔（秒，30-60）
    pub tick_interval_secs: u64,
}

/// 凭证保管库配置
#[derive(Debug, Clone, Deserialize)]
pub struct VaultSettings {
    /// 密文封装密钥
    pub sealing_key: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载内置默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// `VISITRS__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("VISITRS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 仅使用内置默认值构建配置
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::defaults()?.build()?.try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database.url", "sqlite://visitrs.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen", "0.0.0.0:9000")?
            .set_default("logging.json", false)?
            .set_default("logging.filter", "info,visitrs=debug")?
            .set_default("browser.headless", true)?
            .set_default("browser.request_timeout_secs", 30)?
            .set_default("portal.login_url", "https://portal.example.com/login")?
            .set_default("portal.work_order_list_url", "https://portal.example.com/workorders")?
            .set_default(
                "portal.work_order_url_template",
                "https://portal.example.com/workorders/{id}",
            )?
            .set_default("portal.work_order_ref_pattern", r"WO-(\d{4,})")?
            .set_default("portal.confirmation_text", "submitted successfully")?
            .set_default("portal.selectors.username_input", "#username")?
            .set_default("portal.selectors.password_input", "#password")?
            .set_default("portal.selectors.login_button", "button[type=submit]")?
            .set_default("portal.selectors.logged_in_marker", "#user-menu")?
            .set_default("portal.selectors.login_error", ".login-error")?
            .set_default("portal.selectors.loader", ".loading-overlay")?
            .set_default("portal.selectors.work_order_list", "#work-orders")?
            .set_default("portal.selectors.equipment_panel", "#equipment")?
            .set_default("portal.selectors.equipment_record", ".equipment-record")?
            .set_default("portal.selectors.grade_item", ".grade")?
            .set_default("portal.selectors.add_part_button", "#add-part")?
            .set_default("portal.selectors.part_row", ".part-row")?
            .set_default(
                "portal.selectors.gas_quantity_input",
                ".part-row:last-child input[name=gas_qty]",
            )?
            .set_default(
                "portal.selectors.diesel_quantity_input",
                ".part-row:last-child input[name=diesel_qty]",
            )?
            .set_default("portal.selectors.submit_button", "#submit-visit")?
            .set_default("portal.selectors.confirmation_scope", "#flash")?
            .set_default("readiness.poll_interval_ms", 125)?
            .set_default("readiness.quiet_period_ms", 400)?
            .set_default("readiness.timeout_ms", 15_000)?
            .set_default("automation.inter_step_delay_ms", 250)?
            .set_default("automation.max_run_duration_secs", 3600)?
            .set_default("automation.stop_on_first_failure", false)?
            .set_default("automation.manual_submit", false)?
            .set_default("automation.finished_run_retention_secs", 3600)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.tick_interval_secs", 30)?
            .set_default("vault.sealing_key", "change-me-sealing-key")
    }
}
