// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::extraction::{UnitExtraction, Warning};

/// 工作单元实体
///
/// 表示一次可调度的自动化目标，对应外部工单系统中的一张工单（一次现场巡检）。
/// 工作单元记录来源地址、抽取出的设备数据、执行状态和进度。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    /// 工作单元唯一标识符
    pub id: Uuid,
    /// 所属用户ID，同一用户同一时间只允许一个运行
    pub owner_id: String,
    /// 所属批次ID（可选）
    pub batch_id: Option<Uuid>,
    /// 外部工单编号
    pub external_ref: String,
    /// 来源地址，驱动浏览器导航的目标URL
    pub source_locator: String,
    /// 当前状态
    pub status: UnitStatus,
    /// 进度百分比（0-100）
    pub progress: u8,
    /// 人类可读的当前步骤描述
    pub message: Option<String>,
    /// 失败时的错误信息
    pub error_message: Option<String>,
    /// 抽取出的设备与油品数据
    pub extracted: Option<UnitExtraction>,
    /// 需要人工关注的警告
    pub warnings: Vec<Warning>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
    /// 开始执行时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间（成功、失败或取消）
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// 工作单元状态
///
/// 状态转换遵循以下流程：
/// Pending → Running → Completed/Failed
/// Running/Pending → Cancelled
/// Failed → Pending（仅限显式重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// 等待执行
    #[default]
    Pending,
    /// 执行中
    Running,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
    /// 已取消
    Cancelled,
}

impl UnitStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitStatus::Completed | UnitStatus::Failed | UnitStatus::Cancelled
        )
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnitStatus::Pending => write!(f, "pending"),
            UnitStatus::Running => write!(f, "running"),
            UnitStatus::Completed => write!(f, "completed"),
            UnitStatus::Failed => write!(f, "failed"),
            UnitStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for UnitStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UnitStatus::Pending),
            "running" => Ok(UnitStatus::Running),
            "completed" => Ok(UnitStatus::Completed),
            "failed" => Ok(UnitStatus::Failed),
            "cancelled" => Ok(UnitStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
///
/// 表示在领域层可能发生的各种错误情况，包括状态转换错误和验证失败。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 无效的状态转换，当状态转换不符合业务规则时发生
    #[error("Invalid state transition from {from} via {action}")]
    InvalidStateTransition {
        from: String,
        action: &'static str,
    },

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    pub(crate) fn transition(from: impl fmt::Display, action: &'static str) -> Self {
        DomainError::InvalidStateTransition {
            from: from.to_string(),
            action,
        }
    }
}

impl WorkUnit {
    /// 创建一个新的待执行工作单元
    ///
    /// # 参数
    ///
    /// * `owner_id` - 所属用户ID
    /// * `external_ref` - 外部工单编号
    /// * `source_locator` - 工单页面URL
    pub fn new(owner_id: impl Into<String>, external_ref: impl Into<String>, source_locator: impl Into<String>) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            batch_id: None,
            external_ref: external_ref.into(),
            source_locator: source_locator.into(),
            status: UnitStatus::Pending,
            progress: 0,
            message: None,
            error_message: None,
            extracted: None,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// 启动工作单元
    ///
    /// 将状态从Pending变更为Running
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            UnitStatus::Pending => {
                let now = Utc::now().into();
                self.status = UnitStatus::Running;
                self.progress = 0;
                self.error_message = None;
                self.started_at = Some(now);
                self.completed_at = None;
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, "start")),
        }
    }

    /// 完成工作单元
    ///
    /// 将状态从Running变更为Completed
    pub fn complete(mut self) -> Result<Self, DomainError> {
        match self.status {
            UnitStatus::Running => {
                let now = Utc::now().into();
                self.status = UnitStatus::Completed;
                self.progress = 100;
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, "complete")),
        }
    }

    /// 标记工作单元失败
    ///
    /// 将状态从Running变更为Failed，并记录错误信息
    pub fn fail(mut self, error: impl Into<String>) -> Result<Self, DomainError> {
        match self.status {
            UnitStatus::Running => {
                let now = Utc::now().into();
                self.status = UnitStatus::Failed;
                self.error_message = Some(error.into());
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, "fail")),
        }
    }

    /// 取消工作单元
    ///
    /// Running或Pending状态均可取消
    pub fn cancel(mut self) -> Result<Self, DomainError> {
        match self.status {
            UnitStatus::Pending | UnitStatus::Running => {
                let now = Utc::now().into();
                self.status = UnitStatus::Cancelled;
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, "cancel")),
        }
    }

    /// 显式重试
    ///
    /// 仅允许Failed → Pending，清除上一次的错误与进度
    pub fn retry(mut self) -> Result<Self, DomainError> {
        match self.status {
            UnitStatus::Failed => {
                self.status = UnitStatus::Pending;
                self.progress = 0;
                self.message = None;
                self.error_message = None;
                self.started_at = None;
                self.completed_at = None;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            other => Err(DomainError::transition(other, "retry")),
        }
    }

    /// 更新进度和步骤描述
    pub fn set_progress(&mut self, progress: u8, message: impl Into<String>) {
        self.progress = progress.min(100);
        self.message = Some(message.into());
        self.updated_at = Utc::now().into();
    }
}
